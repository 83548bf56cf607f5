use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::{
    Method, Request,
    header::{CONNECTION, HOST, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};
use url::{Position, Url};

use super::prelude::*;
use crate::config::HeaderValues;

pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Parse and validate a check target. Only absolute http(s) URLs with a host
/// are accepted.
pub fn parse_target(raw: &str) -> Result<Url, CheckError> {
    if raw.trim().is_empty() {
        return Err(CheckError::EmptyUrl);
    }
    let url = Url::parse(raw).map_err(|source| CheckError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(CheckError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CheckError::MissingHost(raw.to_string()));
    }
    Ok(url)
}

/// The request sent on every attempt of a check.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    url: Url,
    headers: HeaderMap,
    host_override: Option<String>,
}

impl ProbeRequest {
    /// Build the request template. A header named `Host` (any case) is not
    /// sent as a header but replaces the host the request is addressed to.
    /// Configuring it under more than one spelling is an error.
    pub fn new(url: Url, headers: &HashMap<String, HeaderValues>) -> Result<Self, CheckError> {
        let mut map = HeaderMap::new();
        let mut host_override = None;

        for (name, values) in headers {
            let values = values.as_slice();
            if name.eq_ignore_ascii_case("host") {
                if host_override.is_some() {
                    return Err(CheckError::DuplicateHost);
                }
                host_override = Some(values.first().cloned());
                continue;
            }

            let invalid = || CheckError::InvalidHeader { name: name.clone() };
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(&values.join(", ")).map_err(|_| invalid())?;
            map.append(header, value);
        }

        let host_override = host_override.flatten();
        if let Some(host) = &host_override {
            HeaderValue::from_str(host).map_err(|_| CheckError::InvalidHeader {
                name: HOST.to_string(),
            })?;
        }

        Ok(Self {
            url,
            headers: map,
            host_override,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn host_override(&self) -> Option<&str> {
        self.host_override.as_deref()
    }

    /// The value of the `Host` header: the override if configured, otherwise
    /// the URL's authority.
    pub fn host(&self) -> String {
        if let Some(host) = &self.host_override {
            return host.clone();
        }
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Headers for a client that fills in `Host` itself unless one is given.
    pub fn client_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(host) = self.host_override.as_deref().and_then(|h| HeaderValue::from_str(h).ok()) {
            headers.insert(HOST, host);
        }
        headers
    }

    /// An origin-form HTTP/1.1 request for a hand-dialled connection.
    pub(crate) fn to_hyper(&self, keep_alive: bool) -> Result<Request<Empty<Bytes>>, TransportError> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(&self.url[Position::BeforePath..Position::AfterQuery])
            .header(HOST, self.host());

        if !self.headers.contains_key(USER_AGENT) {
            builder = builder.header(USER_AGENT, DEFAULT_USER_AGENT);
        }
        if !keep_alive {
            builder = builder.header(CONNECTION, "close");
        }
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in &self.headers {
                headers.append(name, value.clone());
            }
        }

        builder.body(Empty::new()).map_err(TransportError::Request)
    }
}
