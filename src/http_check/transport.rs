//! Outbound connection stack for probes.
//!
//! [`HttpTransport`] dials every attempt by hand: a TCP connect, then (for
//! https) a TLS handshake with the check's own TLS settings, then a single
//! HTTP/1.1 exchange. No connection is reused, no compression is requested
//! and redirects are never followed, so the response an attempt sees is the
//! one the endpoint actually sent.

use std::{
    fmt,
    fs,
    future::Future,
    io,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use bytes::Bytes;
use http_body_util::Empty;
use hyper::{
    Request,
    body::Incoming,
    header::{CONNECTION, HeaderMap, HeaderValue},
};
use hyper_util::rt::TokioIo;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time::timeout,
};
use tokio_native_tls::{TlsConnector as TokioTlsConnector, TlsStream};
use url::{Host, Url};
use x509_parser::pem::Pem;

use super::prelude::*;
use super::request::{DEFAULT_USER_AGENT, parse_target};
use crate::config::CheckConfig;

/// Something that can carry a probe request to its endpoint.
///
/// Implemented by [`HttpTransport`] and by `reqwest::Client`, so callers can
/// hand a pre-built client to a check instead of letting it build one.
pub trait Transport {
    fn send(
        &self,
        request: &ProbeRequest,
    ) -> impl Future<Output = Result<ProbeResponse, TransportError>> + Send;
}

/// Timeouts and connection policy shared by all built transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportPolicy {
    /// TCP connect timeout for plain http.
    pub connect_timeout: Duration,
    /// TCP connect timeout used by the TLS dialer.
    pub tls_connect_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    /// Time allowed between sending the request and receiving its headers.
    pub response_header_timeout: Duration,
    /// Upper bound on reading a response body.
    pub request_timeout: Duration,
    pub keep_alive: bool,
    pub max_idle_per_host: usize,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            tls_connect_timeout: Duration::from_secs(5),
            tls_handshake_timeout: Duration::from_secs(5),
            response_header_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            keep_alive: false,
            max_idle_per_host: 1,
        }
    }
}

impl TransportPolicy {
    /// A reqwest client following this policy, for callers that prefer to
    /// supply their own client to checks.
    ///
    /// reqwest's connect timeout also covers the TLS handshake, so it is the
    /// longer of the plain connect limit and the TLS connect plus handshake
    /// limits. With keep-alive off no idle connection is kept and every
    /// request asks the server to close.
    pub fn reqwest_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(
                self.connect_timeout
                    .max(self.tls_connect_timeout + self.tls_handshake_timeout),
            )
            .read_timeout(self.response_header_timeout)
            .timeout(self.request_timeout)
            .no_gzip()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(DEFAULT_USER_AGENT);

        builder = if self.keep_alive {
            builder.pool_max_idle_per_host(self.max_idle_per_host)
        } else {
            let mut headers = HeaderMap::new();
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
            builder.pool_max_idle_per_host(0).default_headers(headers)
        };
        builder.build()
    }
}

/// The transport built by checks that do not receive one from the caller.
#[derive(Clone)]
pub struct HttpTransport {
    policy: TransportPolicy,
    tls: TokioTlsConnector,
    dial_target: Option<Url>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("policy", &self.policy)
            .field("dial_target", &self.dial_target.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

static DEFAULT_TRANSPORT: LazyLock<Result<HttpTransport, String>> = LazyLock::new(|| {
    native_tls::TlsConnector::new()
        .map(|connector| HttpTransport {
            policy: TransportPolicy::default(),
            tls: TokioTlsConnector::from(connector),
            dial_target: None,
        })
        .map_err(|e| e.to_string())
});

/// The process-wide transport used by checks without TLS overrides.
/// Built on first use and never modified afterwards.
pub fn default_transport() -> Result<&'static HttpTransport, CheckError> {
    DEFAULT_TRANSPORT
        .as_ref()
        .map_err(|e| CheckError::DefaultTransport(e.clone()))
}

impl HttpTransport {
    pub fn policy(&self) -> &TransportPolicy {
        &self.policy
    }

    /// TCP connect to `host:port` within `limit`.
    async fn connect(&self, host: &str, port: u16, limit: Duration) -> Result<TcpStream, TransportError> {
        let addr = if host.contains(':') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        match timeout(limit, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(TransportError::Connect { addr, source }),
            Err(_) => Err(TransportError::ConnectTimeout {
                addr,
                timeout: limit,
            }),
        }
    }

    /// Dial the target and complete the TLS handshake with this transport's
    /// own TLS configuration.
    async fn dial_tls(&self, target: &Url) -> Result<TlsStream<TcpStream>, TransportError> {
        let host = dial_host(target)?;
        let port = target.port().unwrap_or(443);
        let stream = self
            .connect(&host, port, self.policy.tls_connect_timeout)
            .await?;

        let limit = self.policy.tls_handshake_timeout;
        match timeout(limit, self.tls.connect(&host, stream)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(TransportError::Handshake { host, source }),
            Err(_) => Err(TransportError::HandshakeTimeout {
                host,
                timeout: limit,
            }),
        }
    }

    async fn exchange<S>(
        &self,
        stream: S,
        request: Request<Empty<Bytes>>,
    ) -> Result<hyper::Response<Incoming>, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(TransportError::Http)?;

        // Drive the connection until the response has been consumed or dropped.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::debug!("Probe connection closed with error: {e}");
            }
        });

        let limit = self.policy.response_header_timeout;
        timeout(limit, sender.send_request(request))
            .await
            .map_err(|_| TransportError::ResponseTimeout(limit))?
            .map_err(TransportError::Http)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError> {
        let outbound = request.to_hyper(self.policy.keep_alive)?;
        let url = request.url();

        let response = if url.scheme() == "https" {
            let target = self.dial_target.as_ref().unwrap_or(url);
            let stream = self.dial_tls(target).await?;
            self.exchange(stream, outbound).await?
        } else {
            let host = dial_host(url)?;
            let port = url.port_or_known_default().unwrap_or(80);
            let stream = self
                .connect(&host, port, self.policy.connect_timeout)
                .await?;
            self.exchange(stream, outbound).await?
        };

        Ok(ProbeResponse::incoming(response, self.policy.request_timeout))
    }
}

impl Transport for reqwest::Client {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError> {
        let response = self
            .get(request.url().clone())
            .headers(request.client_headers())
            .send()
            .await
            .map_err(TransportError::Client)?;
        Ok(ProbeResponse::client(response))
    }
}

fn dial_host(url: &Url) -> Result<String, TransportError> {
    match url.host() {
        Some(Host::Domain(domain)) => Ok(domain.to_string()),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        None => Err(TransportError::Connect {
            addr: url.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "URL has no host"),
        }),
    }
}

/// Builds a dedicated [`HttpTransport`] for checks with TLS overrides.
#[derive(Debug, Clone, Default)]
pub struct TransportBuilder {
    policy: TransportPolicy,
    skip_verify: bool,
    ca_file: Option<PathBuf>,
}

impl TransportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CheckConfig) -> Self {
        Self {
            policy: TransportPolicy::default(),
            skip_verify: config.tls_skip_verify,
            ca_file: config.tls_ca_file.clone(),
        }
    }

    pub fn policy(mut self, policy: TransportPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Disable certificate and hostname validation.
    pub fn skip_verify(mut self, skip: bool) -> Self {
        self.skip_verify = skip;
        self
    }

    /// Trust the certificates in this PEM file on top of the system roots.
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Build a transport whose TLS dialer always connects to `target`.
    /// Fails on a malformed target or unusable CA material, before any
    /// network activity.
    pub fn build(self, target: &str) -> Result<HttpTransport, CheckError> {
        let target = parse_target(target)?;

        let mut tls = native_tls::TlsConnector::builder();
        if self.skip_verify {
            tls.danger_accept_invalid_certs(true);
            tls.danger_accept_invalid_hostnames(true);
        }
        if let Some(path) = &self.ca_file {
            for cert in load_root_certs(path)? {
                tls.add_root_certificate(cert);
            }
        }
        let tls = tls.build().map_err(CheckError::Tls)?;

        Ok(HttpTransport {
            policy: self.policy,
            tls: TokioTlsConnector::from(tls),
            dial_target: Some(target),
        })
    }
}

/// Read every PEM certificate from `path`. Blocks that are not certificates
/// or do not parse are skipped; a file without a single usable certificate
/// is an error.
pub fn load_root_certs(path: &Path) -> Result<Vec<native_tls::Certificate>, CheckError> {
    let pem = fs::read(path).map_err(|source| CheckError::ReadRootCert {
        path: path.to_path_buf(),
        source,
    })?;
    if pem.iter().all(u8::is_ascii_whitespace) {
        return Err(CheckError::EmptyRootCert {
            path: path.to_path_buf(),
        });
    }

    let mut certs = Vec::new();
    for block in Pem::iter_from_buffer(&pem).map_while(Result::ok) {
        if block.label != "CERTIFICATE" {
            continue;
        }
        let subject = match block.parse_x509() {
            Ok(cert) => cert.subject().to_string(),
            Err(e) => {
                log::warn!("Skipping unparseable certificate in {}: {e}", path.display());
                continue;
            }
        };
        match native_tls::Certificate::from_der(&block.contents) {
            Ok(cert) => {
                log::debug!("Trusting CA '{subject}' from {}", path.display());
                certs.push(cert);
            }
            Err(e) => log::warn!("Skipping certificate '{subject}' in {}: {e}", path.display()),
        }
    }

    if certs.is_empty() {
        return Err(CheckError::ParseRootCert {
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}
