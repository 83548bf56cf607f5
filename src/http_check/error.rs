use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Problems with a check's configuration.
///
/// These are the only errors that abort an invocation: they are raised before
/// any network activity and no verdict is produced.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("endpoint name must not be empty")]
    EmptyName,

    #[error("endpoint URL must not be empty")]
    EmptyUrl,

    #[error("error parsing URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("URL '{0}' has no host")]
    MissingHost(String),

    #[error("invalid request header '{name}'")]
    InvalidHeader { name: String },

    #[error("Host header configured more than once")]
    DuplicateHost,

    #[error("error reading root certificate '{}'", path.display())]
    ReadRootCert {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("root certificate file '{}' is empty", path.display())]
    EmptyRootCert { path: PathBuf },

    #[error("error parsing root certificate '{}': no usable PEM certificate", path.display())]
    ParseRootCert { path: PathBuf },

    #[error("error building TLS connector")]
    Tls(#[source] native_tls::Error),

    #[error("default transport unavailable: {0}")]
    DefaultTransport(String),
}

/// Transport-level failures of a single attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connecting to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("TLS handshake with {host}")]
    Handshake {
        host: String,
        #[source]
        source: native_tls::Error,
    },

    #[error("TLS handshake with {host} timed out after {timeout:?}")]
    HandshakeTimeout { host: String, timeout: Duration },

    #[error("building request")]
    Request(#[source] hyper::http::Error),

    #[error("HTTP exchange failed")]
    Http(#[source] hyper::Error),

    #[error("no response headers within {0:?}")]
    ResponseTimeout(Duration),

    #[error("reading response body timed out after {0:?}")]
    BodyTimeout(Duration),

    #[error("request failed")]
    Client(#[source] reqwest::Error),
}

/// Why a response that arrived does not count as up.
#[derive(Debug, Error)]
pub enum Mismatch {
    #[error("response status {0}")]
    Status(hyper::StatusCode),

    #[error("response does not contain '{0}'")]
    MissingContent(String),

    #[error("response contains '{0}'")]
    ForbiddenContent(String),

    #[error("reading response body")]
    Body(#[source] TransportError),
}
