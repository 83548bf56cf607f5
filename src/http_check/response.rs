use std::time::Duration;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{StatusCode, body::Incoming};

use super::prelude::*;

enum Body {
    Buffered(Bytes),
    Incoming { body: Incoming, timeout: Duration },
    Client(reqwest::Response),
}

/// A response whose body has not been read yet.
///
/// Dropping it releases the underlying connection; the body is only pulled
/// off the wire by [`ProbeResponse::bytes`].
pub struct ProbeResponse {
    status: StatusCode,
    body: Body,
}

impl ProbeResponse {
    /// A response with an in-memory body, for transports that buffer.
    pub fn buffered(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: Body::Buffered(body.into()),
        }
    }

    pub(crate) fn incoming(response: hyper::Response<Incoming>, timeout: Duration) -> Self {
        let status = response.status();
        Self {
            status,
            body: Body::Incoming {
                body: response.into_body(),
                timeout,
            },
        }
    }

    pub(crate) fn client(response: reqwest::Response) -> Self {
        Self {
            status: response.status(),
            body: Body::Client(response),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Read the whole body into memory.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        match self.body {
            Body::Buffered(bytes) => Ok(bytes),
            Body::Incoming { body, timeout } => {
                let collected = tokio::time::timeout(timeout, body.collect())
                    .await
                    .map_err(|_| TransportError::BodyTimeout(timeout))?
                    .map_err(TransportError::Http)?;
                Ok(collected.to_bytes())
            }
            Body::Client(response) => response.bytes().await.map_err(TransportError::Client),
        }
    }
}

impl std::fmt::Debug for ProbeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
