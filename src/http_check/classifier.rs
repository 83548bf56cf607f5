use hyper::StatusCode;

use super::prelude::*;
use crate::config::CheckConfig;

/// Pass/fail rules applied to every response of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRules {
    pub up_status: u16,
    pub must_contain: Option<String>,
    pub must_not_contain: Option<String>,
}

impl Default for ResponseRules {
    fn default() -> Self {
        Self {
            up_status: StatusCode::OK.as_u16(),
            must_contain: None,
            must_not_contain: None,
        }
    }
}

impl ResponseRules {
    pub fn from_config(config: &CheckConfig) -> Self {
        Self {
            up_status: config.up_status(),
            must_contain: config.must_contain.clone().filter(|s| !s.is_empty()),
            must_not_contain: config.must_not_contain.clone().filter(|s| !s.is_empty()),
        }
    }

    fn has_content_rules(&self) -> bool {
        self.must_contain.is_some() || self.must_not_contain.is_some()
    }

    /// Decide whether one response counts as up.
    ///
    /// The body is only read when a content rule is configured. The response
    /// is consumed either way, which releases its connection.
    pub async fn classify(&self, response: ProbeResponse) -> Result<(), Mismatch> {
        if response.status().as_u16() != self.up_status {
            return Err(Mismatch::Status(response.status()));
        }

        if !self.has_content_rules() {
            return Ok(());
        }

        let body = response.bytes().await.map_err(Mismatch::Body)?;
        let body = String::from_utf8_lossy(&body);

        if let Some(needle) = &self.must_contain {
            if !body.contains(needle.as_str()) {
                return Err(Mismatch::MissingContent(needle.clone()));
            }
        }
        if let Some(needle) = &self.must_not_contain {
            if body.contains(needle.as_str()) {
                return Err(Mismatch::ForbiddenContent(needle.clone()));
            }
        }

        Ok(())
    }
}
