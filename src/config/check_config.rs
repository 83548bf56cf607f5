use std::{collections::HashMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::duration;

/// The configuration of one HTTP endpoint check.
///
/// Read-only for the duration of a check. Field names follow the JSON form
/// stored alongside check results, so a config can be round-tripped through
/// storage unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// The name of the endpoint.
    #[serde(rename = "endpoint_name")]
    pub name: String,

    /// The URL of the endpoint.
    #[serde(rename = "endpoint_url")]
    pub url: String,

    /// The HTTP status code expected from a healthy endpoint.
    /// Defaults to 200 when unset or zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_status: Option<u16>,

    /// The maximum median round trip time allowed for a healthy endpoint.
    /// A slower endpoint is reported as degraded. Zero disables the check.
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub threshold_rtt: Option<Duration>,

    /// A string the response body must contain.
    /// When set, the whole body is read into memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_contain: Option<String>,

    /// A string the response body must not contain. And-ed with
    /// `must_contain`. When set, the whole body is read into memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_not_contain: Option<String>,

    /// How many requests to make in a single check. Values below 1 mean 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<i64>,

    /// Pause between consecutive attempts.
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub attempt_spacing: Option<Duration>,

    /// Skip server certificate and hostname validation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tls_skip_verify: bool,

    /// PEM bundle of additional trusted certificate authorities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_file: Option<PathBuf>,

    /// Extra request headers. A `Host` entry overrides the request host.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, HeaderValues>,
}

/// One or more values of a configured header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

impl HeaderValues {
    pub fn as_slice(&self) -> &[String] {
        match self {
            HeaderValues::One(v) => std::slice::from_ref(v),
            HeaderValues::Many(v) => v,
        }
    }
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        HeaderValues::One(value.to_string())
    }
}

impl CheckConfig {
    pub const DEFAULT_UP_STATUS: u16 = 200;

    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Parse a check from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn up_status(&self) -> u16 {
        match self.up_status {
            Some(0) | None => Self::DEFAULT_UP_STATUS,
            Some(code) => code,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
            .map(|n| n.clamp(1, i64::from(u32::MAX)) as u32)
            .unwrap_or(1)
    }

    /// The configured threshold, if it is enabled.
    pub fn threshold(&self) -> Option<Duration> {
        self.threshold_rtt.filter(|t| !t.is_zero())
    }

    pub fn spacing(&self) -> Option<Duration> {
        self.attempt_spacing.filter(|d| !d.is_zero())
    }

    /// Whether this check needs a transport with its own TLS settings.
    pub fn has_tls_overrides(&self) -> bool {
        self.tls_skip_verify || self.tls_ca_file.is_some()
    }
}
