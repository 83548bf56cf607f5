//! Check results and the rules that turn attempts into a verdict.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{CheckConfig, duration};

/// One request/response cycle against an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(with = "duration")]
    rtt: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Attempt {
    pub fn succeeded(rtt: Duration) -> Self {
        Self { rtt, error: None }
    }

    pub fn failed(rtt: Duration, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            rtt,
            error: (!error.is_empty()).then_some(error),
        }
    }

    pub fn rtt(&self) -> Duration {
        self.rtt
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Round trip statistics over all attempts of a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(with = "duration")]
    pub total: Duration,
    #[serde(with = "duration")]
    pub mean: Duration,
    /// For an even number of attempts, the mean of the two middle values.
    #[serde(with = "duration")]
    pub median: Duration,
    #[serde(with = "duration")]
    pub min: Duration,
    #[serde(with = "duration")]
    pub max: Duration,
}

impl Stats {
    pub fn compute(attempts: &[Attempt]) -> Self {
        if attempts.is_empty() {
            return Self::default();
        }

        let mut rtts: Vec<Duration> = attempts.iter().map(Attempt::rtt).collect();
        rtts.sort_unstable();

        let count = rtts.len() as u32;
        let total = rtts
            .iter()
            .fold(Duration::ZERO, |sum, rtt| sum.saturating_add(*rtt));
        let mid = rtts.len() / 2;
        let median = if rtts.len() % 2 == 0 {
            rtts[mid - 1] + (rtts[mid] - rtts[mid - 1]) / 2
        } else {
            rtts[mid]
        };

        Self {
            total,
            mean: total / count,
            median,
            min: rtts[0],
            max: rtts[rtts.len() - 1],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
    Down,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Degraded => "degraded",
            Health::Down => "down",
        }
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one check invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    title: String,
    endpoint: String,
    timestamp: DateTime<Utc>,
    times: Vec<Attempt>,
    stats: Stats,
    #[serde(default, with = "duration::option", skip_serializing_if = "Option::is_none")]
    threshold_rtt: Option<Duration>,
    health: Health,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
}

impl Verdict {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// When the check started.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Every attempt, in the order it was made.
    pub fn attempts(&self) -> &[Attempt] {
        &self.times
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn threshold_rtt(&self) -> Option<Duration> {
        self.threshold_rtt
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health == Health::Healthy
    }

    pub fn is_degraded(&self) -> bool {
        self.health == Health::Degraded
    }

    pub fn is_down(&self) -> bool {
        self.health == Health::Down
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }
}

/// Turn the attempts of one check into its verdict.
///
/// Any failed attempt makes the endpoint down, and latency is then not
/// considered. Otherwise a median round trip time above the configured
/// threshold makes it degraded. Statistics are filled in for every verdict.
pub fn conclude(config: &CheckConfig, timestamp: DateTime<Utc>, attempts: Vec<Attempt>) -> Verdict {
    let stats = Stats::compute(&attempts);
    let threshold_rtt = config.threshold();

    let (health, reason) = match attempts.iter().enumerate().find(|(_, a)| a.is_failure()) {
        Some((i, failed)) => (
            Health::Down,
            Some(format!(
                "attempt {} failed: {}",
                i + 1,
                failed.error().unwrap_or_default()
            )),
        ),
        None => match threshold_rtt {
            Some(threshold) if stats.median > threshold => (
                Health::Degraded,
                Some(format!(
                    "median round trip time exceeded threshold ({threshold:?})"
                )),
            ),
            _ => (Health::Healthy, None),
        },
    };

    let notice = reason.map(|reason| {
        let rtts: Vec<String> = attempts.iter().map(|a| format!("{:?}", a.rtt())).collect();
        format!(
            "{reason} - number of attempts = {} ({})",
            attempts.len(),
            rtts.join(" ")
        )
    });

    Verdict {
        title: config.name.clone(),
        endpoint: config.url.clone(),
        timestamp,
        times: attempts,
        stats,
        threshold_rtt,
        health,
        notice,
    }
}
