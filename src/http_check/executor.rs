use std::time::Duration;

use tokio::time::{Instant, sleep};

use super::{prelude::*, report};

/// How many attempts a check makes and how far apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPlan {
    pub count: u32,
    pub spacing: Option<Duration>,
}

impl AttemptPlan {
    pub fn new(count: u32, spacing: Option<Duration>) -> Self {
        Self {
            count: count.max(1),
            spacing,
        }
    }
}

/// Make every planned attempt, one after the other.
///
/// Each attempt is timed from just before the request until its response
/// headers arrive or it fails. Failures are recorded on the attempt and never
/// stop the remaining attempts.
pub async fn execute<T>(
    transport: &T,
    request: &ProbeRequest,
    rules: &ResponseRules,
    plan: AttemptPlan,
) -> Vec<Attempt>
where
    T: Transport,
{
    let mut attempts = Vec::with_capacity(plan.count as usize);

    for i in 0..plan.count {
        let start = Instant::now();
        let result = transport.send(request).await;
        let rtt = start.elapsed();

        let attempt = match result {
            Ok(response) => match rules.classify(response).await {
                Ok(()) => Attempt::succeeded(rtt),
                Err(mismatch) => Attempt::failed(rtt, report(&mismatch)),
            },
            Err(e) => Attempt::failed(rtt, report(&e)),
        };

        if let Some(error) = attempt.error() {
            log::debug!(
                "Attempt {}/{} to {} failed after {:?}: {error}",
                i + 1,
                plan.count,
                request.url(),
                rtt
            );
        }
        attempts.push(attempt);

        if let Some(spacing) = plan.spacing {
            if i + 1 < plan.count {
                sleep(spacing).await;
            }
        }
    }

    attempts
}
