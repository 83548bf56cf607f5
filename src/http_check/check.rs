use chrono::Utc;

use super::executor::{AttemptPlan, execute};
use super::prelude::*;
use super::request::parse_target;
use super::transport::{HttpTransport, TransportBuilder, default_transport};
use crate::config::CheckConfig;

/// A validated HTTP check, ready to run.
///
/// Construction fails on configuration errors, including unusable TLS
/// settings; running never does, apart from the shared default transport
/// being unavailable.
#[derive(Debug, Clone)]
pub struct HttpCheck {
    config: CheckConfig,
    request: ProbeRequest,
    rules: ResponseRules,
    plan: AttemptPlan,
    /// Dedicated transport for checks with TLS overrides.
    transport: Option<HttpTransport>,
}

impl HttpCheck {
    pub const TYPE: &'static str = "http";

    pub fn new(config: CheckConfig) -> Result<Self, CheckError> {
        if config.name.trim().is_empty() {
            return Err(CheckError::EmptyName);
        }
        let url = parse_target(&config.url)?;
        let request = ProbeRequest::new(url, &config.headers)?;
        let transport = if config.has_tls_overrides() {
            Some(TransportBuilder::from_config(&config).build(&config.url)?)
        } else {
            None
        };

        Ok(Self {
            transport,
            rules: ResponseRules::from_config(&config),
            plan: AttemptPlan::new(config.attempts(), config.spacing()),
            request,
            config,
        })
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn request(&self) -> &ProbeRequest {
        &self.request
    }

    /// Run the check over the shared default transport, or over a dedicated
    /// one when the check carries its own TLS settings.
    pub async fn run(&self) -> Result<Verdict, CheckError> {
        match &self.transport {
            Some(transport) => Ok(self.run_with(transport).await),
            None => Ok(self.run_with(default_transport()?).await),
        }
    }

    /// Run the check over a caller-supplied transport, used as-is.
    pub async fn run_with<T: Transport>(&self, transport: &T) -> Verdict {
        let started = Utc::now();
        log::debug!(
            "Checking {} ({}) with {} attempt(s)",
            self.config.name,
            self.request.url(),
            self.plan.count
        );

        let attempts = execute(transport, &self.request, &self.rules, self.plan).await;
        let verdict = conclude(&self.config, started, attempts);

        match verdict.notice() {
            Some(notice) => log::info!("{} is {}: {notice}", verdict.title(), verdict.health()),
            None => log::debug!("{} is {}", verdict.title(), verdict.health()),
        }
        verdict
    }
}

/// Validate `config` and run it once.
pub async fn check(config: CheckConfig) -> Result<Verdict, CheckError> {
    HttpCheck::new(config)?.run().await
}
