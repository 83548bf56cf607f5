//! HTTP endpoint health checks.
//!
//! A check makes a fixed number of timed requests against one endpoint,
//! classifies each response by status code and body content, and concludes a
//! single [`Verdict`]: healthy, degraded (slower than its threshold) or down
//! (at least one attempt failed).
//!
//! ```text
//! CheckConfig
//!   └── HttpCheck::run
//!         ├── TransportBuilder / default_transport  (custom TLS dial)
//!         ├── execute          attempts, one after the other
//!         │     └── ResponseRules::classify        per response
//!         └── conclude         statistics + verdict
//! ```
//!
//! Only configuration problems are errors. Unreachable or misbehaving
//! endpoints produce a verdict like any other.

pub mod config;
pub mod http_check;

pub use config::CheckConfig;
pub use http_check::check::{HttpCheck, check};
pub use http_check::prelude::*;
pub use http_check::transport::{HttpTransport, TransportBuilder, TransportPolicy, default_transport};
