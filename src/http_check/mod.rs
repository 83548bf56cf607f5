pub mod check;
pub mod classifier;
pub mod error;
pub mod executor;
pub mod request;
pub mod response;
pub mod transport;
pub mod verdict;

pub mod prelude {
    pub use super::classifier::ResponseRules;
    pub use super::error::{CheckError, Mismatch, TransportError};
    pub use super::request::ProbeRequest;
    pub use super::response::ProbeResponse;
    pub use super::transport::Transport;
    pub use super::verdict::{Attempt, Health, Stats, Verdict, conclude};
}

use std::fmt::Write;

/// Flatten an error and its sources into one line.
pub(crate) fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}
