pub mod app_config;
pub mod check_config;
pub mod duration;

pub use check_config::{CheckConfig, HeaderValues};
