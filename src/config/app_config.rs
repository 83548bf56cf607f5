use std::{env, fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

use super::check_config::CheckConfig;

pub const DEFAULT_CONFIG_FILE: &str = "checkup.yml";

/// A configured checker, tagged by its `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CheckerConfig {
    Http(CheckConfig),
}

impl CheckerConfig {
    pub fn name(&self) -> &str {
        match self {
            CheckerConfig::Http(config) => &config.name,
        }
    }
}

/// The contents of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub checkers: Vec<CheckerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub struct AppConfig {
    pub checkers: Vec<CheckerConfig>,
    pub output: OutputFormat,
    pub max_name_width: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in '{path}'")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in '{path}'")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a configuration file body. Files ending in `.json` are read as JSON,
/// everything else as YAML.
pub fn parse_file_config(path: &str, contents: &str) -> Result<FileConfig, ConfigError> {
    let is_json = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(contents).map_err(|source| ConfigError::Json {
            path: path.to_string(),
            source,
        })
    } else {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })
    }
}

/// Load the application configuration.
///
/// A `.env` file in the working directory is applied first. The checks are
/// read from the file named by `CONFIG_FILE` (default `checkup.yml`), and
/// `OUTPUT_FORMAT=json` switches the report to JSON.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        log::debug!("No .env file applied: {e}");
    }

    let path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let file = parse_file_config(&path, &contents)?;

    let output = match env::var("OUTPUT_FORMAT") {
        Ok(v) if v.eq_ignore_ascii_case("json") => OutputFormat::Json,
        _ => OutputFormat::Text,
    };

    let max_name_width = file
        .checkers
        .iter()
        .map(|c| c.name().len())
        .max()
        .unwrap_or(10);

    log::info!("Loaded {} checker(s) from {}", file.checkers.len(), path);

    Ok(AppConfig {
        checkers: file.checkers,
        output,
        max_name_width,
    })
}
