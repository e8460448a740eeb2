//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{Result, TraderError};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. `UPBIT_ACCESS_KEY` / `UPBIT_SECRET_KEY` / `UPBIT_REST_URL`
/// 2. Environment variables prefixed with `APP__` (e.g. `APP__SETTINGS__LOG_LEVEL`)
/// 3. Configuration file (TOML format)
/// 4. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if !Path::new(path).exists() {
            return Err(TraderError::Configuration(format!(
                "config file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::with_name(path));
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    for (key, var) in UPBIT_ENV_OVERRIDES {
        builder = builder
            .set_override_option(*key, std::env::var(var).ok())
            .map_err(|e| TraderError::Configuration(e.to_string()))?;
    }

    let config = builder
        .build()
        .map_err(|e| TraderError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| TraderError::Configuration(e.to_string()))
}

const UPBIT_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("upbit.access_key", "UPBIT_ACCESS_KEY"),
    ("upbit.secret_key", "UPBIT_SECRET_KEY"),
    ("upbit.rest_url", "UPBIT_REST_URL"),
];
