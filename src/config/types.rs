//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::types::Symbol;
use crate::strategy::PositionIntent;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upbit exchange configuration
    #[serde(default)]
    pub upbit: UpbitConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
    /// Strategy parameters used when a flag is not given
    #[serde(default)]
    pub strategy: StrategyDefaults,
}

impl AppConfig {
    /// Position intent for `symbol` pre-filled with the configured defaults
    pub fn base_intent(&self, symbol: Symbol) -> PositionIntent {
        PositionIntent::new(symbol)
            .with_dip_percent(self.strategy.dip_percent)
            .with_profit_percent(self.strategy.profit_percent)
            .with_loss_percent(self.strategy.loss_percent)
            .with_trailing_percent(self.strategy.trailing_percent)
            .with_poll_interval(self.settings.poll_interval())
    }
}

/// Upbit exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitConfig {
    /// Access key for authenticated requests
    #[serde(default)]
    pub access_key: Option<String>,
    /// Secret key for signing request tokens
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Base URL for the REST API
    #[serde(default = "default_upbit_rest_url")]
    pub rest_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// How many times an unsettled order is re-read after placement
    #[serde(default = "default_fill_confirm_attempts")]
    pub fill_confirm_attempts: u32,
    /// Delay between fill confirmation reads in milliseconds
    #[serde(default = "default_fill_confirm_delay")]
    pub fill_confirm_delay_ms: u64,
}

impl Default for UpbitConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            rest_url: default_upbit_rest_url(),
            request_timeout_seconds: default_request_timeout(),
            fill_confirm_attempts: default_fill_confirm_attempts(),
            fill_confirm_delay_ms: default_fill_confirm_delay(),
        }
    }
}

impl UpbitConfig {
    /// Both keys, when configured
    pub fn credentials(&self) -> Option<ApiCredentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => {
                Some(ApiCredentials::new(access.clone(), secret.clone()))
            }
            _ => None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn fill_confirm_delay(&self) -> Duration {
        Duration::from_millis(self.fill_confirm_delay_ms)
    }
}

fn default_upbit_rest_url() -> String {
    "https://api.upbit.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_fill_confirm_attempts() -> u32 {
    5
}

fn default_fill_confirm_delay() -> u64 {
    200
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay between price samples in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl AppSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

/// Default strategy percentages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDefaults {
    #[serde(default = "default_dip_percent")]
    pub dip_percent: Decimal,
    #[serde(default = "default_profit_percent")]
    pub profit_percent: Decimal,
    #[serde(default = "default_loss_percent")]
    pub loss_percent: Decimal,
    #[serde(default = "default_trailing_percent")]
    pub trailing_percent: Decimal,
}

impl Default for StrategyDefaults {
    fn default() -> Self {
        Self {
            dip_percent: default_dip_percent(),
            profit_percent: default_profit_percent(),
            loss_percent: default_loss_percent(),
            trailing_percent: default_trailing_percent(),
        }
    }
}

fn default_dip_percent() -> Decimal {
    dec!(1)
}

fn default_profit_percent() -> Decimal {
    dec!(5)
}

fn default_loss_percent() -> Decimal {
    dec!(3)
}

fn default_trailing_percent() -> Decimal {
    dec!(1)
}

/// API credentials for authenticated requests
#[derive(Clone)]
pub struct ApiCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl ApiCredentials {
    pub fn new(access_key: String, secret_key: String) -> Self {
        Self {
            access_key,
            secret_key,
        }
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
