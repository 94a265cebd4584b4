//! Configuration management
//!
//! Construction-time settings for the API client. Every section is
//! `#[serde(default)]` so a config file only needs the fields it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_URL, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_HALF_OPEN_PROBE_TIMEOUT_MS, DEFAULT_INITIAL_DELAY_MS, DEFAULT_JITTER_FACTOR,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS, DEFAULT_OPEN_TIMEOUT_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SUCCESS_THRESHOLD, DEFAULT_TOKEN_LIFETIME_SECS,
};

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiSettings,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub token: TokenSettings,
}

/// Backend endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Drop stored credentials when the backend answers 401.
    pub clear_tokens_on_unauthorized: bool,
}

impl ApiSettings {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            clear_tokens_on_unauthorized: true,
        }
    }
}

/// Named retry configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPreset {
    None,
    Conservative,
    #[default]
    Default,
    Aggressive,
}

impl std::str::FromStr for RetryPreset {
    type Err = crate::PetClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "conservative" => Ok(Self::Conservative),
            "default" => Ok(Self::Default),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(crate::PetClinicError::Config(format!("Unknown retry preset: {other}"))),
        }
    }
}

/// Explicit retry parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomRetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for CustomRetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

/// Retry configuration: either a preset name or explicit parameters.
///
/// ```toml
/// retry = "aggressive"
/// # or
/// [retry]
/// max_attempts = 4
/// initial_delay_ms = 250
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrySettings {
    Preset(RetryPreset),
    Custom(CustomRetrySettings),
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::Preset(RetryPreset::Default)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_ms: u64,
    pub half_open_probe_timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            half_open_probe_timeout_ms: DEFAULT_HALF_OPEN_PROBE_TIMEOUT_MS,
        }
    }
}

/// Token lifecycle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Lifetime applied when the server does not send `expires_in`.
    pub default_lifetime_seconds: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self { default_lifetime_seconds: DEFAULT_TOKEN_LIFETIME_SECS }
    }
}
