//! API-specific error types
//!
//! Terminal outcomes of one logical request. Every variant that ends a retry
//! sequence carries the number of transport attempts actually issued.

use std::time::Duration;

use petclinic_common::error::{ConfigError, ErrorClassification, ErrorSeverity};
use petclinic_domain::{NetworkError, PetClinicError};
use thiserror::Error;

/// API operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Refused locally by the circuit breaker without a transport call.
    #[error("Circuit breaker open after {attempts} attempts")]
    CircuitOpen { attempts: u32, last_error: Option<NetworkError> },

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: NetworkError,
    },

    #[error("Request failed: {error}")]
    NonRetryable {
        attempts: u32,
        #[source]
        error: NetworkError,
    },

    #[error("Operation cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Stable label used in structured logs
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => "circuit_open",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::NonRetryable { .. } => "non_retryable",
            Self::Cancelled { .. } => "cancelled",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
        }
    }

    /// The last classified transport failure, if any attempt produced one.
    pub const fn network_error(&self) -> Option<&NetworkError> {
        match self {
            Self::CircuitOpen { last_error, .. } => last_error.as_ref(),
            Self::RetriesExhausted { last_error, .. } => Some(last_error),
            Self::NonRetryable { error, .. } => Some(error),
            Self::Cancelled { .. } | Self::Serialization(_) | Self::Config(_) => None,
        }
    }

    /// Transport attempts issued before this outcome. Zero for local errors.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::CircuitOpen { attempts, .. }
            | Self::RetriesExhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
            Self::Serialization(_) | Self::Config(_) => 0,
        }
    }

    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

impl ErrorClassification for ApiError {
    /// Whether a caller may reasonably issue the same request again later.
    fn is_retryable(&self) -> bool {
        match self {
            Self::CircuitOpen { .. } => true,
            Self::RetriesExhausted { last_error, .. } => last_error.is_retryable(),
            Self::NonRetryable { .. }
            | Self::Cancelled { .. }
            | Self::Serialization(_)
            | Self::Config(_) => false,
        }
    }

    fn is_service_failure(&self) -> bool {
        self.network_error().is_some_and(NetworkError::is_service_failure)
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled { .. } => ErrorSeverity::Info,
            Self::CircuitOpen { .. } => ErrorSeverity::Warning,
            Self::RetriesExhausted { last_error: error, .. } | Self::NonRetryable { error, .. } => {
                error.severity()
            }
            Self::Serialization(_) | Self::Config(_) => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.network_error().and_then(NetworkError::retry_after)
    }
}

impl From<PetClinicError> for ApiError {
    fn from(err: PetClinicError) -> Self {
        match err {
            PetClinicError::Config(msg) => Self::Config(msg),
            PetClinicError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
