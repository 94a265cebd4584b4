//! Error classification shared by the resilience components.
//!
//! - [`ConfigError`]: validation failures raised by configuration builders
//! - [`ErrorClassification`]: uniform questions the retry policy, the circuit
//!   breaker and the logging layer ask of an error
//! - [`ErrorSeverity`]: log level selection

use std::fmt;
use std::time::Duration;

use petclinic_domain::{ErrorKind, NetworkError};
use thiserror::Error;

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Result alias for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Standardized error classification
///
/// Implemented by every error type that flows through the request pipeline
/// so retry and breaker decisions never need to match on concrete variants.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// This is the error's own flag. Retry policies may still decline to
    /// retry a retryable error, but never retry one that says `false`.
    fn is_retryable(&self) -> bool;

    /// Whether the failure reflects the health of the remote service
    fn is_service_failure(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the server dictated a delay (e.g. a
    /// `Retry-After` header).
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl ErrorClassification for NetworkError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }

    fn is_service_failure(&self) -> bool {
        Self::is_service_failure(self)
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::RateLimitExceeded => ErrorSeverity::Info,
            ErrorKind::ClientError | ErrorKind::Unauthorized | ErrorKind::Unknown => {
                ErrorSeverity::Error
            }
            _ => ErrorSeverity::Warning,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        Self::retry_after(self)
    }
}
