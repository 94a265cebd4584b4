//! Error types used throughout the application

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the pet clinic client
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum PetClinicError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for pet clinic operations
pub type Result<T> = std::result::Result<T, PetClinicError>;

/// Fieldless classification tag for [`NetworkError`].
///
/// Used wherever a set of error categories is configured (for example the
/// retryable kinds of a retry policy), so it is `Copy + Hash` and
/// serializes as `snake_case`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoConnectivity,
    Timeout,
    ServerError,
    BadGateway,
    ServiceUnavailable,
    DnsError,
    RateLimitExceeded,
    ClientError,
    NotFound,
    Unauthorized,
    Unknown,
}

impl ErrorKind {
    /// Kinds retried by the stock retry presets.
    pub const DEFAULT_RETRYABLE: [Self; 7] = [
        Self::NoConnectivity,
        Self::Timeout,
        Self::ServerError,
        Self::BadGateway,
        Self::ServiceUnavailable,
        Self::DnsError,
        Self::RateLimitExceeded,
    ];

    /// Stable label used in structured log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoConnectivity => "no_connectivity",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
            Self::BadGateway => "bad_gateway",
            Self::ServiceUnavailable => "service_unavailable",
            Self::DnsError => "dns_error",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::ClientError => "client_error",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified transport failure.
///
/// Every raw failure coming out of the HTTP layer is mapped into one of these
/// variants before any resilience decision is made.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkError {
    #[error("No network connectivity")]
    NoConnectivity,

    #[error("Request timed out")]
    Timeout,

    #[error("Server error (HTTP {status})")]
    ServerError { status: u16 },

    #[error("Bad gateway")]
    BadGateway,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("DNS resolution failed")]
    DnsError,

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_seconds: Option<u64> },

    #[error("Client error (HTTP {status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Resource not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Unknown error: {message}")]
    Unknown { message: String, retryable: bool },
}

impl NetworkError {
    /// Classification tag of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoConnectivity => ErrorKind::NoConnectivity,
            Self::Timeout => ErrorKind::Timeout,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::BadGateway => ErrorKind::BadGateway,
            Self::ServiceUnavailable => ErrorKind::ServiceUnavailable,
            Self::DnsError => ErrorKind::DnsError,
            Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Self::ClientError { .. } => ErrorKind::ClientError,
            Self::NotFound => ErrorKind::NotFound,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// The error's own retryable flag.
    ///
    /// Transient infrastructure failures and rate limiting are retryable;
    /// deterministic rejections (4xx) never are. `Unknown` carries its flag.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NoConnectivity
            | Self::Timeout
            | Self::ServerError { .. }
            | Self::BadGateway
            | Self::ServiceUnavailable
            | Self::DnsError
            | Self::RateLimitExceeded { .. } => true,
            Self::ClientError { .. } | Self::NotFound | Self::Unauthorized => false,
            Self::Unknown { retryable, .. } => *retryable,
        }
    }

    /// Whether this failure says something about the health of the remote
    /// service. Only these failures move a circuit breaker.
    pub const fn is_service_failure(&self) -> bool {
        matches!(
            self,
            Self::ServerError { .. }
                | Self::BadGateway
                | Self::ServiceUnavailable
                | Self::Timeout
                | Self::NoConnectivity
                | Self::DnsError
        )
    }

    /// Server-dictated retry delay, if one was supplied.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after_seconds } => {
                retry_after_seconds.map(Duration::from_secs)
            }
            _ => None,
        }
    }

    /// Map a non-success HTTP status into a classified error.
    ///
    /// `retry_after_seconds` is only consulted for 429 responses; `message`
    /// is kept for generic 4xx rejections.
    pub fn from_status(status: u16, retry_after_seconds: Option<u64>, message: &str) -> Self {
        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            429 => Self::RateLimitExceeded { retry_after_seconds },
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            500..=599 => Self::ServerError { status },
            400..=499 => Self::ClientError { status, message: message.to_string() },
            _ => Self::Unknown {
                message: format!("unexpected HTTP status {status}: {message}"),
                retryable: false,
            },
        }
    }
}
