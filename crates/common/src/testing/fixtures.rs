//! Canonical error sets

use petclinic_domain::NetworkError;

/// One instance of every error that counts against a circuit breaker
pub fn service_failures() -> Vec<NetworkError> {
    vec![
        NetworkError::NoConnectivity,
        NetworkError::Timeout,
        NetworkError::ServerError { status: 500 },
        NetworkError::BadGateway,
        NetworkError::ServiceUnavailable,
        NetworkError::DnsError,
    ]
}

/// Errors that must never move a circuit breaker
pub fn non_service_failures() -> Vec<NetworkError> {
    vec![
        NetworkError::RateLimitExceeded { retry_after_seconds: None },
        NetworkError::ClientError { status: 400, message: "invalid pet name".to_string() },
        NetworkError::ClientError { status: 409, message: "duplicate visit".to_string() },
        NetworkError::NotFound,
        NetworkError::Unauthorized,
        NetworkError::Unknown { message: "unexpected".to_string(), retryable: false },
    ]
}
