//! Application constants
//!
//! Centralized defaults for the network resilience layer. Configuration
//! structs fall back to these values when a field is omitted.

// API client
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_USER_AGENT: &str = concat!("petclinic-client/", env!("CARGO_PKG_VERSION"));

// Token lifecycle
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

// Circuit breaker
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;
pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_HALF_OPEN_PROBE_TIMEOUT_MS: u64 = 30_000;

// Retry (DEFAULT preset values)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;
