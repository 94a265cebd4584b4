//! Resilience patterns for calls to the clinic backend
//!
//! - **Retry policy**: decides whether a failed call is retried and how long
//!   to back off (exponential with symmetric jitter, `Retry-After` aware)
//! - **Circuit breaker**: fails fast while the backend is unhealthy and
//!   probes for recovery after a cooldown
//!
//! Neither component performs I/O or sleeps. The request executor in the
//! infrastructure crate composes them around a transport.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerBuilderWithClock, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState,
};
pub use retry::{RetryContext, RetryPolicy, RetryPolicyBuilder};
