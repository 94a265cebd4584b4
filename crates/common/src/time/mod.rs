//! Time abstraction
//!
//! Components that make timing decisions (circuit breaker cooldowns, token
//! expiry) read time through [`Clock`] so tests can drive it with
//! [`MockClock`] instead of sleeping.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
