//! Testing utilities and helpers
//!
//! - **[`assertions`]**: duration and error-message assertions
//! - **[`fixtures`]**: canonical error sets for classification tests
//! - [`MockClock`] re-exported from [`crate::time`]
//!
//! ```rust
//! use std::time::Duration;
//!
//! use petclinic_common::testing::{assert_duration_in_range, MockClock};
//!
//! let clock = MockClock::new();
//! clock.advance(Duration::from_millis(100));
//! assert_duration_in_range(clock.elapsed(), Duration::from_millis(100), Duration::ZERO);
//! ```

pub mod assertions;
pub mod fixtures;

// Macros exported with #[macro_export] are available at crate root
pub use assertions::{assert_duration_in_range, assert_jittered};
pub use fixtures::{non_service_failures, service_failures};

pub use crate::time::{Clock, MockClock, SystemClock};
