//! Custom assertions for testing

// These assertions are designed to panic on failure
#![allow(clippy::missing_panics_doc)]

use std::time::Duration;

/// Assert that an error's `Display` output contains a substring
///
/// ```
/// let result: Result<(), String> = Err("Request timed out".to_string());
/// petclinic_common::assert_error_contains!(result, "timed out");
/// ```
#[macro_export]
macro_rules! assert_error_contains {
    ($result:expr, $substring:expr) => {
        match &$result {
            Ok(_) => panic!("Expected error but got Ok"),
            Err(e) => {
                let error_msg = format!("{}", e);
                assert!(
                    error_msg.contains($substring),
                    "Error message '{}' does not contain '{}'",
                    error_msg,
                    $substring
                );
            }
        }
    };
}

/// Assert that a duration is within an acceptable range
///
/// ```
/// use std::time::Duration;
///
/// use petclinic_common::testing::assertions::assert_duration_in_range;
///
/// let actual = Duration::from_millis(105);
/// assert_duration_in_range(actual, Duration::from_millis(100), Duration::from_millis(10));
/// ```
pub fn assert_duration_in_range(actual: Duration, expected: Duration, tolerance: Duration) {
    let min = expected.saturating_sub(tolerance);
    let max = expected + tolerance;

    assert!(
        actual >= min && actual <= max,
        "Duration {:?} not in range [{:?}, {:?}]",
        actual,
        min,
        max
    );
}

/// Assert that a delay lies within `base * (1 ± jitter_factor)`, allowing one
/// millisecond for truncation.
///
/// ```
/// use std::time::Duration;
///
/// use petclinic_common::testing::assert_jittered;
///
/// assert_jittered(Duration::from_millis(1_080), Duration::from_secs(1), 0.1);
/// ```
pub fn assert_jittered(actual: Duration, base: Duration, jitter_factor: f64) {
    let spread = base.mul_f64(jitter_factor) + Duration::from_millis(1);
    assert_duration_in_range(actual, base, spread);
}
