//! Retry policy with exponential backoff and symmetric jitter
//!
//! [`RetryPolicy`] is an immutable decision value: it never sleeps and never
//! performs I/O. The request executor asks it two questions after each
//! failed attempt:
//!
//! 1. [`RetryPolicy::should_retry`]: is another attempt allowed for this
//!    error, given how many attempts were already made?
//! 2. [`RetryPolicy::delay_for`]: how long to wait before it?
//!
//! # Retry decision
//!
//! The error's own retryable flag is authoritative. An error that reports
//! `is_retryable() == false` is never retried, even if its kind is in
//! [`RetryPolicy::retryable_kinds`]. For errors that are retryable, the kind
//! set acts as a secondary filter. Rate limiting bypasses the set: the
//! server explicitly invited another attempt.
//!
//! # Delay
//!
//! ```text
//! base(n)  = min(initial_delay * multiplier^n, max_delay)
//! delay(n) = max(0, base(n) + base(n) * jitter_factor * U(-1, 1))
//! ```
//!
//! so every computed delay lies within `max_delay * (1 + jitter_factor)`.

use std::collections::HashSet;
use std::time::Duration;

use petclinic_domain::{CustomRetrySettings, ErrorKind, NetworkError, RetryPreset, RetrySettings};
use rand::Rng;

use crate::error::{ConfigError, ConfigResult};

/// Immutable retry configuration and decision logic.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter_factor: f64,
    retryable_kinds: HashSet<ErrorKind>,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Single attempt, never retries.
    pub fn none() -> Self {
        Self::preset(1, 0, 0, 1.0, 0.0)
    }

    /// Two attempts with long, lightly jittered delays.
    pub fn conservative() -> Self {
        Self::preset(2, 2_000, 10_000, 2.0, 0.1)
    }

    /// Three attempts starting at one second, doubling, capped at ten.
    pub fn standard() -> Self {
        Self::preset(3, 1_000, 10_000, 2.0, 0.1)
    }

    /// Five attempts with short initial delays and wider jitter.
    pub fn aggressive() -> Self {
        Self::preset(5, 500, 30_000, 1.5, 0.2)
    }

    pub fn from_preset(preset: RetryPreset) -> Self {
        match preset {
            RetryPreset::None => Self::none(),
            RetryPreset::Conservative => Self::conservative(),
            RetryPreset::Default => Self::standard(),
            RetryPreset::Aggressive => Self::aggressive(),
        }
    }

    /// Build a policy from configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when explicit settings fail
    /// validation.
    pub fn from_settings(settings: &RetrySettings) -> ConfigResult<Self> {
        match settings {
            RetrySettings::Preset(preset) => Ok(Self::from_preset(*preset)),
            RetrySettings::Custom(CustomRetrySettings {
                max_attempts,
                initial_delay_ms,
                max_delay_ms,
                backoff_multiplier,
                jitter_factor,
            }) => Self::builder()
                .max_attempts(*max_attempts)
                .initial_delay(Duration::from_millis(*initial_delay_ms))
                .max_delay(Duration::from_millis(*max_delay_ms))
                .backoff_multiplier(*backoff_multiplier)
                .jitter_factor(*jitter_factor)
                .build(),
        }
    }

    fn preset(
        max_attempts: u32,
        initial_ms: u64,
        max_ms: u64,
        backoff_multiplier: f64,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            backoff_multiplier,
            jitter_factor,
            retryable_kinds: ErrorKind::DEFAULT_RETRYABLE.into_iter().collect(),
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub const fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub const fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub const fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    pub const fn retryable_kinds(&self) -> &HashSet<ErrorKind> {
        &self.retryable_kinds
    }

    /// Classification half of [`should_retry`](Self::should_retry), ignoring
    /// the attempt budget.
    pub fn is_retryable(&self, error: &NetworkError) -> bool {
        if matches!(error, NetworkError::RateLimitExceeded { .. }) {
            return true;
        }
        error.is_retryable() && self.retryable_kinds.contains(&error.kind())
    }

    /// Whether another attempt may follow a failure.
    ///
    /// `attempts_made` counts the attempts already issued, including the one
    /// that just failed, so a policy with `max_attempts == 3` issues at most
    /// three requests.
    pub fn should_retry(&self, error: &NetworkError, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts && self.is_retryable(error)
    }

    /// Exponential delay for the zero-based `attempt`, capped at `max_delay`,
    /// without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped_ms as u64)
    }

    /// Backoff delay for the zero-based `attempt` with jitter from the thread
    /// RNG.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        self.compute_delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Same as [`compute_delay`](Self::compute_delay) with a caller-supplied
    /// RNG.
    pub fn compute_delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_factor <= f64::EPSILON || base.is_zero() {
            return base;
        }

        let base_ms = base.as_millis() as f64;
        let offset_ms = base_ms * self.jitter_factor * rng.gen_range(-1.0..=1.0);
        Duration::from_millis((base_ms + offset_ms).max(0.0) as u64)
    }

    /// Delay after a 429: the server's `Retry-After` exactly, or the
    /// second backoff step when none was sent.
    pub fn rate_limit_delay(&self, retry_after_seconds: Option<u64>) -> Duration {
        match retry_after_seconds {
            Some(seconds) => Duration::from_secs(seconds),
            None => self.compute_delay(1),
        }
    }

    /// Delay to wait after `error` ended the zero-based `attempt`.
    pub fn delay_for(&self, error: &NetworkError, attempt: u32) -> Duration {
        match error {
            NetworkError::RateLimitExceeded { retry_after_seconds } => {
                self.rate_limit_delay(*retry_after_seconds)
            }
            _ => self.compute_delay(attempt),
        }
    }

    /// Validate invariants.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first violated rule.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be at least 1"));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::invalid(format!(
                "initial_delay ({:?}) must not exceed max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid("backoff_multiplier must be a finite value >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::invalid("jitter_factor must be within [0, 1]"));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builder for [`RetryPolicy`], starting from the standard preset.
#[derive(Debug)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::standard() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.policy.backoff_multiplier = multiplier;
        self
    }

    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.policy.jitter_factor = factor;
        self
    }

    pub fn no_jitter(self) -> Self {
        self.jitter_factor(0.0)
    }

    /// Replace the retryable kind set.
    pub fn retryable_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.policy.retryable_kinds = kinds.into_iter().collect();
        self
    }

    pub fn retryable_kind(mut self, kind: ErrorKind) -> Self {
        self.policy.retryable_kinds.insert(kind);
        self
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the policy fails validation.
    pub fn build(self) -> ConfigResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

/// Per-call-sequence retry bookkeeping.
///
/// Advanced by value: [`next_attempt`](Self::next_attempt) returns a new
/// context and leaves the old one untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryContext {
    attempt_number: u32,
    last_error: Option<NetworkError>,
    total_delay: Duration,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-based index of the attempt about to be issued; equals the number
    /// of attempts already made.
    pub const fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub const fn last_error(&self) -> Option<&NetworkError> {
        self.last_error.as_ref()
    }

    /// Sum of all backoff delays scheduled so far.
    pub const fn total_delay(&self) -> Duration {
        self.total_delay
    }

    #[must_use]
    pub fn next_attempt(&self, error: NetworkError, delay: Duration) -> Self {
        Self {
            attempt_number: self.attempt_number.saturating_add(1),
            last_error: Some(error),
            total_delay: self.total_delay.saturating_add(delay),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for retry decisions and delay computation.

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn server_error() -> NetworkError {
        NetworkError::ServerError { status: 500 }
    }

    /// Validates preset values.
    ///
    /// Assertions:
    /// - Each preset carries the documented attempts, delays, multiplier and
    ///   jitter.
    /// - `Default` equals the standard preset.
    #[test]
    fn test_presets() {
        let none = RetryPolicy::none();
        assert_eq!(none.max_attempts(), 1);
        assert_eq!(none.max_delay(), Duration::ZERO);

        let conservative = RetryPolicy::conservative();
        assert_eq!(conservative.max_attempts(), 2);
        assert_eq!(conservative.initial_delay(), Duration::from_millis(2_000));

        let standard = RetryPolicy::default();
        assert_eq!(standard.max_attempts(), 3);
        assert_eq!(standard.initial_delay(), Duration::from_millis(1_000));
        assert_eq!(standard.max_delay(), Duration::from_millis(10_000));
        assert!((standard.backoff_multiplier() - 2.0).abs() < f64::EPSILON);
        assert_eq!(standard, RetryPolicy::from_preset(RetryPreset::Default));

        let aggressive = RetryPolicy::aggressive();
        assert_eq!(aggressive.max_attempts(), 5);
        assert!((aggressive.jitter_factor() - 0.2).abs() < f64::EPSILON);

        for preset in [RetryPreset::None, RetryPreset::Conservative, RetryPreset::Aggressive] {
            assert!(RetryPolicy::from_preset(preset).validate().is_ok());
        }
    }

    /// Validates the attempt cap.
    ///
    /// Assertions:
    /// - No error kind is retried once `attempts_made >= max_attempts`.
    #[test]
    fn test_should_retry_stops_at_max_attempts() {
        let policy = RetryPolicy::standard();
        let errors = [
            server_error(),
            NetworkError::Timeout,
            NetworkError::RateLimitExceeded { retry_after_seconds: Some(1) },
            NetworkError::NotFound,
        ];

        for error in &errors {
            for attempts_made in 3..10 {
                assert!(!policy.should_retry(error, attempts_made), "{error:?} @ {attempts_made}");
            }
        }
    }

    /// Validates classification under the attempt cap.
    ///
    /// Assertions:
    /// - Every default-retryable kind is retried below the cap.
    /// - Client-side rejections are never retried.
    #[test]
    fn test_should_retry_by_classification() {
        let policy = RetryPolicy::standard();
        let retryable = [
            NetworkError::NoConnectivity,
            NetworkError::Timeout,
            server_error(),
            NetworkError::BadGateway,
            NetworkError::ServiceUnavailable,
            NetworkError::DnsError,
            NetworkError::RateLimitExceeded { retry_after_seconds: None },
        ];
        for error in &retryable {
            assert!(policy.should_retry(error, 1), "{error:?} should be retried");
            assert!(policy.should_retry(error, 2), "{error:?} should be retried");
        }

        let terminal = [
            NetworkError::ClientError { status: 400, message: "bad".into() },
            NetworkError::NotFound,
            NetworkError::Unauthorized,
            NetworkError::Unknown { message: "?".into(), retryable: false },
        ];
        for error in &terminal {
            for attempts_made in 0..3 {
                assert!(!policy.should_retry(error, attempts_made), "{error:?} retried");
            }
        }
    }

    /// Validates precedence between the error flag, the kind set and the
    /// rate-limit override.
    ///
    /// Assertions:
    /// - A kind outside the set is not retried even if flagged retryable.
    /// - A kind inside the set is not retried if flagged non-retryable.
    /// - Rate limiting is retried even when absent from the set.
    #[test]
    fn test_retry_precedence() {
        let policy = RetryPolicy::builder()
            .retryable_kinds([ErrorKind::Timeout, ErrorKind::Unknown])
            .build()
            .unwrap();

        assert!(policy.should_retry(&NetworkError::Timeout, 1));
        assert!(!policy.should_retry(&server_error(), 1));
        assert!(policy.should_retry(
            &NetworkError::Unknown { message: "flaky".into(), retryable: true },
            1
        ));
        assert!(!policy.should_retry(
            &NetworkError::Unknown { message: "fatal".into(), retryable: false },
            1
        ));
        assert!(policy.should_retry(&NetworkError::RateLimitExceeded { retry_after_seconds: None }, 1));
    }

    /// Validates exponential growth and the cap without jitter.
    ///
    /// Assertions:
    /// - Delays double from the initial delay.
    /// - Delays saturate at `max_delay`, including for huge attempt numbers.
    #[test]
    fn test_base_delay_exponential_and_capped() {
        let policy = RetryPolicy::builder().no_jitter().build().unwrap();

        assert_eq!(policy.compute_delay(0), Duration::from_millis(1_000));
        assert_eq!(policy.compute_delay(1), Duration::from_millis(2_000));
        assert_eq!(policy.compute_delay(2), Duration::from_millis(4_000));
        assert_eq!(policy.compute_delay(3), Duration::from_millis(8_000));
        assert_eq!(policy.compute_delay(4), Duration::from_millis(10_000));
        assert_eq!(policy.compute_delay(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_zero_initial_delay_stays_zero() {
        let policy =
            RetryPolicy::builder().initial_delay(Duration::ZERO).no_jitter().build().unwrap();

        assert_eq!(policy.base_delay(0), Duration::ZERO);
        assert_eq!(policy.base_delay(3), Duration::ZERO);
        assert_eq!(policy.base_delay(u32::MAX), Duration::ZERO);
    }

    /// Validates the jitter envelope.
    ///
    /// Assertions:
    /// - Every sampled delay lies within `base * (1 ± jitter)`.
    /// - No sample exceeds `max_delay * (1 + jitter)`.
    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::aggressive();
        let mut rng = StdRng::seed_from_u64(42);
        let ceiling = policy.max_delay().as_millis() as f64 * (1.0 + policy.jitter_factor());

        for attempt in 0..20 {
            let base = policy.base_delay(attempt).as_millis() as f64;
            for _ in 0..50 {
                let delay = policy.compute_delay_with_rng(attempt, &mut rng).as_millis() as f64;
                assert!(delay >= base * 0.8 - 1.0, "attempt {attempt}: {delay} < {base}*0.8");
                assert!(delay <= base * 1.2 + 1.0, "attempt {attempt}: {delay} > {base}*1.2");
                assert!(delay <= ceiling + 1.0);
            }
        }
    }

    /// Validates that jittered delays grow in expectation.
    ///
    /// Assertions:
    /// - The sample mean for attempt `n + 1` is at least the mean for `n`.
    #[test]
    fn test_jittered_delay_non_decreasing_in_expectation() {
        let policy = RetryPolicy::standard();
        let mut rng = StdRng::seed_from_u64(7);
        let mean = |attempt: u32, rng: &mut StdRng| {
            let total: u128 =
                (0..200).map(|_| policy.compute_delay_with_rng(attempt, rng).as_millis()).sum();
            total / 200
        };

        let mut previous = 0;
        for attempt in 0..6 {
            let current = mean(attempt, &mut rng);
            // The cap can make neighbouring means equal up to sampling noise.
            assert!(current + 150 >= previous, "attempt {attempt}: {current} < {previous}");
            previous = current;
        }
    }

    /// Validates rate-limit delay selection.
    ///
    /// Assertions:
    /// - `Retry-After` is honored exactly.
    /// - Without it, the delay falls in the jittered envelope of step 1.
    /// - `delay_for` routes 429s through the rate-limit path.
    #[test]
    fn test_rate_limit_delay() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.rate_limit_delay(Some(3)), Duration::from_secs(3));

        let fallback = policy.rate_limit_delay(None);
        assert!(fallback >= Duration::from_millis(1_800));
        assert!(fallback <= Duration::from_millis(2_200));

        let limited = NetworkError::RateLimitExceeded { retry_after_seconds: Some(12) };
        assert_eq!(policy.delay_for(&limited, 0), Duration::from_secs(12));
    }

    /// Validates configuration checks.
    ///
    /// Assertions:
    /// - Zero attempts, inverted delays, shrinking multipliers and
    ///   out-of-range jitter are rejected.
    #[test]
    fn test_builder_validation() {
        assert!(RetryPolicy::builder().max_attempts(0).build().is_err());
        assert!(RetryPolicy::builder()
            .initial_delay(Duration::from_secs(20))
            .max_delay(Duration::from_secs(10))
            .build()
            .is_err());
        assert!(RetryPolicy::builder().backoff_multiplier(0.5).build().is_err());
        assert!(RetryPolicy::builder().jitter_factor(1.5).build().is_err());
        assert!(RetryPolicy::builder().jitter_factor(-0.1).build().is_err());
        assert!(RetryPolicy::builder().max_attempts(7).jitter_factor(1.0).build().is_ok());
    }

    #[test]
    fn test_from_settings() {
        let preset = RetryPolicy::from_settings(&RetrySettings::Preset(RetryPreset::None)).unwrap();
        assert_eq!(preset.max_attempts(), 1);

        let custom = RetryPolicy::from_settings(&RetrySettings::Custom(CustomRetrySettings {
            max_attempts: 4,
            initial_delay_ms: 100,
            max_delay_ms: 800,
            backoff_multiplier: 3.0,
            jitter_factor: 0.0,
        }))
        .unwrap();
        assert_eq!(custom.max_attempts(), 4);
        assert_eq!(custom.compute_delay(1), Duration::from_millis(300));
        assert_eq!(custom.compute_delay(2), Duration::from_millis(800));

        let invalid = RetrySettings::Custom(CustomRetrySettings {
            initial_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..CustomRetrySettings::default()
        });
        assert!(RetryPolicy::from_settings(&invalid).is_err());
    }

    /// Validates immutable context advancement.
    ///
    /// Assertions:
    /// - `next_attempt` leaves the original untouched.
    /// - Attempt count, last error and total delay accumulate.
    #[test]
    fn test_retry_context_advances_immutably() {
        let initial = RetryContext::new();
        let first = initial.next_attempt(server_error(), Duration::from_millis(100));
        let second = first.next_attempt(NetworkError::Timeout, Duration::from_millis(250));

        assert_eq!(initial.attempt_number(), 0);
        assert!(initial.last_error().is_none());
        assert_eq!(first.attempt_number(), 1);
        assert_eq!(second.attempt_number(), 2);
        assert_eq!(second.last_error(), Some(&NetworkError::Timeout));
        assert_eq!(second.total_delay(), Duration::from_millis(350));
    }
}
