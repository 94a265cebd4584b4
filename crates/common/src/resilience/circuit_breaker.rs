//! Circuit breaker state machine
//!
//! ```text
//!            failure_threshold service failures
//!   CLOSED ─────────────────────────────────────▶ OPEN
//!     ▲                                            │  open_timeout elapsed,
//!     │ success_threshold successes                │  next allowance check
//!     │                                            ▼
//!     └──────────────────────────────────────── HALF_OPEN
//!                    any failure ──▶ OPEN
//! ```
//!
//! All state lives behind one [`parking_lot::Mutex`], so every operation is
//! an atomic transaction against the breaker. The lock is never held across
//! a transport call or a retry delay.
//!
//! Only service failures (see [`ErrorClassification::is_service_failure`])
//! move the breaker. A rejected request body or a missing resource says
//! nothing about the health of the backend and is ignored.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use petclinic_domain::CircuitBreakerSettings;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult, ErrorClassification};
use crate::time::{Clock, SystemClock};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, letting probe requests test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive service failures that open the circuit
    pub failure_threshold: u32,
    /// Consecutive probe successes that close the circuit from half-open
    pub success_threshold: u32,
    /// Time since the last failure before an open circuit admits a probe
    pub open_timeout: Duration,
    /// Time after which an unreported half-open probe is presumed lost
    pub half_open_probe_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from_settings(&CircuitBreakerSettings::default())
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn from_settings(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            success_threshold: settings.success_threshold,
            open_timeout: Duration::from_millis(settings.open_timeout_ms),
            half_open_probe_timeout: Duration::from_millis(settings.half_open_probe_timeout_ms),
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for zero thresholds or a zero probe
    /// timeout.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::invalid("success_threshold must be greater than 0"));
        }
        if self.half_open_probe_timeout.is_zero() {
            return Err(ConfigError::invalid("half_open_probe_timeout must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    pub fn half_open_probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.half_open_probe_timeout = timeout;
        self
    }

    /// Set a custom clock and build a breaker directly
    pub fn clock<C: Clock>(self, clock: C) -> CircuitBreakerBuilderWithClock<C> {
        CircuitBreakerBuilderWithClock { config: self.config, clock }
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] if validation fails.
    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder with custom clock that builds a [`CircuitBreaker`] directly
pub struct CircuitBreakerBuilderWithClock<C: Clock> {
    config: CircuitBreakerConfig,
    clock: C,
}

impl<C: Clock> CircuitBreakerBuilderWithClock<C> {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    pub fn half_open_probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.half_open_probe_timeout = timeout;
        self
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] if validation fails.
    pub fn build(self) -> ConfigResult<CircuitBreaker<C>> {
        CircuitBreaker::with_clock(self.config, self.clock)
    }
}

/// Admission handed out by [`CircuitBreaker::try_acquire`]
///
/// A permit issued in half-open carries the id of the probe slot it holds,
/// so only that call can release the slot through
/// [`CircuitBreaker::abandon_call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPermit {
    probe: Option<u64>,
}

impl CallPermit {
    /// Whether this call is the half-open probe
    pub const fn is_probe(&self) -> bool {
        self.probe.is_some()
    }
}

/// Read-only snapshot for logging and dashboards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failure_count: u32,
    pub consecutive_success_count: u32,
    pub last_failure_at: Option<Instant>,
    /// Wall-clock time of the last failure, milliseconds since the epoch
    pub last_failure_epoch_ms: Option<u64>,
    pub state_changed_at: Instant,
    /// Calls refused since creation or the last reset
    pub rejected_calls: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
    last_failure_epoch_ms: Option<u64>,
    state_changed_at: Instant,
    probe_started_at: Option<Instant>,
    probe_id: u64,
    rejected_calls: u64,
}

impl BreakerState {
    const fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
            last_failure_epoch_ms: None,
            state_changed_at: now,
            probe_started_at: None,
            probe_id: 0,
            rejected_calls: 0,
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant) {
        let from = self.state;
        self.state = to;
        self.state_changed_at = now;
        self.probe_started_at = None;
        match to {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.consecutive_successes = 0;
                info!(%from, to = %to, "Circuit breaker closed");
            }
            CircuitState::Open => {
                self.consecutive_successes = 0;
                warn!(
                    %from,
                    to = %to,
                    failures = self.consecutive_failures,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                self.consecutive_successes = 0;
                info!(%from, to = %to, "Circuit breaker half-open, admitting probe");
            }
        }
    }

    fn reject(&mut self) -> Option<CallPermit> {
        self.rejected_calls = self.rejected_calls.saturating_add(1);
        debug!(state = %self.state, "Circuit breaker rejecting call");
        None
    }

    fn take_probe_slot(&mut self, now: Instant) -> Option<CallPermit> {
        self.probe_id = self.probe_id.wrapping_add(1);
        self.probe_started_at = Some(now);
        Some(CallPermit { probe: Some(self.probe_id) })
    }
}

/// Concurrency-safe circuit breaker
///
/// Share it behind an `Arc`; one instance per protected backend and
/// session.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .field("consecutive_successes", &inner.consecutive_successes)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the configuration is invalid.
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker using the builder pattern
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the configuration is invalid.
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let now = clock.now();
        Ok(Self { config, inner: Mutex::new(BreakerState::new(now)), clock })
    }

    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call may be issued right now.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open here and
    /// admits the caller as its probe. While a probe is outstanding further
    /// callers are refused, until the probe reports, is abandoned, or exceeds
    /// `half_open_probe_timeout`.
    pub fn is_call_allowed(&self) -> bool {
        self.try_acquire().is_some()
    }

    /// Admission check that returns a [`CallPermit`] for the admitted call.
    pub fn try_acquire(&self) -> Option<CallPermit> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Some(CallPermit { probe: None }),
            CircuitState::Open => {
                let cooled_down = inner.last_failure_at.map_or(true, |at| {
                    now.saturating_duration_since(at) >= self.config.open_timeout
                });
                if !cooled_down {
                    return inner.reject();
                }
                inner.transition(CircuitState::HalfOpen, now);
                inner.take_probe_slot(now)
            }
            CircuitState::HalfOpen => {
                let slot_free = inner.probe_started_at.map_or(true, |started| {
                    now.saturating_duration_since(started) >= self.config.half_open_probe_timeout
                });
                if !slot_free {
                    return inner.reject();
                }
                inner.take_probe_slot(now)
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.probe_started_at = None;
                inner.consecutive_successes = inner.consecutive_successes.saturating_add(1);
                debug!(
                    successes = inner.consecutive_successes,
                    threshold = self.config.success_threshold,
                    "Circuit breaker probe succeeded"
                );
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.transition(CircuitState::Closed, now);
                }
            }
            CircuitState::Open => debug!("Ignoring success reported while circuit is open"),
        }
    }

    /// Record a failed call. Failures that are not service failures leave
    /// state and counters alone; in half-open they only free the probe slot.
    pub fn record_failure<E>(&self, error: &E)
    where
        E: ErrorClassification + fmt::Display + ?Sized,
    {
        if !error.is_service_failure() {
            let mut inner = self.inner.lock();
            if inner.state == CircuitState::HalfOpen {
                inner.probe_started_at = None;
            }
            debug!(error = %error, "Circuit breaker ignoring non-service failure");
            return;
        }

        let now = self.clock.now();
        let epoch_ms = self.clock.millis_since_epoch();
        let mut inner = self.inner.lock();
        inner.last_failure_at = Some(now);
        inner.last_failure_epoch_ms = Some(epoch_ms);

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                debug!(
                    error = %error,
                    failures = inner.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker recorded failure"
                );
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.transition(CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_failures = self.config.failure_threshold;
                inner.transition(CircuitState::Open, now);
            }
            CircuitState::Open => {
                debug!(error = %error, "Failure while open extends cooldown");
            }
        }
    }

    /// Release the half-open probe slot held by `permit` for a call that was
    /// cancelled before it produced an outcome. Records nothing, and does
    /// nothing for permits that do not hold the current slot.
    pub fn abandon_call(&self, permit: CallPermit) {
        let Some(probe) = permit.probe else {
            return;
        };
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen
            && inner.probe_id == probe
            && inner.probe_started_at.take().is_some()
        {
            debug!(probe, "Half-open probe abandoned");
        }
    }

    /// Current state, without the open-to-half-open check
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot of the breaker for observability
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            consecutive_failure_count: inner.consecutive_failures,
            consecutive_success_count: inner.consecutive_successes,
            last_failure_at: inner.last_failure_at,
            last_failure_epoch_ms: inner.last_failure_epoch_ms,
            state_changed_at: inner.state_changed_at,
            rejected_calls: inner.rejected_calls,
        }
    }

    /// Force the breaker back to closed, dropping all history
    pub fn reset(&self) {
        let now = self.clock.now();
        *self.inner.lock() = BreakerState::new(now);
        info!("Circuit breaker manually reset to closed state");
    }
}
