//! Request executor
//!
//! Runs one logical request through the breaker gate, credential lookup,
//! per-attempt timeout and retry loop. Attempts within a call are strictly
//! sequential; the breaker and token manager may be shared by any number of
//! concurrent executors.

use std::sync::Arc;
use std::time::Duration;

use petclinic_common::auth::{CredentialProvider, TokenManager};
use petclinic_common::error::{ErrorClassification, ErrorSeverity};
use petclinic_common::resilience::{CircuitBreaker, RetryContext, RetryPolicy};
use petclinic_common::time::{Clock, SystemClock};
use petclinic_domain::constants::DEFAULT_REQUEST_TIMEOUT_MS;
use petclinic_domain::{ApiSettings, ErrorKind, NetworkError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::errors::ApiError;
use super::transport::{ApiRequest, ApiResponse, Transport};

/// Per-executor knobs that are not part of the retry or breaker policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Upper bound on a single transport attempt. Expiry is a `Timeout`.
    pub attempt_timeout: Duration,
    /// Drop the session when the server answers 401.
    pub clear_tokens_on_unauthorized: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            clear_tokens_on_unauthorized: true,
        }
    }
}

impl From<&ApiSettings> for ExecutorConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            attempt_timeout: settings.request_timeout(),
            clear_tokens_on_unauthorized: settings.clear_tokens_on_unauthorized,
        }
    }
}

/// Outcome of one logical call plus what it took to get there.
#[derive(Debug)]
pub struct ExecutionReport {
    pub outcome: Result<ApiResponse, ApiError>,
    /// Transport attempts that produced an outcome. Cancelled and
    /// breaker-refused attempts are not counted.
    pub attempts: u32,
    /// Backoff delays scheduled between attempts, in order.
    pub delays: Vec<Duration>,
}

impl ExecutionReport {
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Resilient request executor
pub struct RequestExecutor<C: Clock = SystemClock> {
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker<C>>,
    credentials: Arc<dyn CredentialProvider>,
    tokens: Arc<TokenManager<C>>,
    policy: RetryPolicy,
    config: ExecutorConfig,
}

impl<C: Clock> std::fmt::Debug for RequestExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("policy", &self.policy)
            .field("breaker", &self.breaker)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Clock + 'static> RequestExecutor<C> {
    /// Executor whose bearer credential comes from `tokens`.
    pub fn new(
        transport: Arc<dyn Transport>,
        breaker: Arc<CircuitBreaker<C>>,
        tokens: Arc<TokenManager<C>>,
        policy: RetryPolicy,
        config: ExecutorConfig,
    ) -> Self {
        let credentials: Arc<dyn CredentialProvider> = tokens.clone();
        Self { transport, breaker, credentials, tokens, policy, config }
    }
}

impl<C: Clock> RequestExecutor<C> {
    /// Replace the credential source consulted before each attempt.
    ///
    /// `tokens` is still the session cleared on a 401.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker<C>> {
        &self.breaker
    }

    pub fn tokens(&self) -> &Arc<TokenManager<C>> {
        &self.tokens
    }

    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `request` until success or a terminal failure.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.execute_with_cancellation(request, &CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), abandoning the call as soon as
    /// `cancel` fires.
    pub async fn execute_with_cancellation(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        self.execute_with_report(request, cancel).await.outcome
    }

    /// Run the retry loop and return the outcome with attempt bookkeeping.
    ///
    /// Per attempt:
    /// 1. Ask the breaker for permission; refusal ends the call with
    ///    [`ApiError::CircuitOpen`] without touching the transport.
    /// 2. Attach the current access token when the request requires auth.
    /// 3. Call the transport under the attempt timeout.
    /// 4. Report the outcome to the breaker.
    /// 5. On failure, consult the retry policy and sleep the backoff delay.
    ///
    /// Cancellation records nothing against the breaker and consumes no
    /// attempt.
    #[instrument(skip(self, request, cancel), fields(method = %request.method, path = %request.path))]
    pub async fn execute_with_report(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> ExecutionReport {
        let mut context = RetryContext::new();
        let mut delays = Vec::new();

        let outcome = loop {
            let attempts_made = context.attempt_number();

            if cancel.is_cancelled() {
                break Err(ApiError::Cancelled { attempts: attempts_made });
            }

            let Some(permit) = self.breaker.try_acquire() else {
                warn!(
                    attempts = attempts_made,
                    state = %self.breaker.state(),
                    "Circuit open, failing fast"
                );
                break Err(ApiError::CircuitOpen {
                    attempts: attempts_made,
                    last_error: context.last_error().cloned(),
                });
            };

            let credential =
                if request.requires_auth { self.credentials.access_token() } else { None };
            debug!(
                attempt = attempts_made + 1,
                authenticated = credential.is_some(),
                "Issuing request"
            );

            let attempt = tokio::time::timeout(
                self.config.attempt_timeout,
                self.transport.execute(request, credential.as_deref()),
            );
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = attempt => Some(result.unwrap_or_else(|_elapsed| Err(NetworkError::Timeout))),
            };

            let Some(result) = result else {
                self.breaker.abandon_call(permit);
                info!(attempts = attempts_made, "Request cancelled in flight");
                break Err(ApiError::Cancelled { attempts: attempts_made });
            };

            let error = match result {
                Ok(response) => {
                    self.breaker.record_success();
                    debug!(attempt = attempts_made + 1, status = response.status, "Request succeeded");
                    break Ok(response);
                }
                Err(error) => error,
            };

            self.breaker.record_failure(&error);
            if error.kind() == ErrorKind::Unauthorized && self.config.clear_tokens_on_unauthorized {
                self.tokens.clear_tokens();
            }

            let attempts_made = attempts_made + 1;
            if !self.policy.should_retry(&error, attempts_made) {
                break Err(self.terminal_error(error, attempts_made));
            }

            let delay = self.policy.delay_for(&error, context.attempt_number());
            warn!(
                attempt = attempts_made,
                error_kind = %error.kind(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Request failed, retrying"
            );
            context = context.next_attempt(error, delay);
            delays.push(delay);

            let slept = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                () = tokio::time::sleep(delay) => true,
            };
            if !slept {
                info!(attempts = attempts_made, "Request cancelled during backoff");
                break Err(ApiError::Cancelled { attempts: attempts_made });
            }
        };

        let attempts = outcome.as_ref().map_or_else(ApiError::attempts, |_| delays.len() as u32 + 1);
        ExecutionReport { outcome, attempts, delays }
    }

    fn terminal_error(&self, error: NetworkError, attempts: u32) -> ApiError {
        let terminal = if self.policy.is_retryable(&error) {
            ApiError::RetriesExhausted { attempts, last_error: error }
        } else {
            ApiError::NonRetryable { attempts, error }
        };

        match terminal.severity() {
            ErrorSeverity::Info => {
                info!(attempts, error_kind = terminal.kind_label(), error = %terminal, "Request failed");
            }
            ErrorSeverity::Warning => {
                warn!(attempts, error_kind = terminal.kind_label(), error = %terminal, "Request failed");
            }
            ErrorSeverity::Error => {
                error!(attempts, error_kind = terminal.kind_label(), error = %terminal, "Request failed");
            }
        }
        terminal
    }
}

#[cfg(test)]
mod tests {
    use petclinic_common::resilience::{CircuitBreakerConfig, CircuitState};
    use petclinic_common::time::MockClock;

    use super::*;
    use crate::testing::ScriptedTransport;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        executor: RequestExecutor<MockClock>,
        clock: MockClock,
    }

    fn harness(policy: RetryPolicy, breaker: CircuitBreakerConfig) -> Harness {
        let clock = MockClock::new();
        let transport = Arc::new(ScriptedTransport::new());
        let executor = RequestExecutor::new(
            transport.clone(),
            Arc::new(CircuitBreaker::with_clock(breaker, clock.clone()).unwrap()),
            Arc::new(TokenManager::with_clock(clock.clone(), Duration::from_secs(3600))),
            policy,
            ExecutorConfig::default(),
        );
        Harness { transport, executor, clock }
    }

    fn no_jitter_standard() -> RetryPolicy {
        RetryPolicy::builder().no_jitter().build().unwrap()
    }

    /// Validates retry after two server errors.
    ///
    /// Assertions:
    /// - The third attempt succeeds.
    /// - Delays follow the 1s, 2s exponential schedule.
    /// - The breaker ends closed with its failure count reset.
    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let h = harness(no_jitter_standard(), CircuitBreakerConfig::default());
        h.transport
            .push_err(NetworkError::ServerError { status: 500 })
            .push_err(NetworkError::ServerError { status: 503 })
            .push_ok(200, r#"{"id": 1}"#);

        let report = h.executor.execute_with_report(&ApiRequest::get("/owners/1"), &CancellationToken::new()).await;

        assert_eq!(report.outcome.as_ref().unwrap().status, 200);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(report.total_delay(), Duration::from_secs(3));
        assert_eq!(h.transport.calls(), 3);
        let metrics = h.executor.breaker().metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.consecutive_failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let h = harness(no_jitter_standard(), CircuitBreakerConfig::default());
        for _ in 0..3 {
            h.transport.push_err(NetworkError::Timeout);
        }

        let err = h.executor.execute(&ApiRequest::get("/vets")).await.unwrap_err();

        assert_eq!(err, ApiError::RetriesExhausted { attempts: 3, last_error: NetworkError::Timeout });
        assert_eq!(h.transport.calls(), 3);
        assert_eq!(h.executor.breaker().metrics().consecutive_failure_count, 3);
    }

    /// Validates that deterministic rejections are terminal.
    ///
    /// Assertions:
    /// - One attempt only.
    /// - The breaker does not count the failure.
    #[tokio::test(start_paused = true)]
    async fn test_client_error_not_retried() {
        let h = harness(RetryPolicy::aggressive(), CircuitBreakerConfig::default());
        h.transport.push_err(NetworkError::ClientError { status: 400, message: "invalid pet".into() });

        let report = h.executor.execute_with_report(&ApiRequest::get("/pets"), &CancellationToken::new()).await;

        assert!(matches!(report.outcome, Err(ApiError::NonRetryable { attempts: 1, .. })));
        assert!(report.delays.is_empty());
        assert_eq!(h.executor.breaker().metrics().consecutive_failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_server_delay() {
        let h = harness(RetryPolicy::standard(), CircuitBreakerConfig::default());
        h.transport
            .push_err(NetworkError::RateLimitExceeded { retry_after_seconds: Some(7) })
            .push_ok(200, "{}");

        let report = h.executor.execute_with_report(&ApiRequest::get("/visits"), &CancellationToken::new()).await;

        assert!(report.outcome.is_ok());
        assert_eq!(report.delays, vec![Duration::from_secs(7)]);
    }

    /// Validates fail-fast while the circuit is open.
    ///
    /// Assertions:
    /// - No transport call is made.
    /// - The error reports zero attempts.
    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast() {
        let h = harness(RetryPolicy::standard(), CircuitBreakerConfig::default());
        for _ in 0..5 {
            h.executor.breaker().record_failure(&NetworkError::ServiceUnavailable);
        }

        let err = h.executor.execute(&ApiRequest::get("/owners")).await.unwrap_err();

        assert_eq!(err, ApiError::CircuitOpen { attempts: 0, last_error: None });
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opening_mid_sequence_stops_retries() {
        let breaker = CircuitBreakerConfig::builder().failure_threshold(2).build().unwrap();
        let h = harness(RetryPolicy::aggressive(), breaker);
        for _ in 0..5 {
            h.transport.push_err(NetworkError::BadGateway);
        }

        let err = h.executor.execute(&ApiRequest::get("/owners")).await.unwrap_err();

        assert_eq!(
            err,
            ApiError::CircuitOpen { attempts: 2, last_error: Some(NetworkError::BadGateway) }
        );
        assert_eq!(h.transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_closes_circuit() {
        let breaker = CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .success_threshold(1)
            .open_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        let h = harness(RetryPolicy::none(), breaker);
        h.executor.breaker().record_failure(&NetworkError::Timeout);
        h.clock.advance(Duration::from_secs(10));

        h.executor.execute(&ApiRequest::get("/vets")).await.unwrap();

        assert_eq!(h.executor.breaker().state(), CircuitState::Closed);
    }

    /// Validates the per-attempt timeout.
    ///
    /// Assertions:
    /// - A hung attempt becomes `Timeout` and is retried.
    /// - The timeout counts as a service failure.
    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_service_failure() {
        let mut h = harness(no_jitter_standard(), CircuitBreakerConfig::default());
        h.executor.config.attempt_timeout = Duration::from_millis(500);
        h.transport.push_hang().push_ok(200, "{}");

        let report = h.executor.execute_with_report(&ApiRequest::get("/pets"), &CancellationToken::new()).await;

        assert!(report.outcome.is_ok());
        assert_eq!(report.attempts, 2);
        assert!(h.executor.breaker().metrics().last_failure_at.is_some());
    }

    /// Validates that slow responses are bounded per attempt.
    ///
    /// Assertions:
    /// - A response slower than the attempt timeout becomes `Timeout`.
    /// - A slow response inside the bound is returned as-is.
    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_bounded_by_timeout() {
        let mut h = harness(no_jitter_standard(), CircuitBreakerConfig::default());
        h.executor.config.attempt_timeout = Duration::from_millis(500);
        h.transport
            .push_delayed(Duration::from_secs(2), Ok(ApiResponse::empty(200)))
            .push_delayed(Duration::from_millis(200), Ok(ApiResponse::new(201, "{}".as_bytes())));

        let report = h.executor.execute_with_report(&ApiRequest::get("/visits"), &CancellationToken::new()).await;

        assert_eq!(report.outcome.as_ref().unwrap().status, 201);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.delays, vec![Duration::from_secs(1)]);
        assert_eq!(h.executor.breaker().metrics().consecutive_failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bearer_token_attached_when_required() {
        let h = harness(RetryPolicy::none(), CircuitBreakerConfig::default());
        h.executor.tokens().set_access_token("vet-token", None);

        h.executor.execute(&ApiRequest::get("/owners")).await.unwrap();
        h.executor.execute(&ApiRequest::post("/login", serde_json::json!({})).unauthenticated()).await.unwrap();

        assert_eq!(h.transport.credentials(), vec![Some("vet-token".to_string()), None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_credential_provider() {
        let mut h = harness(RetryPolicy::none(), CircuitBreakerConfig::default());
        h.executor.tokens().set_access_token("session-token", None);
        h.executor = h.executor.with_credentials(Arc::new(|| Some("kiosk-token".to_string())));
        h.transport.push_err(NetworkError::Unauthorized);

        let _ = h.executor.execute(&ApiRequest::get("/owners")).await;

        assert_eq!(h.transport.credentials(), vec![Some("kiosk-token".to_string())]);
        assert!(!h.executor.tokens().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_is_not_sent() {
        let h = harness(RetryPolicy::none(), CircuitBreakerConfig::default());
        h.executor.tokens().set_access_token("short", Some(5));
        h.clock.advance(Duration::from_secs(5));

        h.executor.execute(&ApiRequest::get("/owners")).await.unwrap();

        assert_eq!(h.transport.credentials(), vec![None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_clears_tokens() {
        let h = harness(RetryPolicy::standard(), CircuitBreakerConfig::default());
        h.executor.tokens().set_access_token("stale", None);
        h.executor.tokens().set_refresh_token("refresh");
        h.transport.push_err(NetworkError::Unauthorized);

        let err = h.executor.execute(&ApiRequest::get("/owners")).await.unwrap_err();

        assert_eq!(err, ApiError::NonRetryable { attempts: 1, error: NetworkError::Unauthorized });
        assert!(!h.executor.tokens().is_authenticated());
        assert_eq!(h.executor.tokens().get_refresh_token(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_keeps_tokens_when_disabled() {
        let mut h = harness(RetryPolicy::standard(), CircuitBreakerConfig::default());
        h.executor.config.clear_tokens_on_unauthorized = false;
        h.executor.tokens().set_access_token("kept", None);
        h.transport.push_err(NetworkError::Unauthorized);

        let _ = h.executor.execute(&ApiRequest::get("/owners")).await;

        assert!(h.executor.tokens().is_authenticated());
    }

    /// Validates cancellation of an in-flight attempt.
    ///
    /// Assertions:
    /// - The call ends with `Cancelled` and zero counted attempts.
    /// - Nothing is recorded against the breaker.
    /// - The half-open probe slot is released.
    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_records_nothing() {
        let breaker = CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .open_timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        let h = harness(RetryPolicy::standard(), breaker);
        h.executor.breaker().record_failure(&NetworkError::Timeout);
        h.clock.advance(Duration::from_secs(1));
        h.transport.push_hang();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let report = h.executor.execute_with_report(&ApiRequest::get("/owners"), &cancel).await;

        assert_eq!(report.outcome.unwrap_err(), ApiError::Cancelled { attempts: 0 });
        assert_eq!(report.attempts, 0);
        let metrics = h.executor.breaker().metrics();
        assert_eq!(metrics.state, CircuitState::HalfOpen);
        assert_eq!(metrics.consecutive_success_count, 0);
        assert!(h.executor.breaker().is_call_allowed());
    }

    /// Validates a half-open probe answered with 429.
    ///
    /// Assertions:
    /// - The retry after the server delay reaches the transport.
    /// - The second attempt closes the circuit.
    #[tokio::test(start_paused = true)]
    async fn test_half_open_rate_limited_probe_is_retried() {
        let breaker = CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .success_threshold(1)
            .open_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        let h = harness(RetryPolicy::standard(), breaker);
        h.executor.breaker().record_failure(&NetworkError::ServiceUnavailable);
        h.clock.advance(Duration::from_secs(10));
        h.transport
            .push_err(NetworkError::RateLimitExceeded { retry_after_seconds: Some(1) })
            .push_ok(200, "{}");

        let report = h.executor.execute_with_report(&ApiRequest::get("/visits"), &CancellationToken::new()).await;

        assert_eq!(report.outcome.as_ref().unwrap().status, 200);
        assert_eq!(report.delays, vec![Duration::from_secs(1)]);
        assert_eq!(h.transport.calls(), 2);
        assert_eq!(h.executor.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let h = harness(no_jitter_standard(), CircuitBreakerConfig::default());
        h.transport.push_err(NetworkError::ServiceUnavailable);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });
        let report = h.executor.execute_with_report(&ApiRequest::get("/owners"), &cancel).await;

        assert_eq!(report.outcome.unwrap_err(), ApiError::Cancelled { attempts: 1 });
        assert_eq!(h.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_calls_transport() {
        let h = harness(RetryPolicy::standard(), CircuitBreakerConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h.executor.execute_with_cancellation(&ApiRequest::get("/owners"), &cancel).await.unwrap_err();

        assert_eq!(err, ApiError::Cancelled { attempts: 0 });
        assert_eq!(h.transport.calls(), 0);
    }
}
