//! Session context
//!
//! Explicit owner of the per-session resilience state: one token manager,
//! one circuit breaker, and the executor and client that share them.
//! Build one per logged-in session and pass it where requests are made.

use std::sync::Arc;
use std::time::Duration;

use petclinic_common::auth::{TokenGrant, TokenManager};
use petclinic_common::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use petclinic_common::time::{Clock, SystemClock};
use petclinic_domain::ClientConfig;
use reqwest::Method;
use serde::Serialize;
use tracing::info;

use crate::api::{ApiClient, ApiError, ApiRequest, ExecutorConfig, RequestExecutor, Transport};
use crate::http::HttpTransport;

/// Per-session dependency container
#[derive(Debug)]
pub struct SessionContext<C: Clock = SystemClock> {
    config: ClientConfig,
    tokens: Arc<TokenManager<C>>,
    breaker: Arc<CircuitBreaker<C>>,
    client: ApiClient<C>,
}

impl SessionContext<SystemClock> {
    /// Session talking HTTP to `config.api.base_url`.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] for an invalid base URL, retry policy or
    /// breaker configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::from_settings(&config.api)?;
        Self::with_transport(config, Arc::new(transport), SystemClock)
    }

    /// Session configured from the config file and `PETCLINIC_*` variables.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if loading or validation fails.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(crate::config::load()?)
    }
}

impl<C: Clock + Clone + 'static> SessionContext<C> {
    /// Session over an arbitrary transport and clock.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the retry or breaker settings are
    /// invalid.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        clock: C,
    ) -> Result<Self, ApiError> {
        let policy = RetryPolicy::from_settings(&config.retry)?;
        let breaker = Arc::new(CircuitBreaker::with_clock(
            CircuitBreakerConfig::from_settings(&config.circuit_breaker),
            clock.clone(),
        )?);
        let tokens = Arc::new(TokenManager::with_clock(
            clock,
            Duration::from_secs(config.token.default_lifetime_seconds),
        ));

        let executor = RequestExecutor::new(
            transport,
            Arc::clone(&breaker),
            Arc::clone(&tokens),
            policy,
            ExecutorConfig::from(&config.api),
        );

        info!(
            base_url = %config.api.base_url,
            max_attempts = executor.policy().max_attempts(),
            failure_threshold = config.circuit_breaker.failure_threshold,
            "Session context created"
        );

        Ok(Self { config, tokens, breaker, client: ApiClient::new(Arc::new(executor)) })
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenManager<C>> {
        &self.tokens
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker<C>> {
        &self.breaker
    }

    pub fn client(&self) -> &ApiClient<C> {
        &self.client
    }

    pub fn executor(&self) -> &Arc<RequestExecutor<C>> {
        self.client.executor()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    /// Store credentials obtained elsewhere.
    pub fn login(&self, grant: &TokenGrant) {
        self.tokens.store_grant(grant);
        info!("Session logged in");
    }

    /// POST `credentials` to `path` without a bearer token and store the
    /// returned grant.
    ///
    /// # Errors
    /// Propagates the request failure; no tokens are stored on error.
    pub async fn authenticate<B: Serialize + ?Sized>(
        &self,
        path: &str,
        credentials: &B,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::new(Method::POST, path).with_json(credentials)?.unauthenticated();
        let grant: TokenGrant = self.client.send(&request).await?;
        self.login(&grant);
        Ok(())
    }

    /// Drop the session and return the breaker to closed.
    pub fn reset(&self) {
        self.tokens.clear_tokens();
        self.breaker.reset();
    }

    pub fn logout(&self) {
        self.reset();
        info!("Session logged out");
    }
}
