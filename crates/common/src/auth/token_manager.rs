//! Token lifecycle management
//!
//! Stores the access/refresh pair for one session with expiration tracking.
//! Reading an expired access token clears every field under the same lock,
//! so observers never see a half-invalidated session.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use petclinic_domain::constants::DEFAULT_TOKEN_LIFETIME_SECS;
use tracing::{debug, info};

use super::traits::CredentialProvider;
use super::types::TokenGrant;
use crate::time::{Clock, SystemClock};

#[derive(Default)]
struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    issued_at: Option<Instant>,
    expires_at: Option<Instant>,
}

impl TokenState {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn store_access(&mut self, token: String, now: Instant, lifetime: Duration) {
        self.access_token = Some(token);
        self.issued_at = Some(now);
        self.expires_at = Some(now + lifetime);
    }
}

/// Access/refresh token holder for one session
pub struct TokenManager<C: Clock = SystemClock> {
    state: Mutex<TokenState>,
    default_lifetime: Duration,
    clock: C,
}

impl<C: Clock> fmt::Debug for TokenManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenManager")
            .field("has_access_token", &state.access_token.is_some())
            .field("has_refresh_token", &state.refresh_token.is_some())
            .field("expires_at", &state.expires_at)
            .field("default_lifetime", &self.default_lifetime)
            .finish()
    }
}

impl TokenManager<SystemClock> {
    /// Token manager with the system clock and a one hour default lifetime
    pub fn new() -> Self {
        Self::with_clock(SystemClock, Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS))
    }

    pub fn with_default_lifetime(default_lifetime: Duration) -> Self {
        Self::with_clock(SystemClock, default_lifetime)
    }
}

impl Default for TokenManager<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TokenManager<C> {
    pub fn with_clock(clock: C, default_lifetime: Duration) -> Self {
        Self { state: Mutex::new(TokenState::default()), default_lifetime, clock }
    }

    pub const fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }

    /// Store an access token expiring `expires_in_seconds` from now, or after
    /// the default lifetime when `None`.
    pub fn set_access_token(&self, token: impl Into<String>, expires_in_seconds: Option<u64>) {
        let lifetime = expires_in_seconds.map_or(self.default_lifetime, Duration::from_secs);
        let now = self.clock.now();
        self.state.lock().store_access(token.into(), now, lifetime);
        debug!(expires_in_secs = lifetime.as_secs(), "Access token stored");
    }

    /// Current access token, or `None` when absent or expired.
    ///
    /// Reaching the expiry instant clears the access token, the refresh token
    /// and the expiry together. Reads never extend the lifetime.
    pub fn get_access_token(&self) -> Option<String> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let expired = match (&state.access_token, state.expires_at) {
            (None, _) => return None,
            (Some(_), Some(expires_at)) => now >= expires_at,
            (Some(_), None) => false,
        };

        if expired {
            state.clear();
            drop(state);
            info!("Access token expired, session credentials cleared");
            return None;
        }

        state.access_token.clone()
    }

    pub fn set_refresh_token(&self, token: impl Into<String>) {
        self.state.lock().refresh_token = Some(token.into());
    }

    /// Stored refresh token. Does not consult the access token expiry.
    pub fn get_refresh_token(&self) -> Option<String> {
        self.state.lock().refresh_token.clone()
    }

    /// Store a login or refresh response in one step.
    ///
    /// A grant without a refresh token keeps the previously stored one.
    pub fn store_grant(&self, grant: &TokenGrant) {
        let lifetime = grant.expires_in.map_or(self.default_lifetime, Duration::from_secs);
        let now = self.clock.now();
        {
            let mut state = self.state.lock();
            state.store_access(grant.access_token.clone(), now, lifetime);
            if let Some(refresh) = &grant.refresh_token {
                state.refresh_token = Some(refresh.clone());
            }
        }
        debug!(
            expires_in_secs = lifetime.as_secs(),
            has_refresh_token = grant.refresh_token.is_some(),
            "Token grant stored"
        );
    }

    /// Drop all credentials unconditionally.
    pub fn clear_tokens(&self) {
        self.state.lock().clear();
        info!("Tokens cleared");
    }

    /// Whether a non-expired access token is held. Expired tokens are
    /// invalidated as a side effect.
    pub fn is_authenticated(&self) -> bool {
        self.get_access_token().is_some()
    }

    /// Remaining lifetime of the access token, without invalidating it.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = self.clock.now();
        let state = self.state.lock();
        state.access_token.as_ref()?;
        state.expires_at.map(|expires_at| expires_at.saturating_duration_since(now))
    }

    /// When the current access token was stored.
    pub fn issued_at(&self) -> Option<Instant> {
        self.state.lock().issued_at
    }
}

impl<C: Clock> CredentialProvider for TokenManager<C> {
    fn access_token(&self) -> Option<String> {
        self.get_access_token()
    }
}
