//! Token payloads exchanged with the backend

use serde::{Deserialize, Serialize};

/// Access/refresh token pair as returned by a login or refresh endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Bearer token for API authentication
    pub access_token: String,

    /// Refresh token, when the backend issues one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds; the session default applies when
    /// absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenGrant {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: None, expires_in: None }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub const fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_login_response() {
        let grant: TokenGrant = serde_json::from_str(
            r#"{ "access_token": "a1", "refresh_token": "r1", "expires_in": 900 }"#,
        )
        .unwrap();
        assert_eq!(grant, TokenGrant::new("a1").with_refresh_token("r1").with_expires_in(900));
    }

    #[test]
    fn test_optional_fields_default_to_none() {
        let grant: TokenGrant = serde_json::from_str(r#"{ "access_token": "a1" }"#).unwrap();
        assert!(grant.refresh_token.is_none());
        assert!(grant.expires_in.is_none());

        let json = serde_json::to_string(&grant).unwrap();
        assert_eq!(json, r#"{"access_token":"a1"}"#);
    }
}
