//! Integration tests for auth module
//!
//! Exercises the token manager with the real system clock and from many
//! concurrent tasks.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::Duration;

use petclinic_common::auth::{CredentialProvider, TokenGrant, TokenManager};

/// Validates expiry against wall-clock time.
///
/// # Test Steps
/// 1. Store "tok" with a one second lifetime
/// 2. Sleep 1100ms
/// 3. Verify the token is gone
#[tokio::test]
async fn test_token_expires_after_real_time_passes() {
    let tokens = TokenManager::new();
    tokens.set_access_token("tok", Some(1));
    assert_eq!(tokens.get_access_token().as_deref(), Some("tok"));

    tokio::time::sleep(Duration::from_millis(1_100)).await;

    assert_eq!(tokens.get_access_token(), None);
    assert!(!tokens.is_authenticated());
}

/// Validates that concurrent readers observe an all-or-nothing session.
///
/// # Test Steps
/// 1. Store a grant with a zero second lifetime so it is already expired
/// 2. Race many readers against the invalidation
/// 3. Verify every reader saw `None` and no refresh token survived
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_expiry_is_atomic() -> anyhow::Result<()> {
    let tokens = Arc::new(TokenManager::new());
    tokens.store_grant(&TokenGrant::new("short").with_refresh_token("r").with_expires_in(0));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let tokens = Arc::clone(&tokens);
        handles.push(tokio::spawn(async move { tokens.get_access_token() }));
    }
    for handle in handles {
        assert_eq!(handle.await?, None);
    }
    assert_eq!(tokens.get_refresh_token(), None);
    Ok(())
}

/// Validates the provider seam used by the request layer.
#[tokio::test]
async fn test_token_manager_as_credential_provider() {
    let tokens = Arc::new(TokenManager::with_default_lifetime(Duration::from_secs(60)));
    let provider: Arc<dyn CredentialProvider> = tokens.clone();

    assert_eq!(provider.access_token(), None);

    tokens.store_grant(&TokenGrant::new("vet-session"));
    let credential = tokio_test::assert_ready!(tokio_test::task::spawn(async {
        provider.access_token()
    })
    .poll());
    assert_eq!(credential.as_deref(), Some("vet-session"));

    tokens.clear_tokens();
    assert_eq!(provider.access_token(), None);
}
