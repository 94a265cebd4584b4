//! Credential provider seam between session state and the transport

/// Supplies the bearer credential for an outgoing request
///
/// Invoked once per attempt. `None` means the request goes out
/// unauthenticated.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn access_token(&self) -> Option<String> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_closure_provider() {
        let provider = || Some("static-token".to_string());
        assert_eq!(provider.access_token().as_deref(), Some("static-token"));
    }

    #[test]
    fn test_arc_dyn_provider() {
        let provider: Arc<dyn CredentialProvider> = Arc::new(|| None::<String>);
        assert!(provider.access_token().is_none());
    }
}
