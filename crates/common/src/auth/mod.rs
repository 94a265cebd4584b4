//! Session credentials
//!
//! [`TokenManager`] holds the access/refresh token pair for one logged-in
//! session and invalidates it atomically on expiry. The request layer only
//! sees it through [`CredentialProvider`].
//!
//! ```
//! use petclinic_common::auth::{CredentialProvider, TokenManager};
//!
//! let tokens = TokenManager::new();
//! tokens.set_access_token("abc", Some(60));
//! assert_eq!(tokens.access_token().as_deref(), Some("abc"));
//!
//! tokens.clear_tokens();
//! assert!(!tokens.is_authenticated());
//! ```

pub mod token_manager;
pub mod traits;
pub mod types;

pub use token_manager::TokenManager;
pub use traits::CredentialProvider;
pub use types::TokenGrant;
