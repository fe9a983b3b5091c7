//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthError, CallbackListener, Credentials, ExternalAuthorizer, FileTokenStore, LoginHandle,
    LoginOrchestrator, LoginState, MemoryTokenStore, RedirectBridge, StoredToken, SystemBrowser,
    TokenStore, TokenStoreConfig, LOOPBACK_SOURCE,
};
pub use crate::config::OAuthConfig;
pub use crate::error::{GhLoginError, Result};
