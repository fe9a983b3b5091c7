//! GitHub OAuth web flow and access-token storage.

pub mod browser;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod listener;
pub mod login;
pub mod redirect;
pub mod store;
pub mod token;

pub use browser::{ExternalAuthorizer, SystemBrowser};
pub use credentials::{Credentials, GITHUB_ACCOUNT};
pub use error::{AuthError, StoreError};
pub use exchange::TokenExchangeClient;
pub use listener::CallbackListener;
pub use login::{LoginHandle, LoginOrchestrator, LoginState};
pub use redirect::{
    CallbackEvent, CallbackSubscription, MissingSourcePolicy, RedirectBridge, LOOPBACK_SOURCE,
};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreConfig};
pub use token::StoredToken;
