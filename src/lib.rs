//! ghlogin: GitHub OAuth web-flow login
//!
//! Opens GitHub's authorization page, receives the redirect on a loopback
//! listener, trades the temporary code for an access token, and keeps that
//! token in a per-user store for API callers.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ghlogin::prelude::*;
//!
//! # async fn example() -> ghlogin::error::Result<()> {
//! let config = OAuthConfig::from_env()?;
//! config.validate()?;
//! let store = FileTokenStore::new(TokenStoreConfig::new(config.token_dir.clone()));
//! let credentials = Arc::new(Credentials::new(Arc::new(store)));
//! let bridge = Arc::new(RedirectBridge::from_config(&config));
//! let _listener =
//!     CallbackListener::bind(config.callback_port, bridge.clone(), LOOPBACK_SOURCE).await?;
//! let login = LoginOrchestrator::new(config, bridge, credentials, Arc::new(SystemBrowser));
//! login.login().await?;
//! assert!(login.has_token());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
