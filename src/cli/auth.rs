//! CLI handlers for login, status, logout, and token.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use super::LoginArgs;
use crate::auth::{
    AuthError, CallbackListener, Credentials, ExternalAuthorizer, FileTokenStore,
    LoginOrchestrator, RedirectBridge, SystemBrowser, TokenStoreConfig,
};
use crate::config::OAuthConfig;
use crate::error::{GhLoginError, Result};

/// Prints the authorization URL and optionally opens it in the browser.
struct TerminalAuthorizer {
    open_browser: bool,
}

#[async_trait]
impl ExternalAuthorizer for TerminalAuthorizer {
    async fn open(&self, url: &Url) -> std::result::Result<(), AuthError> {
        println!("🔗 Visit: {url}");
        if self.open_browser {
            if let Err(err) = SystemBrowser.open(url).await {
                println!("⚠️  Could not open a browser ({err}); open the link above manually.");
            }
        }
        Ok(())
    }

    async fn close(&self) {}
}

fn credentials_for(config: &OAuthConfig) -> Credentials {
    let store = FileTokenStore::new(TokenStoreConfig::new(config.token_dir.clone()));
    Credentials::new(Arc::new(store))
}

/// Handle `ghlogin login`.
pub async fn handle_login(args: LoginArgs) -> Result<()> {
    let mut config = OAuthConfig::from_env()?;
    if let Some(port) = args.port {
        config = config.with_callback_port(port);
    }
    config.validate()?;

    let credentials = Arc::new(credentials_for(&config));
    let bridge = Arc::new(RedirectBridge::from_config(&config));
    let listener = CallbackListener::bind(
        config.callback_port,
        bridge.clone(),
        config.trusted_source.clone(),
    )
    .await?;
    let authorizer = Arc::new(TerminalAuthorizer {
        open_browser: !args.no_browser,
    });

    let login = LoginOrchestrator::new(config, bridge, credentials, authorizer);
    let handle = login.start_login().await?;
    println!("⏳ Waiting for authorization...");

    let result = tokio::select! {
        result = handle.wait() => result,
        _ = tokio::signal::ctrl_c() => Err(AuthError::Canceled),
    };
    listener.shutdown().await;

    let token = result?;
    println!("✅ GitHub login successful!");
    if let Some(scopes) = token.scopes.filter(|s| !s.is_empty()) {
        println!("   Scopes: {}", scopes.join(", "));
    }
    Ok(())
}

/// Handle `ghlogin status`.
pub async fn handle_status() -> Result<()> {
    let config = OAuthConfig::from_env()?;
    let credentials = credentials_for(&config);

    println!("🔐 Authentication Status\n");
    match credentials.load_token() {
        Ok(Some(token)) if !token.access_token.is_empty() => {
            let scopes = token
                .scopes
                .filter(|s| !s.is_empty())
                .map(|s| format!(" (scopes: {})", s.join(", ")))
                .unwrap_or_default();
            println!("  GitHub: ✅ Logged in{scopes}");
        }
        Ok(_) => println!("  GitHub: ❌ Not logged in"),
        Err(e) => println!("  GitHub: ⚠️  Error: {e}"),
    }

    println!("\n📌 Environment Variables:");
    for name in ["GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"] {
        let status = if std::env::var(name).is_ok() {
            "✅ Set"
        } else {
            "❌ Not set"
        };
        println!("  {name}: {status}");
    }

    Ok(())
}

/// Handle `ghlogin logout`.
pub async fn handle_logout() -> Result<()> {
    let config = OAuthConfig::from_env()?;
    credentials_for(&config)
        .clear()
        .map_err(AuthError::from)?;
    println!("✅ Logged out from GitHub");
    Ok(())
}

/// Handle `ghlogin token`.
pub async fn handle_token() -> Result<()> {
    let config = OAuthConfig::from_env()?;
    match credentials_for(&config).load().map_err(AuthError::from)? {
        Some(token) if !token.is_empty() => {
            println!("{token}");
            Ok(())
        }
        _ => Err(GhLoginError::Authentication(
            "not logged in; run `ghlogin login`".to_string(),
        )),
    }
}
