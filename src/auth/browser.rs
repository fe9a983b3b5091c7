use async_trait::async_trait;
use reqwest::Url;

use super::error::AuthError;

/// Presents the GitHub authorization page to the user.
#[async_trait]
pub trait ExternalAuthorizer: Send + Sync {
    /// Show the authorization page at `url`.
    async fn open(&self, url: &Url) -> Result<(), AuthError>;

    /// Dismiss the page once the attempt has finished, successfully or not.
    async fn close(&self);
}

/// Opens the authorization page in the user's default browser.
///
/// A desktop browser tab cannot be closed from outside, so `close` only
/// records the event; the callback page tells the user to close the tab.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

#[async_trait]
impl ExternalAuthorizer for SystemBrowser {
    async fn open(&self, url: &Url) -> Result<(), AuthError> {
        let target = url.to_string();
        tokio::task::spawn_blocking(move || open::that(target))
            .await
            .map_err(|e| AuthError::Configuration(format!("browser task failed: {e}")))?
            .map_err(|e| AuthError::Configuration(format!("failed to open browser: {e}")))?;
        tracing::info!("opened GitHub authorization page");
        Ok(())
    }

    async fn close(&self) {
        tracing::debug!("authorization page released");
    }
}
