//! Drives one GitHub web-flow login from the authorization page to a
//! stored token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use super::browser::ExternalAuthorizer;
use super::credentials::Credentials;
use super::error::AuthError;
use super::exchange::TokenExchangeClient;
use super::redirect::{CallbackSubscription, RedirectBridge};
use super::token::StoredToken;
use crate::config::OAuthConfig;

/// Progress of the current login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    /// No attempt has been made yet.
    Idle,
    /// The authorization page is open; waiting for GitHub's redirect.
    AwaitingExternalAuthorization,
    /// The code is being traded for an access token.
    ExchangingToken,
    /// The token is stored.
    Completed,
    /// The attempt ended without a token.
    Failed { reason: String },
}

impl LoginState {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::AwaitingExternalAuthorization | Self::ExchangingToken
        )
    }
}

type AttemptResult = Result<StoredToken, AuthError>;

/// Handle for an in-flight login attempt.
#[derive(Debug)]
pub struct LoginHandle {
    attempt_id: Uuid,
    authorization_url: Url,
    abort_tx: Option<oneshot::Sender<()>>,
    result_rx: oneshot::Receiver<AttemptResult>,
}

impl LoginHandle {
    fn new(
        attempt_id: Uuid,
        authorization_url: Url,
    ) -> (Self, oneshot::Receiver<()>, oneshot::Sender<AttemptResult>) {
        let (abort_tx, abort_rx) = oneshot::channel();
        let (result_tx, result_rx) = oneshot::channel();
        (
            Self {
                attempt_id,
                authorization_url,
                abort_tx: Some(abort_tx),
                result_rx,
            },
            abort_rx,
            result_tx,
        )
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// The page that was opened for this attempt.
    pub fn authorization_url(&self) -> &Url {
        &self.authorization_url
    }

    /// Cancel the attempt. Returns false if it already finished or was
    /// aborted before.
    pub fn abort(&mut self) -> bool {
        if let Some(tx) = self.abort_tx.take() {
            return tx.send(()).is_ok();
        }
        false
    }

    pub async fn wait(self) -> AttemptResult {
        self.result_rx
            .await
            .unwrap_or(Err(AuthError::Canceled))
    }
}

/// Runs the GitHub web flow: open the authorization page, wait for the
/// redirect, exchange the code, dismiss the page.
///
/// One attempt at a time. The callback subscription is held by the attempt
/// and released when it ends.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use ghlogin::auth::{
///     Credentials, FileTokenStore, LoginOrchestrator, RedirectBridge, SystemBrowser,
///     LOOPBACK_SOURCE,
/// };
/// use ghlogin::config::OAuthConfig;
///
/// # async fn run() -> Result<(), ghlogin::auth::AuthError> {
/// let config = OAuthConfig::from_env()?;
/// let credentials = Arc::new(Credentials::new(Arc::new(FileTokenStore::new_default())));
/// let bridge = Arc::new(RedirectBridge::new(LOOPBACK_SOURCE));
/// let login = LoginOrchestrator::new(config, bridge, credentials, Arc::new(SystemBrowser));
/// let handle = login.start_login().await?;
/// handle.wait().await?;
/// # Ok(())
/// # }
/// ```
pub struct LoginOrchestrator {
    config: OAuthConfig,
    bridge: Arc<RedirectBridge>,
    exchange: TokenExchangeClient,
    authorizer: Arc<dyn ExternalAuthorizer>,
    state_tx: Arc<watch::Sender<LoginState>>,
}

impl LoginOrchestrator {
    pub fn new(
        config: OAuthConfig,
        bridge: Arc<RedirectBridge>,
        credentials: Arc<Credentials>,
        authorizer: Arc<dyn ExternalAuthorizer>,
    ) -> Self {
        let exchange = TokenExchangeClient::new(&config, credentials);
        let (state_tx, _) = watch::channel(LoginState::Idle);
        Self {
            config,
            bridge,
            exchange,
            authorizer,
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn bridge(&self) -> &Arc<RedirectBridge> {
        &self.bridge
    }

    pub fn credentials(&self) -> &Arc<Credentials> {
        self.exchange.credentials()
    }

    pub fn state(&self) -> LoginState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<LoginState> {
        self.state_tx.subscribe()
    }

    pub fn has_token(&self) -> bool {
        self.credentials().has_token()
    }

    /// Forget the stored token.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.credentials().clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Open the authorization page and start waiting for the redirect.
    pub async fn start_login(&self) -> Result<LoginHandle, AuthError> {
        let attempt_id = Uuid::new_v4();
        let expected_state = Uuid::new_v4().simple().to_string();
        let authorization_url = self.config.authorization_url(&expected_state)?;
        let mut subscription = self.bridge.subscribe()?;

        self.state_tx
            .send_replace(LoginState::AwaitingExternalAuthorization);
        tracing::info!(attempt = %attempt_id, "login started");

        if let Err(err) = self.authorizer.open(&authorization_url).await {
            self.state_tx.send_replace(LoginState::Failed {
                reason: err.to_string(),
            });
            return Err(err);
        }

        let (handle, abort_rx, result_tx) = LoginHandle::new(attempt_id, authorization_url);
        let exchange = self.exchange.clone();
        let authorizer = Arc::clone(&self.authorizer);
        let state_tx = Arc::clone(&self.state_tx);
        let authorization_timeout = self.config.authorization_timeout;

        tokio::spawn(async move {
            let aborted = async move {
                // A dropped handle detaches the attempt instead of canceling it.
                if abort_rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            let result = tokio::select! {
                _ = aborted => Err(AuthError::Canceled),
                result = run_attempt(
                    &mut subscription,
                    &exchange,
                    &expected_state,
                    authorization_timeout,
                    &state_tx,
                ) => result,
            };

            authorizer.close().await;
            drop(subscription);

            match &result {
                Ok(_) => {
                    tracing::info!(attempt = %attempt_id, "login completed");
                    state_tx.send_replace(LoginState::Completed);
                }
                Err(err) => {
                    tracing::warn!(attempt = %attempt_id, error = %err, "login failed");
                    state_tx.send_replace(LoginState::Failed {
                        reason: err.to_string(),
                    });
                }
            }
            let _ = result_tx.send(result);
        });

        Ok(handle)
    }

    /// Run a whole attempt and wait for its result.
    pub async fn login(&self) -> Result<StoredToken, AuthError> {
        self.start_login().await?.wait().await
    }

    /// Boolean form of [`login`](Self::login).
    pub async fn login_succeeded(&self) -> bool {
        self.login().await.is_ok()
    }
}

impl std::fmt::Debug for LoginOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginOrchestrator")
            .field("config", &self.config)
            .field("bridge", &self.bridge)
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

async fn run_attempt(
    subscription: &mut CallbackSubscription,
    exchange: &TokenExchangeClient,
    expected_state: &str,
    authorization_timeout: Duration,
    state_tx: &watch::Sender<LoginState>,
) -> AttemptResult {
    let event = match tokio::time::timeout(authorization_timeout, subscription.recv()).await {
        Ok(Some(event)) => event,
        Ok(None) => return Err(AuthError::Canceled),
        Err(_) => return Err(AuthError::TimedOut(authorization_timeout.as_secs())),
    };
    verify_state(&event.url, expected_state)?;

    state_tx.send_replace(LoginState::ExchangingToken);
    exchange.exchange_code_for_token(&event.url).await
}

fn verify_state(callback_url: &Url, expected: &str) -> Result<(), AuthError> {
    let returned = callback_url
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned());
    match returned {
        Some(state) if state == expected => Ok(()),
        _ => Err(AuthError::StateMismatch),
    }
}
