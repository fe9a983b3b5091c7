#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ghlogin::auth::{
    AuthError, Credentials, ExternalAuthorizer, LoginOrchestrator, MemoryTokenStore,
    RedirectBridge, StoreError, StoredToken, TokenStore, LOOPBACK_SOURCE,
};
use ghlogin::config::OAuthConfig;
use reqwest::Url;
use wiremock::MockServer;

pub const TOKEN_PATH: &str = "/login/oauth/access_token";

/// Authorizer that records what the orchestrator asked it to do.
#[derive(Default)]
pub struct RecordingAuthorizer {
    opened: Mutex<Vec<Url>>,
    closes: AtomicUsize,
    fail_open: bool,
}

impl RecordingAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().expect("authorizer lock poisoned").clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalAuthorizer for RecordingAuthorizer {
    async fn open(&self, url: &Url) -> Result<(), AuthError> {
        if self.fail_open {
            return Err(AuthError::Configuration("no browser available".to_string()));
        }
        self.opened
            .lock()
            .expect("authorizer lock poisoned")
            .push(url.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct ReadOnlyTokenStore {
    inner: MemoryTokenStore,
}

impl ReadOnlyTokenStore {
    pub fn seeded(token: &str) -> Self {
        let store = Self::default();
        store
            .inner
            .save("github", &StoredToken::new(token))
            .expect("seed token");
        store
    }
}

impl TokenStore for ReadOnlyTokenStore {
    fn load(&self, account: &str) -> Result<Option<StoredToken>, StoreError> {
        self.inner.load(account)
    }

    fn save(&self, _account: &str, _token: &StoredToken) -> Result<(), StoreError> {
        Err(StoreError::Io("keychain access restricted".to_string()))
    }

    fn clear(&self, _account: &str) -> Result<(), StoreError> {
        Err(StoreError::Io("keychain access restricted".to_string()))
    }
}

pub struct Harness {
    pub login: LoginOrchestrator,
    pub bridge: Arc<RedirectBridge>,
    pub credentials: Arc<Credentials>,
    pub authorizer: Arc<RecordingAuthorizer>,
}

pub fn test_config(server: &MockServer) -> OAuthConfig {
    OAuthConfig::new("client-123", "secret-456")
        .with_token_url(format!("{}{TOKEN_PATH}", server.uri()))
        .with_exchange_timeout(Duration::from_secs(5))
        .with_authorization_timeout(Duration::from_secs(5))
}

pub fn harness(config: OAuthConfig) -> Harness {
    harness_with(
        config,
        Arc::new(MemoryTokenStore::new()),
        Arc::new(RecordingAuthorizer::new()),
    )
}

pub fn harness_with(
    config: OAuthConfig,
    store: Arc<dyn TokenStore>,
    authorizer: Arc<RecordingAuthorizer>,
) -> Harness {
    let credentials = Arc::new(Credentials::new(store));
    let bridge = Arc::new(RedirectBridge::from_config(&config));
    let login = LoginOrchestrator::new(
        config,
        bridge.clone(),
        credentials.clone(),
        authorizer.clone(),
    );
    Harness {
        login,
        bridge,
        credentials,
        authorizer,
    }
}

/// State value GitHub would echo back for the given authorization URL.
pub fn state_of(authorization_url: &Url) -> String {
    authorization_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("authorization URL carries state")
}

pub fn callback_url(code: &str, state: &str) -> Url {
    let mut url: Url = "http://127.0.0.1:8765/callback".parse().expect("callback url");
    url.query_pairs_mut()
        .append_pair("code", code)
        .append_pair("state", state);
    url
}

/// Deliver a callback the way the loopback listener does.
pub fn deliver(bridge: &RedirectBridge, url: &Url) -> bool {
    bridge.handle_incoming_callback(Some(LOOPBACK_SOURCE), url)
}
