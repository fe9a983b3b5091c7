//! Configuration (layered: code > env > defaults).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::auth::error::AuthError;
use crate::auth::redirect::{MissingSourcePolicy, LOOPBACK_SOURCE};
use crate::auth::store::TokenStoreConfig;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEFAULT_SCOPE: &str = "repo";
pub const DEFAULT_CALLBACK_PORT: u16 = 8765;
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

/// OAuth client settings for the GitHub web flow.
///
/// Resolution order: explicit `with_*` calls, then environment variables
/// (`GITHUB_CLIENT_ID`, `GITHUB_CLIENT_SECRET`, `GHLOGIN_*`), then defaults.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: Option<String>,
    pub callback_port: u16,
    pub exchange_timeout: Duration,
    pub authorization_timeout: Duration,
    pub token_dir: PathBuf,
    pub trusted_source: String,
    pub missing_source: MissingSourcePolicy,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("scope", &self.scope)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("callback_port", &self.callback_port)
            .field("exchange_timeout", &self.exchange_timeout)
            .field("authorization_timeout", &self.authorization_timeout)
            .field("token_dir", &self.token_dir)
            .field("trusted_source", &self.trusted_source)
            .field("missing_source", &self.missing_source)
            .finish()
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: None,
            callback_port: DEFAULT_CALLBACK_PORT,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            authorization_timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
            token_dir: TokenStoreConfig::default_dir(),
            trusted_source: LOOPBACK_SOURCE.to_string(),
            missing_source: MissingSourcePolicy::default(),
        }
    }
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Load from environment variables, reading `.env` first when present.
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(id) = lookup("GITHUB_CLIENT_ID") {
            config.client_id = id;
        }
        if let Some(secret) = lookup("GITHUB_CLIENT_SECRET") {
            config.client_secret = secret;
        }
        if let Some(scope) = lookup("GHLOGIN_SCOPE") {
            config.scope = scope;
        }
        if let Some(uri) = lookup("GHLOGIN_REDIRECT_URI") {
            config.redirect_uri = Some(uri);
        }
        if let Some(dir) = lookup("GHLOGIN_HOME") {
            config.token_dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup("GHLOGIN_CALLBACK_PORT") {
            config.callback_port = parse_var("GHLOGIN_CALLBACK_PORT", &port)?;
        }
        if let Some(secs) = lookup("GHLOGIN_EXCHANGE_TIMEOUT_SECS") {
            config.exchange_timeout =
                Duration::from_secs(parse_var("GHLOGIN_EXCHANGE_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = lookup("GHLOGIN_AUTHORIZATION_TIMEOUT_SECS") {
            config.authorization_timeout =
                Duration::from_secs(parse_var("GHLOGIN_AUTHORIZATION_TIMEOUT_SECS", &secs)?);
        }
        if let Some(policy) = lookup("GHLOGIN_MISSING_SOURCE") {
            config.missing_source = parse_var("GHLOGIN_MISSING_SOURCE", &policy)?;
        }
        Ok(config)
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = dir.into();
        self
    }

    pub fn with_missing_source_policy(mut self, policy: MissingSourcePolicy) -> Self {
        self.missing_source = policy;
        self
    }

    /// Check that a login can be attempted with these settings.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::Configuration(
                "GITHUB_CLIENT_ID is not set".to_string(),
            ));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AuthError::Configuration(
                "GITHUB_CLIENT_SECRET is not set".to_string(),
            ));
        }
        parse_url("token URL", &self.token_url)?;
        self.authorization_url("validate")?;
        Ok(())
    }

    /// Redirect URI sent to GitHub: the configured one, or the loopback
    /// listener address.
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}/callback", self.callback_port))
    }

    /// The GitHub authorization page for one login attempt.
    pub fn authorization_url(&self, state: &str) -> Result<Url, AuthError> {
        let mut url = parse_url("authorization URL", &self.authorize_url)?;
        let redirect_uri = self.redirect_uri();
        parse_url("redirect URI", &redirect_uri)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &self.scope)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("state", state);
        Ok(url)
    }
}

fn parse_url(what: &str, raw: &str) -> Result<Url, AuthError> {
    Url::parse(raw).map_err(|e| AuthError::Configuration(format!("invalid {what} {raw:?}: {e}")))
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, AuthError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AuthError::Configuration(format!("{key}={raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_github() {
        let config = OAuthConfig::default();
        assert_eq!(config.authorize_url, DEFAULT_AUTHORIZE_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.scope, "repo");
        assert_eq!(config.exchange_timeout, Duration::from_secs(30));
        assert_eq!(config.missing_source, MissingSourcePolicy::Reject);
    }

    #[test]
    fn from_lookup_reads_all_keys() {
        let config = OAuthConfig::from_lookup(lookup(&[
            ("GITHUB_CLIENT_ID", "id-1"),
            ("GITHUB_CLIENT_SECRET", "secret-1"),
            ("GHLOGIN_SCOPE", "read:user"),
            ("GHLOGIN_CALLBACK_PORT", "9100"),
            ("GHLOGIN_EXCHANGE_TIMEOUT_SECS", "5"),
            ("GHLOGIN_AUTHORIZATION_TIMEOUT_SECS", "60"),
            ("GHLOGIN_HOME", "/tmp/ghlogin-test"),
            ("GHLOGIN_MISSING_SOURCE", "pass-through"),
        ]))
        .unwrap();
        assert_eq!(config.client_id, "id-1");
        assert_eq!(config.client_secret, "secret-1");
        assert_eq!(config.scope, "read:user");
        assert_eq!(config.callback_port, 9100);
        assert_eq!(config.exchange_timeout, Duration::from_secs(5));
        assert_eq!(config.authorization_timeout, Duration::from_secs(60));
        assert_eq!(config.token_dir, PathBuf::from("/tmp/ghlogin-test"));
        assert_eq!(config.missing_source, MissingSourcePolicy::PassThrough);
    }

    #[test]
    fn bad_port_is_a_configuration_error() {
        let err = OAuthConfig::from_lookup(lookup(&[("GHLOGIN_CALLBACK_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(msg) if msg.contains("GHLOGIN_CALLBACK_PORT")));
    }

    #[test]
    fn validate_requires_client_credentials() {
        assert!(matches!(
            OAuthConfig::default().validate(),
            Err(AuthError::Configuration(msg)) if msg.contains("GITHUB_CLIENT_ID")
        ));
        assert!(matches!(
            OAuthConfig::new("id", " ").validate(),
            Err(AuthError::Configuration(msg)) if msg.contains("GITHUB_CLIENT_SECRET")
        ));
        assert!(OAuthConfig::new("id", "secret").validate().is_ok());
    }

    #[test]
    fn validate_rejects_malformed_endpoints() {
        let config = OAuthConfig::new("id", "secret").with_authorize_url("not a url");
        assert!(matches!(config.validate(), Err(AuthError::Configuration(_))));
    }

    #[test]
    fn authorization_url_carries_client_scope_redirect_and_state() {
        let config = OAuthConfig::new("my-client", "secret").with_callback_port(9000);
        let url = config.authorization_url("state-1").unwrap();
        assert_eq!(url.host_str(), Some("github.com"));
        assert_eq!(url.path(), "/login/oauth/authorize");
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "my-client");
        assert_eq!(pairs["scope"], "repo");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:9000/callback");
        assert_eq!(pairs["state"], "state-1");
        assert!(!pairs.contains_key("client_secret"));
    }

    #[test]
    fn debug_output_hides_secret() {
        let config = OAuthConfig::new("id", "top-secret");
        assert!(!format!("{config:?}").contains("top-secret"));
    }
}
