use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::credentials::Credentials;
use super::error::AuthError;
use super::token::StoredToken;
use crate::config::OAuthConfig;

/// Trades the temporary authorization code for an access token and commits
/// it to [`Credentials`].
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use ghlogin::auth::{Credentials, MemoryTokenStore, TokenExchangeClient};
/// use ghlogin::config::OAuthConfig;
///
/// # async fn run() -> Result<(), ghlogin::auth::AuthError> {
/// let config = OAuthConfig::new("client-id", "client-secret");
/// let creds = Arc::new(Credentials::new(Arc::new(MemoryTokenStore::new())));
/// let client = TokenExchangeClient::new(&config, creds);
/// let url = "http://127.0.0.1:8765/callback?code=abc".parse().unwrap();
/// client.exchange_code_for_token(&url).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TokenExchangeClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    timeout: Duration,
    credentials: Arc<Credentials>,
}

impl TokenExchangeClient {
    pub fn new(config: &OAuthConfig, credentials: Arc<Credentials>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config.token_url.clone(),
            timeout: config.exchange_timeout,
            credentials,
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    /// Exchange the `code` carried by `callback_url` and store the token.
    ///
    /// Nothing is stored unless the token endpoint answered with a 2xx JSON
    /// object. A response without `access_token` stores an empty token.
    pub async fn exchange_code_for_token(&self, callback_url: &Url) -> Result<StoredToken, AuthError> {
        let code = extract_code(callback_url)?;
        let token = match tokio::time::timeout(self.timeout, self.request_token(&code)).await {
            Ok(result) => result?,
            Err(_) => return Err(AuthError::TimedOut(self.timeout.as_secs())),
        };
        self.credentials.save_token(&token)?;
        tracing::info!(account = self.credentials.account(), "access token saved");
        Ok(token)
    }

    /// Boolean form of [`exchange_code_for_token`](Self::exchange_code_for_token):
    /// true iff the token was saved.
    pub async fn exchange(&self, callback_url: &Url) -> bool {
        match self.exchange_code_for_token(callback_url).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "token exchange failed");
                false
            }
        }
    }

    async fn request_token(&self, code: &str) -> Result<StoredToken, AuthError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .json(&ExchangeRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                code,
            })
            .send()
            .await?;
        let status = resp.status();
        tracing::debug!(status = status.as_u16(), "token endpoint responded");
        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
            });
        }
        let body = resp.text().await?;
        parse_token_response(&body)
    }
}

impl std::fmt::Debug for TokenExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchangeClient")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Pull the authorization code out of a callback URL.
///
/// GitHub reports a denied authorization with `error` instead of `code`.
pub fn extract_code(callback_url: &Url) -> Result<String, AuthError> {
    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in callback_url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Err(AuthError::Provider { error, description });
    }
    code.filter(|c| !c.is_empty()).ok_or(AuthError::MissingCode)
}

fn parse_token_response(body: &str) -> Result<StoredToken, AuthError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(AuthError::InvalidResponse(
            "token response is not a JSON object".to_string(),
        ));
    }
    let payload: TokenResponse = serde_json::from_value(value)?;
    if let Some(error) = payload.error {
        return Err(AuthError::Provider {
            error,
            description: payload.error_description,
        });
    }
    let access_token = payload.access_token.unwrap_or_else(|| {
        tracing::warn!("token response has no access_token; storing an empty token");
        String::new()
    });
    let mut token = StoredToken::new(access_token);
    token.token_type = payload.token_type;
    if let Some(scope) = payload.scope.as_deref() {
        token = token.with_scope_list(scope);
    }
    Ok(token)
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}
