use thiserror::Error;

use crate::error::GhLoginError;

/// Failures of the persistent token store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Token store lock poisoned")]
    Poisoned,
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Errors raised while acquiring a GitHub access token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Callback rejected from source {0}")]
    RejectedCallback(String),
    #[error("Callback URL has no authorization code")]
    MissingCode,
    #[error("Callback state does not match this login attempt")]
    StateMismatch,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Token endpoint returned status {status}")]
    Status { status: u16 },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("GitHub rejected the exchange: {error}{}", describe(.description))]
    Provider {
        error: String,
        description: Option<String>,
    },
    #[error("Token store error: {0}")]
    Store(#[from] StoreError),
    #[error("Timed out after {0}s")]
    TimedOut(u64),
    #[error("Login canceled")]
    Canceled,
    #[error("A login attempt is already in progress")]
    LoginInProgress,
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

impl From<AuthError> for GhLoginError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Configuration(message) => GhLoginError::Configuration(message),
            AuthError::TimedOut(secs) => GhLoginError::Timeout(secs),
            AuthError::Network(message) => GhLoginError::Network(message),
            AuthError::Store(inner) => GhLoginError::Storage(inner.to_string()),
            other => GhLoginError::Authentication(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_includes_description_when_present() {
        let err = AuthError::Provider {
            error: "bad_verification_code".to_string(),
            description: Some("The code passed is incorrect or expired.".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "GitHub rejected the exchange: bad_verification_code (The code passed is incorrect or expired.)"
        );

        let bare = AuthError::Provider {
            error: "incorrect_client_credentials".to_string(),
            description: None,
        };
        assert_eq!(
            bare.to_string(),
            "GitHub rejected the exchange: incorrect_client_credentials"
        );
    }

    #[test]
    fn store_error_converts_into_auth_error() {
        let err: AuthError = StoreError::Io("disk full".to_string()).into();
        assert!(matches!(err, AuthError::Store(StoreError::Io(_))));
    }
}
