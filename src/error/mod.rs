//! Error types for ghlogin.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Top-level error for the CLI and embedders that do not care which
/// component failed.
#[derive(Error, Debug)]
pub enum GhLoginError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Timeout after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GhLoginError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Storage(_) | Self::Io(_) => ErrorCategory::Storage,
        }
    }

    /// Whether starting a fresh login could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Authentication
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::RetryLogin,
            ErrorCategory::Network => RecoverySuggestion::CheckConnectivity,
            ErrorCategory::Timeout => RecoverySuggestion::RetryLogin,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Storage => RecoverySuggestion::CheckTokenDirectory,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GhLoginError>;
