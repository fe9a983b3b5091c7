use std::sync::{Arc, Mutex};

use super::error::StoreError;
use super::store::TokenStore;
use super::token::StoredToken;

/// Account key the GitHub token is stored under.
pub const GITHUB_ACCOUNT: &str = "github";

/// The single GitHub access-token slot.
///
/// Wraps a [`TokenStore`] and pins it to one account. Writes are serialized
/// so two login attempts finishing together cannot interleave their saves.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use ghlogin::auth::{Credentials, MemoryTokenStore};
///
/// let creds = Credentials::new(Arc::new(MemoryTokenStore::new()));
/// creds.save("gho_example")?;
/// assert!(creds.has_token());
/// # Ok::<(), ghlogin::auth::StoreError>(())
/// ```
pub struct Credentials {
    store: Arc<dyn TokenStore>,
    account: String,
    write_lock: Mutex<()>,
}

impl Credentials {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            account: GITHUB_ACCOUNT.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Store `token`, replacing any previous value.
    pub fn save(&self, token: &str) -> Result<(), StoreError> {
        self.save_token(&StoredToken::new(token))
    }

    /// Store a full token record, replacing any previous value.
    pub fn save_token(&self, token: &StoredToken) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.store.save(&self.account, token)
    }

    /// The stored access token, or `None` when nothing has been saved.
    pub fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.load_token()?.map(|token| token.access_token))
    }

    pub fn load_token(&self) -> Result<Option<StoredToken>, StoreError> {
        self.store.load(&self.account)
    }

    /// True iff a non-empty token is stored. Unreadable storage counts as
    /// no token.
    pub fn has_token(&self) -> bool {
        match self.load() {
            Ok(Some(token)) => !token.is_empty(),
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(account = %self.account, error = %err, "token store unreadable");
                false
            }
        }
    }

    /// Remove the stored token. Removing an absent token succeeds.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.store.clear(&self.account)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("store", &"..")
            .finish()
    }
}
