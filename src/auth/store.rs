use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::token::StoredToken;

const TOKEN_FILE_VERSION: u32 = 1;

/// Storage abstraction for persisted access tokens, keyed by account.
pub trait TokenStore: Send + Sync {
    fn load(&self, account: &str) -> Result<Option<StoredToken>, StoreError>;
    fn save(&self, account: &str, token: &StoredToken) -> Result<(), StoreError>;
    fn clear(&self, account: &str) -> Result<(), StoreError>;
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_ghlogin_dir()
    }
}

/// File-backed token store using one TOML file per account.
///
/// Files are written with `0600` permissions on unix.
///
/// # Example
/// ```no_run
/// use ghlogin::auth::{FileTokenStore, StoredToken, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// store.save("github", &StoredToken::new("gho_example"))?;
/// # Ok::<(), ghlogin::auth::StoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_ghlogin_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn token_path(&self, account: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.toml", normalize_label(account)))
    }

    fn ensure_parent(path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, account: &str) -> Result<Option<StoredToken>, StoreError> {
        let path = self.token_path(account);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        let file: TokenFile = toml::from_str(&raw)?;
        Ok(Some(file.token))
    }

    fn save(&self, account: &str, token: &StoredToken) -> Result<(), StoreError> {
        let path = self.token_path(account);
        Self::ensure_parent(&path)?;
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            account: account.to_string(),
            saved_at: Utc::now(),
            token: token.clone(),
        };
        let serialized = toml::to_string(&file)?;
        fs::write(&path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<(), StoreError> {
        let path = self.token_path(account);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err.to_string())),
        }
    }
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, StoredToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, account: &str) -> Result<Option<StoredToken>, StoreError> {
        let tokens = self.tokens.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(tokens.get(account).cloned())
    }

    fn save(&self, account: &str, token: &StoredToken) -> Result<(), StoreError> {
        self.tokens
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert(account.to_string(), token.clone());
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<(), StoreError> {
        self.tokens
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .remove(account);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    account: String,
    saved_at: DateTime<Utc>,
    token: StoredToken,
}

fn default_ghlogin_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".ghlogin"))
        .unwrap_or_else(|| PathBuf::from(".ghlogin"))
}

fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() || lower == '-' {
            out.push(lower);
        } else {
            out.push('-');
        }
    }
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileTokenStore) {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(TokenStoreConfig::new(dir.path().to_path_buf()));
        (dir, store)
    }

    #[test]
    fn token_round_trip_works() {
        let (_dir, store) = temp_store();
        let token = StoredToken {
            access_token: "gho_abc".to_string(),
            token_type: Some("bearer".to_string()),
            scopes: Some(vec!["repo".to_string()]),
        };
        store.save("github", &token).unwrap();
        let loaded = store.load("github").unwrap().unwrap();
        assert_eq!(loaded, token);
    }

    #[test]
    fn file_keeps_access_token_key_with_space() {
        let (dir, store) = temp_store();
        store.save("github", &StoredToken::new("gho_abc")).unwrap();
        let raw = fs::read_to_string(dir.path().join("github.toml")).unwrap();
        assert!(raw.contains("account = \"github\""));
        assert!(raw.contains("\"access token\" = \"gho_abc\""));
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = temp_store();
        store.save("github", &StoredToken::new("gho_abc")).unwrap();
        let mode = fs::metadata(dir.path().join("github.toml"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn load_missing_returns_none() {
        let (_dir, store) = temp_store();
        assert!(store.load("github").unwrap().is_none());
    }

    #[test]
    fn load_corrupt_file_is_an_error() {
        let (dir, store) = temp_store();
        fs::write(dir.path().join("github.toml"), "not = [valid").unwrap();
        assert!(matches!(
            store.load("github"),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn clear_removes_token_and_is_idempotent() {
        let (_dir, store) = temp_store();
        store.save("github", &StoredToken::new("gho_abc")).unwrap();
        store.clear("github").unwrap();
        assert!(store.load("github").unwrap().is_none());
        store.clear("github").unwrap();
    }

    #[test]
    fn memory_store_overwrites_in_place() {
        let store = MemoryTokenStore::new();
        store.save("github", &StoredToken::new("first")).unwrap();
        store.save("github", &StoredToken::new("second")).unwrap();
        assert_eq!(store.load("github").unwrap().unwrap().access_token, "second");
    }

    #[test]
    fn normalize_label_sanitizes_account_names() {
        assert_eq!(normalize_label("GitHub"), "github");
        assert_eq!(normalize_label("../etc"), "---etc");
        assert_eq!(normalize_label("  "), "default");
    }
}
