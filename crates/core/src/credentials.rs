//! Session credential storage
//!
//! The API client reads the access and refresh tokens through
//! [`CredentialStore`]. Only the refresh routine and explicit login/logout
//! code write to it.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Access/refresh token pair issued by the marketplace API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Opaque key-value persistence for the session credentials
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted
    fn set_access_token(&self, token: &str) -> CoreResult<()>;

    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted
    fn set_refresh_token(&self, token: &str) -> CoreResult<()>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be updated
    fn remove_access_token(&self) -> CoreResult<()>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be updated
    fn remove_refresh_token(&self) -> CoreResult<()>;

    /// Store both tokens of a freshly issued pair
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered
    fn store_pair(&self, pair: &CredentialPair) -> CoreResult<()> {
        self.set_access_token(&pair.access_token)?;
        self.set_refresh_token(&pair.refresh_token)
    }

    /// Remove both tokens
    ///
    /// Both removals are attempted even if the first one fails.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered
    fn clear(&self) -> CoreResult<()> {
        let access = self.remove_access_token();
        let refresh = self.remove_refresh_token();
        access.and(refresh)
    }

    /// Current pair, if both tokens are present
    fn pair(&self) -> Option<CredentialPair> {
        Some(CredentialPair {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
        })
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl StoredTokens {
    const fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a credential pair
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            tokens: RwLock::new(StoredTokens {
                access_token: Some(pair.access_token),
                refresh_token: Some(pair.refresh_token),
            }),
        }
    }

    fn update(&self, f: impl FnOnce(&mut StoredTokens)) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut tokens);
    }

    fn read(&self) -> StoredTokens {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.read().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token
    }

    fn set_access_token(&self, token: &str) -> CoreResult<()> {
        self.update(|t| t.access_token = Some(token.to_string()));
        Ok(())
    }

    fn set_refresh_token(&self, token: &str) -> CoreResult<()> {
        self.update(|t| t.refresh_token = Some(token.to_string()));
        Ok(())
    }

    fn remove_access_token(&self) -> CoreResult<()> {
        self.update(|t| t.access_token = None);
        Ok(())
    }

    fn remove_refresh_token(&self) -> CoreResult<()> {
        self.update(|t| t.refresh_token = None);
        Ok(())
    }
}

/// Credential store persisted as a JSON file
///
/// Tokens are cached in memory and the file is rewritten on every change.
/// The file is deleted once both tokens are removed.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    tokens: RwLock<StoredTokens>,
}

impl FileCredentialStore {
    /// Open the store, loading any tokens already saved at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let tokens = if path.exists() {
            debug!("Loading credentials from: {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            StoredTokens::default()
        };

        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoredTokens {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut StoredTokens)) -> CoreResult<()> {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut tokens);
        self.persist(&tokens)
    }

    fn persist(&self, tokens: &StoredTokens) -> CoreResult<()> {
        if tokens.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => {
                    warn!("Failed to remove {}: {e}", self.path.display());
                    Err(CoreError::storage_error(format!(
                        "failed to remove {}: {e}",
                        self.path.display()
                    )))
                }
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(tokens)?;
        std::fs::write(&self.path, content).map_err(|e| {
            CoreError::storage_error(format!("failed to write {}: {e}", self.path.display()))
        })?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.read().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token
    }

    fn set_access_token(&self, token: &str) -> CoreResult<()> {
        self.update(|t| t.access_token = Some(token.to_string()))
    }

    fn set_refresh_token(&self, token: &str) -> CoreResult<()> {
        self.update(|t| t.refresh_token = Some(token.to_string()))
    }

    fn remove_access_token(&self) -> CoreResult<()> {
        self.update(|t| t.access_token = None)
    }

    fn remove_refresh_token(&self) -> CoreResult<()> {
        self.update(|t| t.refresh_token = None)
    }
}
