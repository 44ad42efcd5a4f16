//! Session storage for the VaultCore client
//!
//! The session is a pair of opaque strings, the access token and the refresh
//! token, kept under two well-known keys. Storage failures never escape this
//! layer: an unreadable backend reads as an empty session.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::error::{Result, VaultError};

/// Keys of the persisted session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionKey {
    AccessToken,
    RefreshToken,
}

impl SessionKey {
    pub const ALL: [SessionKey; 2] = [SessionKey::AccessToken, SessionKey::RefreshToken];

    /// Name under which the value is persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::AccessToken => "token",
            SessionKey::RefreshToken => "refreshToken",
        }
    }
}

/// Process-wide session storage.
///
/// Each call is a single atomic operation from the caller's point of view.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: SessionKey) -> Option<String>;

    fn set(&self, key: SessionKey, value: &str);

    /// Remove every session key.
    fn clear(&self);

    /// Store a refreshed token pair. A `None` refresh token keeps the stored
    /// one, since not every backend rotates it.
    fn replace_tokens(&self, access_token: &str, refresh_token: Option<&str>) {
        if let Some(refresh_token) = refresh_token {
            self.set(SessionKey::RefreshToken, refresh_token);
        }
        self.set(SessionKey::AccessToken, access_token);
    }

    fn access_token(&self) -> Option<String> {
        self.get(SessionKey::AccessToken)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(SessionKey::RefreshToken)
    }

    fn has_session(&self) -> bool {
        SessionKey::ALL.iter().any(|key| self.get(*key).is_some())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory session, for tests and short-lived processes
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<BTreeMap<SessionKey, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a token pair
    pub fn with_tokens(access_token: &str, refresh_token: Option<&str>) -> Self {
        let store = Self::new();
        store.set(SessionKey::AccessToken, access_token);
        if let Some(refresh_token) = refresh_token {
            store.set(SessionKey::RefreshToken, refresh_token);
        }
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        lock(&self.values).get(&key).cloned()
    }

    fn set(&self, key: SessionKey, value: &str) {
        lock(&self.values).insert(key, value.to_string());
    }

    fn clear(&self) {
        lock(&self.values).clear();
    }

    fn replace_tokens(&self, access_token: &str, refresh_token: Option<&str>) {
        let mut values = lock(&self.values);
        if let Some(refresh_token) = refresh_token {
            values.insert(SessionKey::RefreshToken, refresh_token.to_string());
        }
        values.insert(SessionKey::AccessToken, access_token.to_string());
    }
}

/// Session persisted as a small JSON object on disk.
///
/// The file is read once at construction and rewritten on every change. A
/// missing, unreadable or corrupt file yields an empty session.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match load_session(&path) {
            Ok(values) => values,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                BTreeMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) {
        if let Err(e) = save_session(&self.path, values) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist session");
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        lock(&self.values).get(key.as_str()).cloned()
    }

    fn set(&self, key: SessionKey, value: &str) {
        let mut values = lock(&self.values);
        values.insert(key.as_str().to_string(), value.to_string());
        self.persist(&values);
    }

    fn clear(&self) {
        let mut values = lock(&self.values);
        for key in SessionKey::ALL {
            values.remove(key.as_str());
        }
        self.persist(&values);
    }

    fn replace_tokens(&self, access_token: &str, refresh_token: Option<&str>) {
        let mut values = lock(&self.values);
        if let Some(refresh_token) = refresh_token {
            values.insert(
                SessionKey::RefreshToken.as_str().to_string(),
                refresh_token.to_string(),
            );
        }
        values.insert(
            SessionKey::AccessToken.as_str().to_string(),
            access_token.to_string(),
        );
        self.persist(&values);
    }
}

fn load_session(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| VaultError::file_read("Failed to read session file", e))?;

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    Ok(serde_json::from_str(&content)?)
}

fn save_session(path: &Path, values: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| VaultError::file_write("Failed to create session directory", e))?;
    }

    let content = serde_json::to_string_pretty(values)?;
    fs::write(path, content)
        .map_err(|e| VaultError::file_write("Failed to write session file", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| VaultError::file_write("Failed to restrict session file", e))?;
    }

    Ok(())
}
