//! Durable storage for the session's token pair
//!
//! Keeps the access and refresh tokens under fixed keys (`accessToken`,
//! `refreshToken`) in a JSON object. File-backed stores write with atomic
//! temp-file + rename and 0600 permissions so a restarted client resumes the
//! previous session; in-memory stores exist for tests and throwaway sessions.
//! A tokio Mutex serializes writes from login, refresh and logout.
//!
//! The store holds no logic beyond get/set/clear. Only `AuthSession`
//! mutates it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use common::Secret;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::{Error, Result};
use crate::token::TokenPair;

/// Token storage keyed by fixed names.
pub struct TokenStore {
    path: Option<PathBuf>,
    state: Mutex<HashMap<String, String>>,
}

impl TokenStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Load tokens from the given file path.
    ///
    /// If the file doesn't exist it is created as `{}` (no session yet).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Storage(format!("reading token file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded persisted tokens");
            entries
        } else {
            info!(path = %path.display(), "token file not found, starting logged out");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub async fn get(&self, key: &str) -> Option<Secret<String>> {
        let state = self.state.lock().await;
        state.get(key).cloned().map(Secret::new)
    }

    pub async fn access_token(&self) -> Option<Secret<String>> {
        self.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn refresh_token(&self) -> Option<Secret<String>> {
        self.get(REFRESH_TOKEN_KEY).await
    }

    /// Replace both tokens in one write.
    pub async fn set_pair(&self, pair: &TokenPair) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(ACCESS_TOKEN_KEY.to_string(), pair.access.clone());
        state.insert(REFRESH_TOKEN_KEY.to_string(), pair.refresh.clone());
        debug!("stored token pair");
        self.persist(&state).await
    }

    /// Remove both tokens. Clearing an empty store is a no-op write.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.remove(ACCESS_TOKEN_KEY);
        state.remove(REFRESH_TOKEN_KEY);
        debug!("cleared token pair");
        self.persist(&state).await
    }

    pub async fn is_empty(&self) -> bool {
        let state = self.state.lock().await;
        state.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, state: &HashMap<String, String>) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, state).await,
            None => Ok(()),
        }
    }
}

/// Write the token map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Permissions are 0600 since the file holds live credentials.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("token path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}
