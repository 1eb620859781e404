//! Bearer tokens and their on-disk store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_MARGIN: Duration = Duration::seconds(60);

/// An access token and what is needed to renew it.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Effective expiry, already shortened by the refresh margin.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            last_refresh: Utc::now(),
        }
    }

    /// A token that never expires, e.g. one supplied by the host.
    pub fn non_expiring(access_token: impl Into<String>) -> Self {
        Self::new(access_token, None, None)
    }

    /// Returns true once the token is inside the refresh margin.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.map(expiry_from_now);
        self.last_refresh = Utc::now();
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|at| at - Utc::now())
    }
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("last_refresh", &self.last_refresh)
            .finish()
    }
}

fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - EXPIRY_MARGIN
}

/// JSON token file with an in-memory copy.
///
/// Writes go through a temp file and a rename, and the file is made
/// readable by the owner only.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    tokens: Mutex<Option<TokenInfo>>,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<TokenInfo>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the token file. Returns `Ok(false)` if there is none.
    pub fn load(&self) -> ProviderResult<bool> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file: {e}")).with_source(e)
        })?;
        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!("failed to parse token file: {e}")).with_source(e)
        })?;

        info!(path = %self.path.display(), "loaded tokens");
        *self.lock() = Some(tokens);
        Ok(true)
    }

    fn write(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {e}"))
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("failed to serialize tokens: {e}")))?;
        fs::write(&temp_path, content).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {e}"))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename token file: {e}"))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        debug!(path = %self.path.display(), "saved tokens");
        Ok(())
    }

    pub fn get(&self) -> Option<TokenInfo> {
        self.lock().clone()
    }

    /// Replaces the tokens and writes them to disk.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        self.write(&tokens)?;
        *self.lock() = Some(tokens);
        Ok(())
    }

    /// Stores a refreshed access token, keeping the refresh token.
    pub fn update_access_token(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) -> ProviderResult<TokenInfo> {
        let mut guard = self.lock();
        let tokens = guard
            .as_mut()
            .ok_or_else(|| ProviderError::internal("no tokens to update"))?;
        tokens.update_access_token(access_token, expires_in_secs);
        let updated = tokens.clone();
        drop(guard);
        self.write(&updated)?;
        Ok(updated)
    }

    pub fn clear(&self) -> ProviderResult<()> {
        *self.lock() = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ProviderError::configuration(format!("failed to remove token file: {e}"))
            })?;
            info!(path = %self.path.display(), "cleared tokens");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.lock().as_ref().and_then(|t| t.refresh_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_includes_margin() {
        let token = TokenInfo::new("access", None, Some(3600));
        let remaining = token.time_until_expiry().unwrap();
        assert!(remaining <= Duration::seconds(3540));
        assert!(remaining > Duration::seconds(3500));
        assert!(!token.is_expired());
    }

    #[test]
    fn short_lived_token_is_already_expired() {
        let token = TokenInfo::new("access", None, Some(30));
        assert!(token.is_expired());
    }

    #[test]
    fn non_expiring_token() {
        let token = TokenInfo::non_expiring("access");
        assert!(token.expires_at.is_none());
        assert!(!token.is_expired());
    }

    #[test]
    fn debug_redacts_access_token() {
        let token = TokenInfo::new("super-secret", Some("refresh".into()), Some(3600));
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("has_refresh_token: true"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let storage = TokenStorage::new(&path);
        storage
            .set(TokenInfo::new("access", Some("refresh".into()), Some(3600)))
            .unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = TokenStorage::new(&path);
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.get().unwrap().access_token, "access");
        assert_eq!(reloaded.refresh_token().as_deref(), Some("refresh"));
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        TokenStorage::new(&path)
            .set(TokenInfo::non_expiring("access"))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn update_keeps_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("tokens.json"));
        storage
            .set(TokenInfo::new("old", Some("refresh".into()), Some(10)))
            .unwrap();

        let updated = storage.update_access_token("new", Some(3600)).unwrap();
        assert_eq!(updated.access_token, "new");
        assert_eq!(updated.refresh_token.as_deref(), Some("refresh"));
        assert!(!updated.is_expired());
    }

    #[test]
    fn update_without_tokens_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("tokens.json"));
        assert!(storage.update_access_token("new", None).is_err());
    }

    #[test]
    fn missing_file_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let storage = TokenStorage::new(&path);
        assert!(!storage.load().unwrap());

        storage.set(TokenInfo::non_expiring("access")).unwrap();
        storage.clear().unwrap();
        assert!(!path.exists());
        assert!(storage.get().is_none());
    }
}
