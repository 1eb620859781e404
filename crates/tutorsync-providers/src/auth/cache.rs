//! Cached bearer credential with expiry and refresh.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ProviderResult;

use super::source::TokenSource;
use super::token::TokenInfo;

/// A bearer token borrowed for one request.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Holds the current token and asks its [`TokenSource`] for a new one when
/// the cached one is missing, expired or invalidated.
///
/// Concurrent callers that find the cache empty wait on the same lock, so
/// the source is asked once.
pub struct CredentialCache {
    source: Arc<dyn TokenSource>,
    cached: Mutex<Option<TokenInfo>>,
}

impl CredentialCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Returns a usable access token, refreshing it if needed.
    pub async fn access_token(&self) -> ProviderResult<AccessToken> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && !token.is_expired()
        {
            return Ok(AccessToken(token.access_token.clone()));
        }

        debug!(source = self.source.name(), "acquiring access token");
        let token = self.source.fetch_token().await?;
        let access = AccessToken(token.access_token.clone());
        info!(
            source = self.source.name(),
            expires_at = ?token.expires_at,
            "access token acquired"
        );
        *cached = Some(token);
        Ok(access)
    }

    /// Drops the cached token, typically after the calendar answered 401.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if cached.take().is_some() {
            debug!(source = self.source.name(), "access token invalidated");
        }
        self.source.invalidate();
    }

    pub async fn is_cached(&self) -> bool {
        self.cached
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_expired())
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("source", &self.source.name())
            .finish_non_exhaustive()
    }
}
