//! Where bearer tokens come from.

use crate::calendar::BoxFuture;
use crate::error::{ProviderError, ProviderResult};

use super::token::TokenInfo;

/// Produces a fresh bearer token on demand.
///
/// Called by [`CredentialCache`](super::CredentialCache) only when it holds
/// no usable token.
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_token(&self) -> BoxFuture<'_, ProviderResult<TokenInfo>>;

    /// Called when a token this source issued was rejected. The next
    /// [`fetch_token`](Self::fetch_token) must not hand it out again.
    fn invalidate(&self) {}
}

/// A fixed token handed over by the host identity service.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenSource").finish_non_exhaustive()
    }
}

impl TokenSource for StaticTokenSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_token(&self) -> BoxFuture<'_, ProviderResult<TokenInfo>> {
        Box::pin(async move {
            if self.token.trim().is_empty() {
                return Err(ProviderError::authentication("no access token configured"));
            }
            Ok(TokenInfo::non_expiring(self.token.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_returns_token() {
        let source = StaticTokenSource::new("abc");
        let token = source.fetch_token().await.unwrap();
        assert_eq!(token.access_token, "abc");
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn empty_static_token_is_auth_error() {
        let err = StaticTokenSource::new("  ").fetch_token().await.unwrap_err();
        assert!(err.is_authentication());
    }
}
