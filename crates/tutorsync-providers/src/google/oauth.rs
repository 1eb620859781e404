//! Refresh-token grant against Google's OAuth endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::auth::{TokenInfo, TokenSource, TokenStorage};
use crate::calendar::BoxFuture;
use crate::error::{ProviderError, ProviderResult};

use super::config::{GoogleConfig, OAuthCredentials};

/// Issues access tokens from a stored refresh token and writes each new
/// access token back to the token file.
///
/// A stored access token that has not expired is reused, unless it was
/// rejected since the last successful grant.
#[derive(Debug)]
pub struct RefreshTokenSource {
    credentials: OAuthCredentials,
    storage: Arc<TokenStorage>,
    token_url: Url,
    http_client: reqwest::Client,
    force_refresh: AtomicBool,
}

impl RefreshTokenSource {
    pub fn new(
        credentials: OAuthCredentials,
        storage: Arc<TokenStorage>,
        config: &GoogleConfig,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::configuration(format!("HTTP client: {e}")).with_source(e))?;

        Ok(Self {
            credentials,
            storage,
            token_url: config.token_url.clone(),
            http_client,
            force_refresh: AtomicBool::new(false),
        })
    }

    async fn refresh(&self) -> ProviderResult<TokenInfo> {
        if self.storage.get().is_none() {
            self.storage.load()?;
        }
        if !self.force_refresh.load(Ordering::SeqCst)
            && let Some(tokens) = self.storage.get()
            && !tokens.is_expired()
        {
            debug!("stored access token still valid");
            return Ok(tokens);
        }

        let refresh_token = self.storage.refresh_token().ok_or_else(|| {
            ProviderError::authentication(format!(
                "no refresh token in {}",
                self.storage.path().display()
            ))
        })?;

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("token refresh request failed: {e}")).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read token response: {e}")).with_source(e)
        })?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "token refresh failed ({status}): {body}"
            ))
            .with_status(status.as_u16()));
        }

        let response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {e}")).with_source(e)
        })?;

        let tokens = self
            .storage
            .update_access_token(response.access_token, response.expires_in)?;
        self.force_refresh.store(false, Ordering::SeqCst);
        info!("refreshed access token");
        Ok(tokens)
    }
}

impl TokenSource for RefreshTokenSource {
    fn name(&self) -> &str {
        "google-refresh"
    }

    fn fetch_token(&self) -> BoxFuture<'_, ProviderResult<TokenInfo>> {
        Box::pin(self.refresh())
    }

    fn invalidate(&self) {
        debug!("stored access token rejected, next fetch refreshes");
        self.force_refresh.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}
