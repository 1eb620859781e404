//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/tutorsync/config.toml` by default.
//!
//! `access_token`, `client_id` and `client_secret` accept secret references
//! (`pass::…`, `env::…`), see [`crate::secret`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tutorsync_core::{DEFAULT_TIME_ZONE, parse_time_zone};
use tutorsync_providers::auth::{StaticTokenSource, TokenSource, TokenStorage};
use tutorsync_providers::google::{GoogleConfig, OAuthCredentials, RefreshTokenSource};
use tutorsync_server::{RetryPolicy, SyncConfig, default_data_dir};

use crate::error::{ClientError, ClientResult};
use crate::secret;

const REDACTED: &str = "<redacted>";

/// Configuration for the tutorsync client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug logging.
    pub debug: bool,

    pub google: GoogleSettings,

    pub store: StoreSettings,

    pub retry: RetrySettings,
}

/// Google Calendar settings.
///
/// Either `access_token` or the `client_id`/`client_secret` pair must be set.
/// The pair is used with a refresh token stored at `token_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub calendar_id: String,

    /// Zone that scraped session dates are written in.
    pub time_zone: String,

    pub timeout_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Refresh token file. Defaults to `google-tokens.json` in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,

    /// REST root override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            calendar_id: GoogleConfig::DEFAULT_CALENDAR_ID.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
            access_token: None,
            client_id: None,
            client_secret: None,
            token_path: None,
            api_base: None,
        }
    }
}

/// Local store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Retry settings for calendar calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::default();
        let multiplier = policy.backoff_multiplier;
        policy
            .with_max_attempts(self.max_attempts.max(1))
            .with_backoff(
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
                multiplier,
            )
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tutorsync")
    }

    /// Directory holding the session store and the token file.
    pub fn data_dir(&self) -> PathBuf {
        self.store.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Builds the synchronizer settings.
    pub fn sync_config(&self) -> ClientResult<SyncConfig> {
        let config = SyncConfig::new(self.data_dir())
            .with_time_zone(&self.google.time_zone)?
            .with_retry(self.retry.to_policy());
        Ok(config)
    }

    /// Copy of the configuration with inline secrets masked.
    ///
    /// `pass::` and `env::` references are kept as they are.
    pub fn redacted(&self) -> Self {
        let mask = |value: &Option<String>| {
            value.as_ref().map(|v| {
                if secret::is_reference(v) {
                    v.clone()
                } else {
                    REDACTED.to_string()
                }
            })
        };

        let mut config = self.clone();
        config.google.access_token = mask(&self.google.access_token);
        config.google.client_secret = mask(&self.google.client_secret);
        config
    }
}

impl GoogleSettings {
    pub fn time_zone(&self) -> ClientResult<Tz> {
        Ok(parse_time_zone(&self.time_zone)?)
    }

    /// Converts to provider configuration.
    pub fn to_provider_config(&self) -> ClientResult<GoogleConfig> {
        let mut config = GoogleConfig::new()
            .with_calendar_id(&self.calendar_id)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(ref base) = self.api_base {
            config = config.with_api_base(base)?;
        }
        config
            .validate()
            .map_err(|e| ClientError::Config(format!("google: {}", e)))?;
        Ok(config)
    }

    /// Token file used by the refresh flow.
    pub fn token_path(&self, data_dir: &Path) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| data_dir.join("google-tokens.json"))
    }

    /// Resolves the OAuth client from the inline fields.
    pub fn resolve_credentials(&self) -> ClientResult<OAuthCredentials> {
        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            ClientError::AuthRequired(format!(
                "no Google credentials. Add to {}:\n  \
                 [google]\n  \
                 access_token = \"env::TUTORSYNC_TOKEN\"\n\n  \
                 or client_id / client_secret with a refresh token file",
                ClientConfig::default_path().display()
            ))
        })?;
        let raw_secret = self.client_secret.as_deref().ok_or_else(|| {
            ClientError::Config("client_secret is missing from the [google] section".to_string())
        })?;

        let client_id =
            secret::resolve(raw_id).map_err(|e| ClientError::secret("client_id", e))?;
        let client_secret =
            secret::resolve(raw_secret).map_err(|e| ClientError::secret("client_secret", e))?;

        let credentials = OAuthCredentials::new(client_id, client_secret);
        credentials
            .validate()
            .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;
        Ok(credentials)
    }

    /// Picks the token source: a fixed access token if one is configured,
    /// otherwise the refresh flow.
    pub fn token_source(
        &self,
        google: &GoogleConfig,
        data_dir: &Path,
    ) -> ClientResult<Arc<dyn TokenSource>> {
        if let Some(ref raw) = self.access_token {
            let token =
                secret::resolve(raw).map_err(|e| ClientError::secret("access_token", e))?;
            debug!("using configured access token");
            return Ok(Arc::new(StaticTokenSource::new(token)));
        }

        let credentials = self.resolve_credentials()?;
        let storage = Arc::new(TokenStorage::new(self.token_path(data_dir)));
        debug!(path = %storage.path().display(), "using refresh token flow");
        Ok(Arc::new(RefreshTokenSource::new(credentials, storage, google)?))
    }
}
