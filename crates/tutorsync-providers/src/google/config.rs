//! Google Calendar client configuration.

use std::time::Duration;

use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// Google Calendar v3 REST root.
pub const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth client used for the refresh grant.
#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Settings for [`GoogleCalendar`](super::GoogleCalendar).
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Calendar to write to. Defaults to `primary`.
    pub calendar_id: String,
    /// REST root, overridable for tests.
    pub api_base: Url,
    /// Token endpoint for the refresh grant.
    pub token_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
    /// Page size for the event listing.
    pub max_results: u32,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_CALENDAR_ID: &'static str = "primary";
    /// Largest page Google accepts.
    pub const DEFAULT_MAX_RESULTS: u32 = 2500;

    pub fn new() -> Self {
        Self {
            calendar_id: Self::DEFAULT_CALENDAR_ID.to_string(),
            api_base: Url::parse(GOOGLE_API_BASE).expect("valid API base URL"),
            token_url: Url::parse(GOOGLE_TOKEN_URL).expect("valid token URL"),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("tutorsync/{}", env!("CARGO_PKG_VERSION")),
            max_results: Self::DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    pub fn with_api_base(mut self, base: &str) -> ProviderResult<Self> {
        self.api_base = parse_url("api_base", base)?;
        Ok(self)
    }

    pub fn with_token_url(mut self, url: &str) -> ProviderResult<Self> {
        self.token_url = parse_url("token_url", url)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// `{base}/calendars/{calendar}/events`
    pub fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base.as_str().trim_end_matches('/'),
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// `{base}/calendars/{calendar}/events/{event}`
    pub fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.calendar_id.trim().is_empty() {
            return Err("calendar_id must not be empty".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be positive".to_string());
        }
        if self.max_results == 0 {
            return Err("max_results must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_url(field: &str, value: &str) -> ProviderResult<Url> {
    Url::parse(value)
        .map_err(|e| ProviderError::configuration(format!("invalid {field} '{value}': {e}")))
}
