//! Errors returned by calendar and credential operations.

use std::fmt;
use thiserror::Error;

/// Broad category of a provider failure.
///
/// Drives retry decisions and the error code reported back to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// No usable bearer token, or the calendar rejected it (401).
    AuthenticationFailed,
    /// The token lacks access to the calendar (403).
    AuthorizationFailed,
    /// Transport failure: connect, timeout, DNS, TLS.
    NetworkError,
    /// Too many requests (429).
    RateLimited,
    /// The calendar answered with a 5xx status.
    ServerError,
    /// A 2xx response whose body could not be understood.
    InvalidResponse,
    /// The event does not exist or was already deleted (404, 410).
    NotFound,
    /// Any other 4xx response.
    BadRequest,
    /// Missing or invalid configuration.
    ConfigurationError,
    /// Unexpected local failure.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true for transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    /// Returns the snake_case name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed calendar or credential operation.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Backend that raised the error ("google", "memory", ...).
    provider: Option<String>,
    /// HTTP status, when the error came from a response.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates an error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            status: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Maps a non-success HTTP status to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };
        let error = match status {
            401 => Self::authentication(message),
            403 => Self::authorization(message),
            404 | 410 => Self::not_found(message),
            429 => Self::rate_limited(message),
            500..=599 => Self::server(message),
            _ => Self::bad_request(message),
        };
        error.with_status(status)
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true for transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if the remote resource does not exist (404 or 410).
    pub fn is_not_found(&self) -> bool {
        self.code == ProviderErrorCode::NotFound
    }

    pub fn is_authentication(&self) -> bool {
        self.code == ProviderErrorCode::AuthenticationFailed
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "connection failed".to_string()
        } else {
            err.to_string()
        };
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), "").with_source(err),
            None => Self::network(message).with_source(err),
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_codes() {
        assert!(ProviderErrorCode::NetworkError.is_retryable());
        assert!(ProviderErrorCode::RateLimited.is_retryable());
        assert!(ProviderErrorCode::ServerError.is_retryable());
        assert!(!ProviderErrorCode::AuthenticationFailed.is_retryable());
        assert!(!ProviderErrorCode::NotFound.is_retryable());
        assert!(!ProviderErrorCode::BadRequest.is_retryable());
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (401, ProviderErrorCode::AuthenticationFailed),
            (403, ProviderErrorCode::AuthorizationFailed),
            (404, ProviderErrorCode::NotFound),
            (410, ProviderErrorCode::NotFound),
            (429, ProviderErrorCode::RateLimited),
            (500, ProviderErrorCode::ServerError),
            (503, ProviderErrorCode::ServerError),
            (400, ProviderErrorCode::BadRequest),
            (409, ProviderErrorCode::BadRequest),
        ];
        for (status, code) in cases {
            let err = ProviderError::from_status(status, "");
            assert_eq!(err.code(), code, "status {status}");
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn status_message_includes_body() {
        let err = ProviderError::from_status(400, "bad start time");
        assert_eq!(err.message(), "HTTP 400: bad start time");
        assert_eq!(ProviderError::from_status(502, "").message(), "HTTP 502");
    }

    #[test]
    fn display_includes_provider() {
        let err = ProviderError::rate_limited("slow down").with_provider("google");
        assert_eq!(err.to_string(), "[google] rate_limited: slow down");
    }

    #[test]
    fn gone_counts_as_not_found() {
        assert!(ProviderError::from_status(410, "").is_not_found());
        assert!(!ProviderError::from_status(500, "").is_not_found());
    }

    #[test]
    fn source_is_kept() {
        use std::error::Error;
        let err = ProviderError::internal("token file").with_source(std::io::Error::other("disk full"));
        assert!(err.source().is_some());
    }
}
