//! Client error types.

use thiserror::Error;
use tutorsync_core::{DateParseError, TracingError};
use tutorsync_providers::ProviderError;
use tutorsync_server::{StoreError, SyncError};

use crate::secret::SecretError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to resolve {field}: {source}")]
    Secret {
        field: &'static str,
        #[source]
        source: SecretError,
    },

    /// No access token and no OAuth client configured.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Date(#[from] DateParseError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The worker answered with an error response.
    #[error("{description}: {message}")]
    Request {
        description: &'static str,
        message: String,
    },

    /// The batch went through but some sessions were not synchronized.
    #[error("{0} session(s) failed to sync")]
    PartialFailure(usize),

    #[error("sync worker stopped before answering")]
    NoResponse,

    #[error(transparent)]
    Tracing(#[from] TracingError),
}

impl ClientError {
    pub(crate) fn secret(field: &'static str, source: SecretError) -> Self {
        Self::Secret { field, source }
    }
}
