//! Store and synchronizer errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tutorsync_core::DateParseError;
use tutorsync_protocol::{ErrorCode, ProtocolError};
use tutorsync_providers::ProviderError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt value under key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid store key '{0}'")]
    InvalidKey(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while handling a save or delete request.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No credential could be obtained, or the calendar rejected it.
    #[error("authentication failed: {0}")]
    Auth(#[source] ProviderError),

    /// A calendar call failed.
    #[error("calendar request failed: {0}")]
    Network(#[source] ProviderError),

    #[error("session {session_id}: {source}")]
    DateParse {
        session_id: String,
        #[source]
        source: DateParseError,
    },

    /// No event id is recorded for the session.
    #[error("no calendar event recorded for session {session_id}")]
    Lookup { session_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// An inbound message could not be decoded.
    #[error("invalid message: {0}")]
    Protocol(#[from] ProtocolError),

    /// The sync worker has shut down.
    #[error("sync worker is not running")]
    WorkerStopped,
}

impl SyncError {
    /// The code reported on the result channel.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Auth(_) => ErrorCode::AuthenticationFailed,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::DateParse { .. } => ErrorCode::InvalidDate,
            Self::Lookup { .. } => ErrorCode::NotFound,
            Self::Store(_) => ErrorCode::StorageError,
            Self::Protocol(_) => ErrorCode::InvalidRequest,
            Self::WorkerStopped => ErrorCode::InternalError,
        }
    }

    pub fn lookup(session_id: impl Into<String>) -> Self {
        Self::Lookup {
            session_id: session_id.into(),
        }
    }
}

impl From<ProviderError> for SyncError {
    fn from(err: ProviderError) -> Self {
        if err.is_authentication() {
            Self::Auth(err)
        } else {
            Self::Network(err)
        }
    }
}
