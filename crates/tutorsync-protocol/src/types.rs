//! Request and response types.

use serde::{Deserialize, Serialize};
use tutorsync_core::SessionRecord;

use crate::PROTOCOL_VERSION;
use crate::error::{ProtocolError, ProtocolResult};

/// Message envelope with versioning and request correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Request id shared by a request and its response.
    pub request_id: String,
    /// The actual payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Creates a request envelope.
    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    /// Creates a response envelope.
    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    /// Checks the protocol version.
    pub fn ensure_compatible(&self) -> ProtocolResult<()> {
        if self.protocol_version == PROTOCOL_VERSION {
            Ok(())
        } else {
            Err(ProtocolError::UnsupportedVersion(
                self.protocol_version.clone(),
            ))
        }
    }
}

/// Inbound requests handled by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Create calendar events for every session that is not on the calendar yet.
    SaveSessions {
        /// Sessions to synchronize.
        sessions: Vec<SessionRecord>,
    },

    /// Delete the calendar event of a session and forget the session locally.
    DeleteSession {
        /// Identifier of the session to delete.
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl Request {
    /// Creates a SaveSessions request.
    pub fn save_sessions(sessions: Vec<SessionRecord>) -> Self {
        Self::SaveSessions { sessions }
    }

    /// Creates a DeleteSession request.
    pub fn delete_session(session_id: impl Into<String>) -> Self {
        Self::DeleteSession {
            session_id: session_id.into(),
        }
    }

    /// Wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::SaveSessions { .. } => "saveSessions",
            Self::DeleteSession { .. } => "deleteSession",
        }
    }
}

/// A request as it arrives from outside the process: either already
/// wrapped in an [`Envelope`] or as the bare page message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Envelope(Envelope<Request>),
    Request(Request),
}

impl Inbound {
    /// Wraps a bare request in an envelope carrying `request_id`. An
    /// envelope keeps its own id.
    pub fn into_envelope(self, request_id: impl FnOnce() -> String) -> Envelope<Request> {
        match self {
            Self::Envelope(envelope) => envelope,
            Self::Request(request) => Envelope::request(request_id(), request),
        }
    }
}

/// Outcome of a processed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// A SaveSessions batch was processed. Individual failures are in the report.
    SessionsSynced {
        /// Per-session outcomes.
        report: SyncReport,
    },

    /// A session's event was deleted and the session removed locally.
    SessionDeleted {
        /// The deleted session.
        session_id: String,
        /// The deleted calendar event.
        event_id: String,
    },

    /// The request failed as a whole.
    Error {
        /// Error details.
        #[serde(flatten)]
        error: ErrorResponse,
    },
}

impl Response {
    /// Creates an Error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse {
                code,
                message: message.into(),
            },
        }
    }

    /// Returns true unless this is an error response.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// Returns the error if this is an error response.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Per-session results of a SaveSessions batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Sessions for which an event was created.
    #[serde(default)]
    pub created: Vec<SessionEvent>,
    /// Sessions already present on the calendar.
    #[serde(default)]
    pub skipped: Vec<SessionEvent>,
    /// Sessions that could not be synchronized.
    #[serde(default)]
    pub failed: Vec<SessionFailure>,
}

impl SyncReport {
    /// Number of sessions covered by the report.
    pub fn total(&self) -> usize {
        self.created.len() + self.skipped.len() + self.failed.len()
    }

    /// Returns true if no session failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A session paired with the calendar event it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Session identifier.
    pub session_id: String,
    /// Calendar event identifier, when the calendar reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// A session that failed to synchronize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    /// Session identifier.
    pub session_id: String,
    /// Failure category.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error category.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error categories reported on the result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Credential acquisition failed.
    AuthenticationFailed,
    /// A remote call failed (transport or non-2xx).
    NetworkError,
    /// The session date could not be parsed.
    InvalidDate,
    /// No calendar event is linked to the session.
    NotFound,
    /// Reading or writing persisted state failed.
    StorageError,
    /// The request was malformed.
    InvalidRequest,
    /// Unexpected internal failure.
    InternalError,
}

impl ErrorCode {
    /// Returns a human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "Authentication failed",
            Self::NetworkError => "Calendar request failed",
            Self::InvalidDate => "Invalid session date",
            Self::NotFound => "No calendar event for session",
            Self::StorageError => "Local storage error",
            Self::InvalidRequest => "The request was invalid",
            Self::InternalError => "An internal error occurred",
        }
    }
}
