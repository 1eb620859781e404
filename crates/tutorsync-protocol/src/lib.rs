//! Messages exchanged between the extractor and the synchronizer.
//!
//! The extractor dispatches one of two inbound messages, mirroring the
//! schedule page's wire format:
//!
//! ```json
//! { "action": "saveSessions", "sessions": [ { "date": "...", "student": "...", "course": "..." } ] }
//! { "action": "deleteSession", "sessionId": "..." }
//! ```
//!
//! Inside the process every message travels in an [`Envelope`] carrying a
//! request id, and every processed request produces a [`Response`] with the
//! same id so that failures are observable by whoever is listening.
//! Messages read from outside decode as [`Inbound`], which accepts both the
//! bare page message and a full envelope.
//!
//! ```rust
//! use tutorsync_protocol::{Envelope, Request, decode_message, encode_message};
//!
//! let request = Envelope::request("req-1", Request::delete_session("abc"));
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode_message, encode_message};
pub use error::{ProtocolError, ProtocolResult};
pub use types::{
    Envelope, ErrorCode, ErrorResponse, Inbound, Request, Response, SessionEvent,
    SessionFailure, SyncReport,
};

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum encoded message size (1 MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
