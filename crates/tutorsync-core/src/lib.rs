//! Core types: session records, date normalization, tracing

pub mod session;
pub mod time;
pub mod tracing;

pub use session::{SessionKey, SessionRecord, derive_session_id};
pub use time::{
    DEFAULT_TIME_ZONE, DateParseError, SESSION_DURATION, SessionTime, normalize, normalize_text,
    parse_time_zone,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
