//! Remote calendar access for tutorsync.
//!
//! - [`CalendarApi`] - list, create and delete events on one calendar
//! - [`GoogleCalendar`](google::GoogleCalendar) - Google Calendar v3 implementation
//! - [`CredentialCache`](auth::CredentialCache) - bearer token cache with expiry and refresh
//! - [`MemoryCalendar`](memory::MemoryCalendar) - in-process calendar for tests and dry runs
//! - [`ProviderError`] - error type for all remote operations
//!
//! ```text
//!  ┌──────────────┐   access_token()   ┌─────────────────┐
//!  │ GoogleCalendar│ ─────────────────▶ │ CredentialCache │
//!  └──────┬───────┘                    └────────┬────────┘
//!         │ CalendarApi                         │ TokenSource
//!         ▼                                     ▼
//!   Google Calendar v3               static token / refresh grant
//! ```

pub mod auth;
pub mod calendar;
pub mod error;
pub mod event;
pub mod google;
pub mod memory;

pub use calendar::{BoxFuture, CalendarApi};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use event::{CalendarEvent, CreatedEvent, EventDateTime, NewEvent};
