//! The [`CalendarApi`] trait.

use std::future::Future;
use std::pin::Pin;

use crate::error::ProviderResult;
use crate::event::{CalendarEvent, CreatedEvent, NewEvent};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote operations on a single calendar.
///
/// Implementations acquire their own credentials. An authentication failure
/// is reported as [`ProviderErrorCode::AuthenticationFailed`](crate::ProviderErrorCode).
pub trait CalendarApi: Send + Sync {
    /// Short backend name used in logs ("google", "memory").
    fn name(&self) -> &str;

    /// Lists events on the calendar. Only the first page is returned.
    fn list_events(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>>;

    /// Creates an event.
    fn create_event<'a>(&'a self, event: &'a NewEvent)
    -> BoxFuture<'a, ProviderResult<CreatedEvent>>;

    /// Deletes an event. A missing event is reported as `NotFound`.
    fn delete_event<'a>(&'a self, event_id: &'a str) -> BoxFuture<'a, ProviderResult<()>>;
}
