//! In-process [`CalendarApi`] used by tests and `--dry-run`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::calendar::{BoxFuture, CalendarApi};
use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::event::{CalendarEvent, CreatedEvent, NewEvent};

/// Number of calls made to each operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub delete: usize,
}

#[derive(Default)]
struct State {
    events: Vec<CalendarEvent>,
    next_id: u64,
    calls: CallCounts,
    list_failures: VecDeque<ProviderErrorCode>,
    /// Keyed by event summary.
    create_failures: HashMap<String, ProviderErrorCode>,
    delete_failures: VecDeque<ProviderErrorCode>,
}

/// A calendar held in memory.
///
/// Failures can be queued per operation to exercise error paths.
#[derive(Default)]
pub struct MemoryCalendar {
    state: Mutex<State>,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        let calendar = Self::new();
        calendar.lock().events = events;
        calendar
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.lock().events.clone()
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Makes the next `list_events` call fail.
    pub fn fail_next_list(&self, code: ProviderErrorCode) {
        self.lock().list_failures.push_back(code);
    }

    /// Makes every create with this summary fail.
    pub fn fail_creates_for(&self, summary: impl Into<String>, code: ProviderErrorCode) {
        self.lock().create_failures.insert(summary.into(), code);
    }

    /// Makes the next `times` delete calls fail.
    pub fn fail_next_deletes(&self, code: ProviderErrorCode, times: usize) {
        let mut state = self.lock();
        for _ in 0..times {
            state.delete_failures.push_back(code);
        }
    }
}

fn injected(code: ProviderErrorCode, op: &str) -> ProviderError {
    ProviderError::new(code, format!("injected {op} failure")).with_provider("memory")
}

impl CalendarApi for MemoryCalendar {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_events(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.list += 1;
            if let Some(code) = state.list_failures.pop_front() {
                return Err(injected(code, "list"));
            }
            Ok(state.events.clone())
        })
    }

    fn create_event<'a>(
        &'a self,
        event: &'a NewEvent,
    ) -> BoxFuture<'a, ProviderResult<CreatedEvent>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.create += 1;
            if let Some(code) = state.create_failures.get(&event.summary) {
                return Err(injected(*code, "create"));
            }

            state.next_id += 1;
            let id = format!("mem-{}", state.next_id);
            state.events.push(CalendarEvent {
                id: id.clone(),
                summary: Some(event.summary.clone()),
                description: Some(event.description.clone()),
                start: event.start.clone(),
                end: event.end.clone(),
                status: Some("confirmed".to_string()),
            });
            Ok(CreatedEvent {
                id: Some(id),
                html_link: None,
            })
        })
    }

    fn delete_event<'a>(&'a self, event_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.delete += 1;
            if let Some(code) = state.delete_failures.pop_front() {
                return Err(injected(code, "delete"));
            }

            let before = state.events.len();
            state.events.retain(|e| e.id != event_id);
            if state.events.len() == before {
                return Err(ProviderError::not_found(format!("no event {event_id}"))
                    .with_provider("memory")
                    .with_status(404));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorsync_core::{SessionRecord, SessionTime};

    fn new_event(student: &str) -> NewEvent {
        let record = SessionRecord::new("Jan 5, 2025 3:00 PM", student, "Calculus");
        let time = SessionTime::parse(&record.date, &chrono_tz::America::Chicago).unwrap();
        NewEvent::for_session(&record, &time)
    }

    #[tokio::test]
    async fn create_list_delete() {
        let calendar = MemoryCalendar::new();
        let created = calendar.create_event(&new_event("Alice")).await.unwrap();
        let id = created.id.unwrap();

        let events = calendar.list_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, id);

        calendar.delete_event(&id).await.unwrap();
        assert!(calendar.events().is_empty());
        assert!(calendar.delete_event(&id).await.unwrap_err().is_not_found());

        assert_eq!(
            calendar.calls(),
            CallCounts {
                list: 1,
                create: 1,
                delete: 2
            }
        );
    }

    #[tokio::test]
    async fn injected_failures() {
        let calendar = MemoryCalendar::new();
        calendar.fail_next_list(ProviderErrorCode::AuthenticationFailed);
        calendar.fail_creates_for("Tutoring Session with Bob", ProviderErrorCode::ServerError);
        calendar.fail_next_deletes(ProviderErrorCode::NetworkError, 1);

        assert!(calendar.list_events().await.unwrap_err().is_authentication());
        assert!(calendar.list_events().await.is_ok());

        assert!(calendar.create_event(&new_event("Alice")).await.is_ok());
        let err = calendar.create_event(&new_event("Bob")).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);

        let err = calendar.delete_event("mem-1").await.unwrap_err();
        assert!(err.is_retryable());
        calendar.delete_event("mem-1").await.unwrap();
    }
}
