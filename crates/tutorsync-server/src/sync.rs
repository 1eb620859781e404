//! Creates and deletes calendar events for tutoring sessions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};
use tutorsync_core::{SessionRecord, SessionTime};
use tutorsync_protocol::{
    ErrorCode, Request, Response, SessionEvent, SessionFailure, SyncReport,
};
use tutorsync_providers::{CalendarApi, CalendarEvent, NewEvent};

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;
use crate::store::SessionStore;

/// A session whose date parsed and which may need an event.
struct Planned<'a> {
    session_id: String,
    record: &'a SessionRecord,
    event: NewEvent,
    start: DateTime<Utc>,
}

/// Matches sessions against calendar events and keeps the store in step
/// with remote deletions.
pub struct Synchronizer {
    calendar: Arc<dyn CalendarApi>,
    store: Arc<SessionStore>,
    time_zone: Tz,
    retry: RetryPolicy,
}

impl Synchronizer {
    pub fn new(calendar: Arc<dyn CalendarApi>, store: Arc<SessionStore>, time_zone: Tz) -> Self {
        Self {
            calendar,
            store,
            time_zone,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// Dispatches a request and folds any error into an error response.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::SaveSessions { sessions } => match self.sync_create(&sessions).await {
                Ok(report) => Response::SessionsSynced { report },
                Err(e) => Response::error(e.code(), e.to_string()),
            },
            Request::DeleteSession { session_id } => match self.sync_delete(&session_id).await {
                Ok(event_id) => Response::SessionDeleted {
                    session_id,
                    event_id,
                },
                Err(e) => Response::error(e.code(), e.to_string()),
            },
        }
    }

    /// Creates an event for every session not already on the calendar.
    ///
    /// Sessions with unparsable dates fail individually and never reach the
    /// network. An existing event with the same summary and start instant
    /// counts as the session's event. Creates run concurrently; one failing
    /// does not affect the others. Only an authentication failure while
    /// listing events fails the whole batch.
    pub async fn sync_create(&self, sessions: &[SessionRecord]) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();
        let mut planned = Vec::with_capacity(sessions.len());

        for record in sessions {
            let session_id = record.session_id();
            match SessionTime::parse(&record.date, &self.time_zone) {
                Ok(time) => planned.push(Planned {
                    start: time.start_utc(),
                    event: NewEvent::for_session(record, &time),
                    session_id,
                    record,
                }),
                Err(source) => {
                    let err = SyncError::DateParse {
                        session_id: session_id.clone(),
                        source,
                    };
                    warn!(session_id = %session_id, date = %record.date, "skipping session: {err}");
                    report.failed.push(SessionFailure {
                        session_id,
                        code: err.code(),
                        message: err.to_string(),
                    });
                }
            }
        }

        if planned.is_empty() {
            debug!("no sessions with valid dates, nothing to sync");
            return Ok(report);
        }

        let existing = self.existing_events().await?;

        // (summary, start) -> index into `to_create` of the session creating it.
        let mut claimed: HashMap<(String, DateTime<Utc>), usize> = HashMap::new();
        let mut twins: Vec<(String, usize)> = Vec::new();
        let mut links = Vec::new();
        let mut to_create = Vec::new();
        for plan in planned {
            if let Some(event) = existing
                .iter()
                .find(|e| e.matches(&plan.event.summary, plan.start))
            {
                debug!(session_id = %plan.session_id, event_id = %event.id, "event already exists");
                links.push((plan.session_id.clone(), event.id.clone()));
                report.skipped.push(SessionEvent {
                    session_id: plan.session_id,
                    event_id: Some(event.id.clone()),
                });
            } else if let Some(&index) = claimed.get(&(plan.event.summary.clone(), plan.start)) {
                info!(
                    session_id = %plan.session_id,
                    student = %plan.record.student,
                    course = %plan.record.course,
                    "another session in this batch has the same student and start"
                );
                twins.push((plan.session_id, index));
            } else {
                claimed.insert((plan.event.summary.clone(), plan.start), to_create.len());
                to_create.push(plan);
            }
        }

        let results = join_all(to_create.iter().map(|plan| async move {
            let outcome = self
                .retry
                .run("create event", || self.calendar.create_event(&plan.event))
                .await;
            (plan, outcome)
        }))
        .await;

        // Indexed like `to_create`; `Some` holds the failure of that create.
        let mut create_errors: Vec<Option<(ErrorCode, String)>> = Vec::with_capacity(results.len());
        for (plan, outcome) in results {
            match outcome {
                Ok(created) => {
                    info!(
                        session_id = %plan.session_id,
                        event_id = ?created.id,
                        summary = %plan.event.summary,
                        "created calendar event"
                    );
                    if let Some(ref event_id) = created.id {
                        links.push((plan.session_id.clone(), event_id.clone()));
                    }
                    report.created.push(SessionEvent {
                        session_id: plan.session_id.clone(),
                        event_id: created.id,
                    });
                    create_errors.push(None);
                }
                Err(e) => {
                    let err = SyncError::from(e);
                    error!(session_id = %plan.session_id, error = %err, "failed to create event");
                    report.failed.push(SessionFailure {
                        session_id: plan.session_id.clone(),
                        code: err.code(),
                        message: err.to_string(),
                    });
                    create_errors.push(Some((err.code(), err.to_string())));
                }
            }
        }

        // A twin is on the calendar only if the session it shares an event
        // with was created.
        for (session_id, index) in twins {
            match create_errors.get(index).cloned().flatten() {
                None => report.skipped.push(SessionEvent {
                    session_id,
                    event_id: None,
                }),
                Some((code, message)) => {
                    warn!(session_id = %session_id, "shared event was not created");
                    report.failed.push(SessionFailure {
                        session_id,
                        code,
                        message: format!("event shared with another session failed: {message}"),
                    });
                }
            }
        }

        if !links.is_empty() {
            self.store.link_events(links)?;
        }

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "sync finished"
        );
        Ok(report)
    }

    /// Lists calendar events. Failures other than authentication are logged
    /// and treated as an empty calendar.
    async fn existing_events(&self) -> SyncResult<Vec<CalendarEvent>> {
        match self
            .retry
            .run("list events", || self.calendar.list_events())
            .await
        {
            Ok(events) => Ok(events),
            Err(e) if e.is_authentication() => {
                error!(calendar = self.calendar.name(), error = %e, "cannot list events");
                Err(SyncError::Auth(e))
            }
            Err(e) => {
                warn!(
                    calendar = self.calendar.name(),
                    error = %e,
                    "listing events failed, assuming none exist"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Deletes the session's event and forgets the session.
    ///
    /// Returns the deleted event id. An event the calendar no longer has
    /// counts as deleted. On any other failure the store is left untouched.
    pub async fn sync_delete(&self, session_id: &str) -> SyncResult<String> {
        let Some(event_id) = self.store.event_id(session_id)? else {
            let err = SyncError::lookup(session_id);
            warn!(session_id, "{err}, not deleting");
            return Err(err);
        };

        let outcome = self
            .retry
            .run("delete event", || self.calendar.delete_event(&event_id))
            .await;
        match outcome {
            Ok(()) => info!(session_id, event_id = %event_id, "deleted calendar event"),
            Err(e) if e.is_not_found() => {
                info!(session_id, event_id = %event_id, "event already gone from calendar");
            }
            Err(e) => {
                error!(session_id, error = %e, "failed to delete event, keeping session");
                return Err(e.into());
            }
        }

        match self.store.remove(session_id)? {
            Some(record) => debug!(session_id, student = %record.student, "removed session"),
            None => debug!(session_id, "session was not in the stored list"),
        }
        Ok(event_id)
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("calendar", &self.calendar.name())
            .field("time_zone", &self.time_zone)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
