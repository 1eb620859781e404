//! Turns scraped table rows into persisted sessions and sync requests.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use tutorsync_core::SessionRecord;
use tutorsync_protocol::{Inbound, Request, decode_message};

use crate::error::SyncResult;
use crate::store::SessionStore;
use crate::worker::{SyncHandle, new_request_id};

/// What one ingest did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Rows that yielded a session.
    pub scraped: usize,
    /// Sessions new to the store.
    pub added: usize,
    /// Sessions in the store afterwards.
    pub total: usize,
    /// Id of the dispatched save request, if one was sent.
    pub request_id: Option<String>,
}

/// Feeds scraped rows into the store and the sync worker.
#[derive(Debug, Clone)]
pub struct Extractor {
    store: Arc<SessionStore>,
    sync: SyncHandle,
}

impl Extractor {
    pub fn new(store: Arc<SessionStore>, sync: SyncHandle) -> Self {
        Self { store, sync }
    }

    /// Normalizes rows into sessions, appends the new ones to the store and
    /// asks the worker to sync the whole persisted list.
    ///
    /// Rows with fewer than five cells or a blank date, student or course
    /// are ignored.
    pub async fn ingest_rows<R: AsRef<[String]>>(&self, rows: &[R]) -> SyncResult<IngestSummary> {
        let records: Vec<SessionRecord> = rows
            .iter()
            .filter_map(|row| SessionRecord::from_row(row.as_ref()))
            .collect();
        let scraped = records.len();
        debug!(rows = rows.len(), scraped, "parsed rows");

        let added = self.store.append(records)?;
        let sessions = self.store.sessions()?;
        let total = sessions.len();

        let request_id = if sessions.is_empty() {
            None
        } else {
            Some(self.sync.save_sessions(sessions).await?)
        };

        info!(scraped, added, total, "ingested schedule");
        Ok(IngestSummary {
            scraped,
            added,
            total,
            request_id,
        })
    }

    /// Asks the worker to delete a session's event and forget the session.
    pub async fn cancel_session(&self, session_id: &str) -> SyncResult<String> {
        info!(session_id, "requesting session deletion");
        self.sync.delete_session(session_id).await
    }

    /// Decodes a JSON message in the page's wire format and queues it.
    ///
    /// A bare request gets a fresh request id; an envelope keeps its own.
    /// Sessions of a compatible `saveSessions` message are added to the
    /// store first, so they can be cancelled later. Returns the request id.
    pub async fn dispatch_message(&self, data: &[u8]) -> SyncResult<String> {
        let envelope = decode_message::<Inbound>(data)?.into_envelope(new_request_id);
        let request_id = envelope.request_id.clone();

        if envelope.ensure_compatible().is_ok()
            && let Request::SaveSessions { ref sessions } = envelope.payload
        {
            let added = self.store.append(sessions.iter().cloned())?;
            debug!(request_id = %request_id, added, "stored sessions from message");
        }

        info!(
            request_id = %request_id,
            action = envelope.payload.action(),
            "dispatching message"
        );
        self.sync.dispatch_envelope(envelope).await?;
        Ok(request_id)
    }

    /// Re-sends the persisted list without ingesting anything.
    pub async fn resync(&self) -> SyncResult<Option<String>> {
        let sessions = self.store.sessions()?;
        if sessions.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.sync.save_sessions(sessions).await?))
    }
}

/// Parses scraped rows from text.
///
/// Accepts a JSON array of string arrays, or one row per line with cells
/// separated by tabs. Blank lines are skipped.
pub fn parse_rows(input: &str) -> serde_json::Result<Vec<Vec<String>>> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed);
    }

    Ok(input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::sync::Synchronizer;
    use crate::worker::{SyncWorker, wait_for};
    use tutorsync_protocol::{ErrorCode, Response};
    use tutorsync_providers::memory::MemoryCalendar;

    fn row(date: &str, student: &str, course: &str) -> Vec<String> {
        vec![
            "42".to_string(),
            date.to_string(),
            student.to_string(),
            course.to_string(),
            "Scheduled".to_string(),
        ]
    }

    fn extractor() -> (Extractor, SyncWorker, Arc<SessionStore>, Arc<MemoryCalendar>) {
        let calendar = Arc::new(MemoryCalendar::new());
        let store = Arc::new(SessionStore::in_memory());
        let synchronizer = Arc::new(Synchronizer::new(
            calendar.clone(),
            store.clone(),
            chrono_tz::America::Chicago,
        ));
        let (worker, handle) = SyncWorker::new(synchronizer, 8);
        (Extractor::new(store.clone(), handle), worker, store, calendar)
    }

    #[tokio::test]
    async fn ingest_dedupes_and_persists() {
        let (extractor, _worker, store, _) = extractor();
        let rows = vec![
            row("Jan 5, 2025 3:00 PM", "Alice", "Calculus"),
            row("Jan 5, 2025 3:00 PM", "Alice", "Calculus"),
            row("Jan 6, 2025 4 p.m.", "Bob", "Physics"),
            vec!["short".to_string(), "row".to_string()],
            row("Jan 7, 2025 4 p.m.", "  ", "Physics"),
        ];

        let summary = extractor.ingest_rows(&rows).await.unwrap();
        assert_eq!(summary.scraped, 3);
        assert_eq!(summary.added, 2);
        assert_eq!(summary.total, 2);
        assert!(summary.request_id.is_some());

        let again = extractor.ingest_rows(&rows).await.unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(store.sessions().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ingest_without_sessions_sends_nothing() {
        let (extractor, _worker, _, _) = extractor();
        let rows: Vec<Vec<String>> = vec![];
        let summary = extractor.ingest_rows(&rows).await.unwrap();
        assert_eq!(summary, IngestSummary::default());
    }

    #[tokio::test]
    async fn end_to_end_create_then_cancel() {
        let (extractor, worker, store, calendar) = extractor();
        let mut results = extractor.sync.subscribe();
        let task = worker.spawn();

        let summary = extractor
            .ingest_rows(&[row("Jan. 5, 2025 3 p.m.", "Alice", "Calculus")])
            .await
            .unwrap();
        let request_id = summary.request_id.unwrap();
        let response = wait_for(&mut results, &request_id).await.unwrap();
        assert!(matches!(response, Response::SessionsSynced { .. }));
        assert_eq!(calendar.events().len(), 1);

        let session_id = store.sessions().unwrap()[0].session_id();
        let request_id = extractor.cancel_session(&session_id).await.unwrap();
        let response = wait_for(&mut results, &request_id).await.unwrap();
        assert!(response.is_success());
        assert!(store.sessions().unwrap().is_empty());
        assert!(calendar.events().is_empty());

        drop(extractor);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn bare_message_is_stored_and_synced() {
        let (extractor, worker, store, calendar) = extractor();
        let mut results = extractor.sync.subscribe();
        let task = worker.spawn();

        let message = br#"{"action":"saveSessions","sessions":[
            {"date":"Jan. 5, 2025 3 p.m.","student":"Alice","course":"Calculus"}
        ]}"#;
        let request_id = extractor.dispatch_message(message).await.unwrap();
        let response = wait_for(&mut results, &request_id).await.unwrap();
        assert!(matches!(response, Response::SessionsSynced { ref report } if report.created.len() == 1));
        assert_eq!(store.sessions().unwrap().len(), 1);
        assert_eq!(calendar.events().len(), 1);

        drop(extractor);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn enveloped_message_keeps_its_request_id() {
        let (extractor, worker, _, calendar) = extractor();
        let mut results = extractor.sync.subscribe();
        let task = worker.spawn();

        let message = br#"{"protocol_version":"1","request_id":"page-9",
            "payload":{"action":"deleteSession","sessionId":"unknown"}}"#;
        let request_id = extractor.dispatch_message(message).await.unwrap();
        assert_eq!(request_id, "page-9");

        let response = wait_for(&mut results, "page-9").await.unwrap();
        assert_eq!(response.as_error().unwrap().code, ErrorCode::NotFound);
        assert_eq!(calendar.calls().delete, 0);

        drop(extractor);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn incompatible_message_stores_nothing() {
        let (extractor, worker, store, calendar) = extractor();
        let mut results = extractor.sync.subscribe();
        let task = worker.spawn();

        let message = br#"{"protocol_version":"2","request_id":"old",
            "payload":{"action":"saveSessions","sessions":[
                {"date":"Jan 5, 2025 3 PM","student":"Alice","course":"Calculus"}
            ]}}"#;
        extractor.dispatch_message(message).await.unwrap();
        let response = wait_for(&mut results, "old").await.unwrap();
        assert_eq!(response.as_error().unwrap().code, ErrorCode::InvalidRequest);
        assert!(store.sessions().unwrap().is_empty());
        assert_eq!(calendar.calls().create, 0);

        drop(extractor);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_message_is_rejected_before_queueing() {
        let (extractor, _worker, store, _) = extractor();
        let messages: [&[u8]; 3] = [b"", br#"{"action":"saveSessions""#, br#"{"action":"rename"}"#];
        for message in messages {
            let err = extractor.dispatch_message(message).await.unwrap_err();
            assert!(matches!(err, SyncError::Protocol(_)));
            assert_eq!(err.code(), ErrorCode::InvalidRequest);
        }
        assert!(store.sessions().unwrap().is_empty());
    }

    #[test]
    fn parse_json_rows() {
        let rows = parse_rows(r#"[["1", "Jan 5, 2025 3 PM", "Alice", "Calc", "x"]]"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][2], "Alice");
    }

    #[test]
    fn parse_tab_separated_rows() {
        let rows = parse_rows("1\tJan 5, 2025 3 PM\tAlice\tCalc\tx\n\n2\tJan 6\tBob\tPhys\ty\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "Jan 6");
        assert_eq!(rows[1].len(), 5);
    }

    #[test]
    fn parse_bad_json_rows() {
        assert!(parse_rows("[1, 2").is_err());
    }
}
