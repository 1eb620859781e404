//! Background task that serializes sync requests.
//!
//! Requests are queued on an `mpsc` channel by [`SyncHandle`]s and handled
//! one at a time. Senders do not wait for the outcome; each processed
//! request publishes an [`Envelope<Response>`] on a broadcast result channel
//! instead.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tutorsync_core::SessionRecord;
use tutorsync_protocol::{Envelope, ErrorCode, Request, Response};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::sync::Synchronizer;

/// Default depth of the request queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Minimum number of responses kept for slow subscribers.
pub const RESULT_CHANNEL_CAPACITY: usize = 256;

/// A fresh request id.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Owns the synchronizer and drains the request queue.
pub struct SyncWorker {
    synchronizer: Arc<Synchronizer>,
    requests: mpsc::Receiver<Envelope<Request>>,
    results: broadcast::Sender<Envelope<Response>>,
}

impl SyncWorker {
    /// Creates a worker and the handle used to feed it.
    pub fn new(synchronizer: Arc<Synchronizer>, capacity: usize) -> (Self, SyncHandle) {
        let (request_tx, requests) = mpsc::channel(capacity.max(1));
        let (results, _) = broadcast::channel(capacity.max(RESULT_CHANNEL_CAPACITY));
        let handle = SyncHandle {
            request_tx,
            results: results.clone(),
        };
        (
            Self {
                synchronizer,
                requests,
                results,
            },
            handle,
        )
    }

    /// Starts the worker on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Handles requests until every [`SyncHandle`] is dropped.
    pub async fn run(mut self) {
        info!("sync worker started");
        while let Some(envelope) = self.requests.recv().await {
            let request_id = envelope.request_id.clone();
            let response = match envelope.ensure_compatible() {
                Ok(()) => {
                    debug!(
                        request_id = %request_id,
                        action = envelope.payload.action(),
                        "handling request"
                    );
                    self.synchronizer.handle(envelope.payload).await
                }
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "rejecting request");
                    Response::error(ErrorCode::InvalidRequest, e.to_string())
                }
            };

            match response.as_error() {
                Some(error) => warn!(
                    request_id = %request_id,
                    code = ?error.code,
                    message = %error.message,
                    "request failed"
                ),
                None => debug!(request_id = %request_id, "request done"),
            }

            // No subscribers is fine.
            let _ = self.results.send(Envelope::response(request_id, response));
        }
        info!("sync worker stopped");
    }
}

/// Cloneable sender side of a [`SyncWorker`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    request_tx: mpsc::Sender<Envelope<Request>>,
    results: broadcast::Sender<Envelope<Response>>,
}

impl SyncHandle {
    /// Queues a request and returns its id without waiting for the outcome.
    pub async fn dispatch(&self, request: Request) -> SyncResult<String> {
        let request_id = new_request_id();
        debug!(request_id = %request_id, action = request.action(), "dispatching");
        self.request_tx
            .send(Envelope::request(request_id.clone(), request))
            .await
            .map_err(|_| SyncError::WorkerStopped)?;
        Ok(request_id)
    }

    /// Queues an already-built envelope, e.g. one decoded from the wire.
    pub async fn dispatch_envelope(&self, envelope: Envelope<Request>) -> SyncResult<()> {
        self.request_tx
            .send(envelope)
            .await
            .map_err(|_| SyncError::WorkerStopped)
    }

    pub async fn save_sessions(&self, sessions: Vec<SessionRecord>) -> SyncResult<String> {
        self.dispatch(Request::save_sessions(sessions)).await
    }

    pub async fn delete_session(&self, session_id: impl Into<String>) -> SyncResult<String> {
        self.dispatch(Request::delete_session(session_id)).await
    }

    /// Receives results of requests processed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope<Response>> {
        self.results.subscribe()
    }
}

/// Waits for the result of one request on a subscribed receiver.
///
/// Returns `None` if the worker stops first, or if the receiver fell behind
/// and responses were dropped, since the awaited one may be among them.
pub async fn wait_for(
    results: &mut broadcast::Receiver<Envelope<Response>>,
    request_id: &str,
) -> Option<Response> {
    loop {
        match results.recv().await {
            Ok(envelope) if envelope.request_id == request_id => return Some(envelope.payload),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, request_id, "result channel lagged, response may be lost");
                return None;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SessionStore;
    use tutorsync_providers::memory::MemoryCalendar;

    fn worker() -> (SyncWorker, SyncHandle, Arc<MemoryCalendar>, Arc<SessionStore>) {
        let calendar = Arc::new(MemoryCalendar::new());
        let store = Arc::new(SessionStore::in_memory());
        let synchronizer = Arc::new(Synchronizer::new(
            calendar.clone(),
            store.clone(),
            chrono_tz::America::Chicago,
        ));
        let (worker, handle) = SyncWorker::new(synchronizer, 8);
        (worker, handle, calendar, store)
    }

    #[tokio::test]
    async fn results_are_published() {
        let (worker, handle, calendar, _) = worker();
        let mut results = handle.subscribe();
        let task = worker.spawn();

        let alice = SessionRecord::new("Jan 5, 2025 3:00 PM", "Alice", "Calculus");
        let save_id = handle.save_sessions(vec![alice.clone()]).await.unwrap();
        let delete_id = handle.delete_session("nope").await.unwrap();

        let saved = wait_for(&mut results, &save_id).await.unwrap();
        assert!(matches!(saved, Response::SessionsSynced { ref report } if report.created.len() == 1));

        let deleted = wait_for(&mut results, &delete_id).await.unwrap();
        assert_eq!(deleted.as_error().unwrap().code, ErrorCode::NotFound);
        assert_eq!(calendar.events().len(), 1);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn incompatible_envelope_is_rejected() {
        let (worker, handle, calendar, _) = worker();
        let mut results = handle.subscribe();
        let task = worker.spawn();

        let mut envelope = Envelope::request("req-x", Request::delete_session("s"));
        envelope.protocol_version = "99".to_string();
        handle.dispatch_envelope(envelope).await.unwrap();

        let response = wait_for(&mut results, "req-x").await.unwrap();
        assert_eq!(response.as_error().unwrap().code, ErrorCode::InvalidRequest);
        assert_eq!(calendar.calls().delete, 0);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn requests_are_handled_in_order() {
        let (worker, handle, calendar, store) = worker();
        let mut results = handle.subscribe();
        let task = worker.spawn();

        let alice = SessionRecord::new("Jan 5, 2025 3:00 PM", "Alice", "Calculus");
        store.append([alice.clone()]).unwrap();
        handle.save_sessions(vec![alice.clone()]).await.unwrap();
        let delete_id = handle.delete_session(alice.session_id()).await.unwrap();

        let deleted = wait_for(&mut results, &delete_id).await.unwrap();
        assert!(deleted.is_success());
        assert!(calendar.events().is_empty());
        assert!(store.sessions().unwrap().is_empty());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn lagged_receiver_stops_waiting() {
        let (tx, mut rx) = broadcast::channel(1);
        for id in ["req-1", "req-2", "req-3"] {
            tx.send(Envelope::response(id, Response::error(ErrorCode::NotFound, "gone")))
                .unwrap();
        }

        // req-1 was overwritten; waiting must not block forever.
        assert!(wait_for(&mut rx, "req-1").await.is_none());
        drop(tx);
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(new_request_id(), new_request_id());
    }

    #[tokio::test]
    async fn dispatch_fails_once_worker_is_gone() {
        let (worker, handle, _, _) = worker();
        drop(worker);
        let err = handle.delete_session("s").await.unwrap_err();
        assert!(matches!(err, SyncError::WorkerStopped));
    }
}
