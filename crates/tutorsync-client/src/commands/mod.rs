//! Command implementations.

pub mod config;
pub mod normalize;
pub mod sessions;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use tutorsync_protocol::{Envelope, Response};
use tutorsync_providers::CalendarApi;
use tutorsync_providers::auth::CredentialCache;
use tutorsync_providers::google::GoogleCalendar;
use tutorsync_server::{Extractor, SessionStore, SyncConfig, SyncWorker, Synchronizer, wait_for};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Builds the Google Calendar client from the `[google]` settings.
pub fn google_calendar(config: &ClientConfig) -> ClientResult<Arc<dyn CalendarApi>> {
    let google = config.google.to_provider_config()?;
    let source = config.google.token_source(&google, &config.data_dir())?;
    debug!(source = source.name(), calendar = %google.calendar_id, "building calendar client");
    let credentials = Arc::new(CredentialCache::new(source));
    Ok(Arc::new(GoogleCalendar::new(google, credentials)?))
}

/// A running sync worker with its extractor, for the lifetime of one command.
pub struct SyncContext {
    pub store: Arc<SessionStore>,
    pub extractor: Extractor,
    results: broadcast::Receiver<Envelope<Response>>,
    worker: JoinHandle<()>,
}

impl SyncContext {
    pub fn start(
        calendar: Arc<dyn CalendarApi>,
        store: Arc<SessionStore>,
        sync_config: &SyncConfig,
    ) -> Self {
        let synchronizer = Arc::new(
            Synchronizer::new(calendar, store.clone(), sync_config.time_zone)
                .with_retry(sync_config.retry.clone()),
        );
        let (worker, handle) = SyncWorker::new(synchronizer, sync_config.queue_capacity);
        // Subscribe before anything is dispatched so no result is missed.
        let results = handle.subscribe();
        let worker = worker.spawn();

        Self {
            extractor: Extractor::new(store.clone(), handle),
            store,
            results,
            worker,
        }
    }

    /// Waits for the worker's answer to `request_id`.
    ///
    /// Error responses become [`ClientError::Request`].
    pub async fn wait(&mut self, request_id: &str) -> ClientResult<Response> {
        let response = wait_for(&mut self.results, request_id)
            .await
            .ok_or(ClientError::NoResponse)?;
        if let Some(error) = response.as_error() {
            return Err(ClientError::Request {
                description: error.code.description(),
                message: error.message.clone(),
            });
        }
        Ok(response)
    }

    /// Stops the worker once its queue is drained.
    pub async fn shutdown(self) {
        drop(self.extractor);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "sync worker task failed");
        }
    }
}

/// Prints `value` as pretty JSON.
pub(crate) fn print_json<T: Serialize>(value: &T) -> ClientResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
