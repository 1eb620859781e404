//! Session store, synchronizer and sync worker.
//!
//! - [`SessionStore`]: persisted session list and session-to-event links
//! - [`Synchronizer`]: creates missing events, deletes cancelled ones
//! - [`SyncWorker`] / [`SyncHandle`]: request queue with a result channel
//! - [`Extractor`]: scraped rows or raw page messages in, deduplicated sessions
//!   and requests out
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tutorsync_providers::memory::MemoryCalendar;
//! use tutorsync_server::{Extractor, SessionStore, SyncWorker, Synchronizer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SessionStore::in_memory());
//! let calendar = Arc::new(MemoryCalendar::new());
//! let synchronizer = Arc::new(Synchronizer::new(
//!     calendar,
//!     store.clone(),
//!     chrono_tz::America::Chicago,
//! ));
//! let (worker, handle) = SyncWorker::new(synchronizer, 16);
//! worker.spawn();
//!
//! let extractor = Extractor::new(store, handle);
//! let row: Vec<String> = ["7", "Jan. 5, 2025 3 p.m.", "Alice", "Calculus", ""]
//!     .map(String::from)
//!     .to_vec();
//! extractor.ingest_rows(&[row]).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod extractor;
mod retry;
mod store;
mod sync;
mod worker;

pub use config::{SyncConfig, default_data_dir};
pub use error::{StoreError, StoreResult, SyncError, SyncResult};
pub use extractor::{Extractor, IngestSummary, parse_rows};
pub use retry::RetryPolicy;
pub use store::{
    EVENT_LINKS_KEY, EventLinks, FileBackend, MemoryBackend, SESSIONS_KEY, SessionStore,
    StoreBackend,
};
pub use sync::Synchronizer;
pub use worker::{
    DEFAULT_QUEUE_CAPACITY, RESULT_CHANNEL_CAPACITY, SyncHandle, SyncWorker, new_request_id,
    wait_for,
};
