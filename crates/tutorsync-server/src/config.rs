//! Synchronizer configuration.

use std::path::PathBuf;

use chrono_tz::Tz;
use tutorsync_core::{DateParseError, parse_time_zone};

use crate::retry::RetryPolicy;
use crate::worker::DEFAULT_QUEUE_CAPACITY;

/// Runtime settings for the store, synchronizer and worker.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding `sessions.json` and `event_ids.json`.
    pub data_dir: PathBuf,
    /// Zone that session dates are written in.
    pub time_zone: Tz,
    pub retry: RetryPolicy,
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            time_zone: chrono_tz::America::Chicago,
            retry: RetryPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl SyncConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_time_zone(mut self, name: &str) -> Result<Self, DateParseError> {
        self.time_zone = parse_time_zone(name)?;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// Returns the default data directory.
///
/// Uses `$XDG_DATA_HOME/tutorsync` if set, otherwise
/// `$HOME/.local/share/tutorsync`, otherwise `./tutorsync`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME")
        && !data_home.is_empty()
    {
        return PathBuf::from(data_home).join("tutorsync");
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/share/tutorsync"),
        Err(_) => PathBuf::from("tutorsync"),
    }
}
