//! Persisted session list and session-to-event links.
//!
//! [`SessionStore`] keeps two JSON values in a key-value [`StoreBackend`]:
//!
//! - `sessions`: the ordered list of [`SessionRecord`]s, unique by
//!   `(date, student, course)`
//! - `event_ids`: map from session id to calendar event id
//!
//! Every read-modify-write holds the store lock, so concurrent callers never
//! interleave their updates.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use tutorsync_core::SessionRecord;

use crate::error::{StoreError, StoreResult};

/// Key holding the session list.
pub const SESSIONS_KEY: &str = "sessions";

/// Key holding the session id to event id map.
pub const EVENT_LINKS_KEY: &str = "event_ids";

/// Session id to calendar event id.
pub type EventLinks = BTreeMap<String, String>;

/// Raw string storage addressed by key.
pub trait StoreBackend: Send + Sync {
    fn read(&self, key: &str) -> StoreResult<Option<String>>;

    fn write(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// One `<key>.json` file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl StoreBackend for FileBackend {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, value).map_err(|e| StoreError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| StoreError::io(&path, e))?;
        debug!(path = %path.display(), bytes = value.len(), "wrote store file");
        Ok(())
    }
}

/// Backend kept in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to the persisted session list and event links.
pub struct SessionStore {
    backend: Box<dyn StoreBackend>,
    lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            lock: Mutex::new(()),
        }
    }

    /// A store writing into `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(dir))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> StoreResult<T> {
        match self.backend.read(key)? {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                })
            }
            _ => Ok(T::default()),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.backend.write(key, &raw)
    }

    /// The persisted session list.
    pub fn sessions(&self) -> StoreResult<Vec<SessionRecord>> {
        let _guard = self.guard();
        self.load(SESSIONS_KEY)
    }

    /// Replaces the session list.
    pub fn set_sessions(&self, sessions: &[SessionRecord]) -> StoreResult<()> {
        let _guard = self.guard();
        self.save(SESSIONS_KEY, &sessions)
    }

    /// Appends sessions not already present, matching on
    /// `(date, student, course)`. Returns how many were added.
    ///
    /// Records are stored with their derived id filled in.
    pub fn append(&self, records: impl IntoIterator<Item = SessionRecord>) -> StoreResult<usize> {
        let _guard = self.guard();
        let mut sessions: Vec<SessionRecord> = self.load(SESSIONS_KEY)?;

        let mut seen: HashSet<String> = sessions.iter().map(SessionRecord::session_id).collect();
        let mut added = 0;
        for record in records {
            let record = record.with_derived_id();
            if seen.insert(record.session_id())
                && !sessions.iter().any(|s| s.same_session(&record))
            {
                sessions.push(record);
                added += 1;
            }
        }

        if added > 0 {
            self.save(SESSIONS_KEY, &sessions)?;
            info!(added, total = sessions.len(), "persisted new sessions");
        }
        Ok(added)
    }

    /// Removes a session and its event link. Returns the removed record.
    ///
    /// The link is written first. If writing the session list then fails,
    /// the link is put back so both keys stay as they were.
    pub fn remove(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let _guard = self.guard();

        let mut sessions: Vec<SessionRecord> = self.load(SESSIONS_KEY)?;
        let original_links: EventLinks = self.load(EVENT_LINKS_KEY)?;

        let mut links = original_links.clone();
        let unlinked = links.remove(session_id).is_some();
        if unlinked {
            self.save(EVENT_LINKS_KEY, &links)?;
        }

        let removed = sessions
            .iter()
            .position(|s| s.session_id() == session_id)
            .map(|index| sessions.remove(index));
        if removed.is_some()
            && let Err(e) = self.save(SESSIONS_KEY, &sessions)
        {
            if unlinked && let Err(restore) = self.save(EVENT_LINKS_KEY, &original_links) {
                error!(session_id, error = %restore, "failed to restore event link");
            }
            return Err(e);
        }

        Ok(removed)
    }

    /// The event id recorded for a session.
    pub fn event_id(&self, session_id: &str) -> StoreResult<Option<String>> {
        let _guard = self.guard();
        let links: EventLinks = self.load(EVENT_LINKS_KEY)?;
        Ok(links.get(session_id).cloned())
    }

    pub fn event_links(&self) -> StoreResult<EventLinks> {
        let _guard = self.guard();
        self.load(EVENT_LINKS_KEY)
    }

    /// Records event ids for sessions, replacing earlier ones.
    pub fn link_events(
        &self,
        links: impl IntoIterator<Item = (String, String)>,
    ) -> StoreResult<usize> {
        let _guard = self.guard();
        let mut current: EventLinks = self.load(EVENT_LINKS_KEY)?;

        let mut changed = 0;
        for (session_id, event_id) in links {
            if current.get(&session_id) != Some(&event_id) {
                current.insert(session_id, event_id);
                changed += 1;
            }
        }
        if changed > 0 {
            self.save(EVENT_LINKS_KEY, &current)?;
        }
        Ok(changed)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
