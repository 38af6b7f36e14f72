use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use clicker_core::{TabId, TabScanState};
use clicker_logging::{clicker_debug, clicker_info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lock;
use crate::persist::{ensure_storage_dir, AtomicFileWriter, PersistError};

const MAX_SESSION_ID_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("corrupt mirror entry {key}: {message}")]
    Corrupt { key: String, message: String },
    #[error("invalid session id {0:?}")]
    InvalidSession(String),
}

/// Key under which a tab's state is mirrored.
pub fn mirror_key(tab_id: TabId) -> String {
    format!("tab_status_{tab_id}")
}

/// Session-scoped durable copy of tab states, so a restarted host or a newly
/// opened popup does not start from a blank slate.
#[async_trait]
pub trait SessionMirror: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<TabScanState>, MirrorError>;
    async fn store(&self, key: &str, state: &TabScanState) -> Result<(), MirrorError>;
    async fn remove(&self, key: &str) -> Result<(), MirrorError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionMirror {
    entries: Mutex<HashMap<String, TabScanState>>,
}

impl MemorySessionMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self, key: &str) -> Option<TabScanState> {
        lock(&self.entries).get(key).cloned()
    }
}

#[async_trait]
impl SessionMirror for MemorySessionMirror {
    async fn load(&self, key: &str) -> Result<Option<TabScanState>, MirrorError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    async fn store(&self, key: &str, state: &TabScanState) -> Result<(), MirrorError> {
        lock(&self.entries).insert(key.to_string(), state.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), MirrorError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MirrorEntry {
    saved_at: u64,
    state: TabScanState,
}

/// One JSON file per key under `root/<session id>/`.
///
/// Nothing is read or written until [`FileSessionMirror::begin_session`]
/// names the browser session. Starting a session deletes the folders of
/// every other session. Entries older than `ttl` read as absent.
#[derive(Debug)]
pub struct FileSessionMirror {
    root: PathBuf,
    ttl: Duration,
    session: Mutex<Option<AtomicFileWriter>>,
}

impl FileSessionMirror {
    pub fn new(root: PathBuf, ttl: Duration) -> Self {
        Self {
            root,
            ttl,
            session: Mutex::new(None),
        }
    }

    /// Scopes the mirror to `session_id` and removes what earlier browser
    /// sessions left behind.
    pub fn begin_session(&self, session_id: &str) -> Result<(), MirrorError> {
        if !is_valid_session_id(session_id) {
            return Err(MirrorError::InvalidSession(session_id.to_string()));
        }
        ensure_storage_dir(&self.root)?;
        let entries = fs::read_dir(&self.root).map_err(PersistError::from)?;
        for entry in entries {
            let entry = entry.map_err(PersistError::from)?;
            if entry.file_name() == session_id {
                continue;
            }
            clicker_info!("Discarding tab states of session {:?}", entry.file_name());
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(PersistError::from)?;
        }

        let dir = self.root.join(session_id);
        ensure_storage_dir(&dir)?;
        *lock(&self.session) = Some(AtomicFileWriter::new(dir));
        Ok(())
    }

    fn writer(&self) -> Option<AtomicFileWriter> {
        lock(&self.session).clone()
    }

    fn filename(key: &str) -> String {
        format!("{key}.json")
    }
}

fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl SessionMirror for FileSessionMirror {
    async fn load(&self, key: &str) -> Result<Option<TabScanState>, MirrorError> {
        let Some(writer) = self.writer() else {
            return Ok(None);
        };
        let Some(content) = writer.read(&Self::filename(key))? else {
            return Ok(None);
        };
        let entry: MirrorEntry =
            serde_json::from_str(&content).map_err(|err| MirrorError::Corrupt {
                key: key.to_string(),
                message: err.to_string(),
            })?;
        let age = now_secs().saturating_sub(entry.saved_at);
        if age > self.ttl.as_secs() {
            return Ok(None);
        }
        Ok(Some(entry.state))
    }

    async fn store(&self, key: &str, state: &TabScanState) -> Result<(), MirrorError> {
        let Some(writer) = self.writer() else {
            clicker_debug!("No browser session yet, not mirroring {}", key);
            return Ok(());
        };
        let entry = MirrorEntry {
            saved_at: now_secs(),
            state: state.clone(),
        };
        let content = serde_json::to_string(&entry)
            .map_err(|err| PersistError::Serialize(err.to_string()))?;
        writer.write(&Self::filename(key), &content)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), MirrorError> {
        if let Some(writer) = self.writer() {
            writer.remove(&Self::filename(key))?;
        }
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
