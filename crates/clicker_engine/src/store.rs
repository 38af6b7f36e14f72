use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use clicker_core::{StatePatch, TabId, TabScanState};
use clicker_logging::{clicker_debug, clicker_warn};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::lock;
use crate::mirror::{mirror_key, SessionMirror};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Why a status push did not reach an observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Nobody is listening (e.g. the popup is closed). Expected, not a fault.
    #[error("no receiver")]
    NoReceiver,
    #[error("status dispatch failed: {0}")]
    Failed(String),
}

/// Observer of tab state transitions outside the process (e.g. the popup).
pub trait StatusListener: Send + Sync {
    fn notify(&self, state: &TabScanState) -> Result<(), NotifyError>;
}

/// Browser tab lifecycle notifications that invalidate a tab's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabEvent {
    NavigationStarted(TabId),
    Closed(TabId),
}

impl TabEvent {
    pub fn tab_id(self) -> TabId {
        match self {
            TabEvent::NavigationStarted(tab_id) | TabEvent::Closed(tab_id) => tab_id,
        }
    }
}

/// Authoritative per-tab scan state, mirrored to session storage.
///
/// Only this store mutates tab states; everything else reads through [`get`]
/// or requests changes through [`set`] and [`clear`].
///
/// [`get`]: TabStateStore::get
/// [`set`]: TabStateStore::set
/// [`clear`]: TabStateStore::clear
pub struct TabStateStore {
    entries: Mutex<HashMap<TabId, TabScanState>>,
    mirror: Arc<dyn SessionMirror>,
    listeners: Mutex<Vec<Arc<dyn StatusListener>>>,
    updates: broadcast::Sender<TabScanState>,
}

impl TabStateStore {
    pub fn new(mirror: Arc<dyn SessionMirror>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            mirror,
            listeners: Mutex::new(Vec::new()),
            updates,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) {
        lock(&self.listeners).push(listener);
    }

    /// In-process stream of every state written by [`TabStateStore::set`].
    pub fn subscribe(&self) -> broadcast::Receiver<TabScanState> {
        self.updates.subscribe()
    }

    /// Current state of `tab_id`, or Idle (seeded with `url`) if none is known.
    ///
    /// A memory miss falls back to the session mirror once; a mirror failure
    /// is logged and treated as absence. A mirrored state recorded for a
    /// different page than `url` is discarded.
    pub async fn get(&self, tab_id: TabId, url: Option<&str>) -> TabScanState {
        let cached = lock(&self.entries).get(&tab_id).cloned();
        if let Some(state) = cached {
            return state;
        }

        match self.mirror.load(&mirror_key(tab_id)).await {
            Ok(Some(restored)) if !same_page(restored.url.as_deref(), url) => {
                clicker_debug!("Discarding mirrored state of tab {} for another page", tab_id);
                if let Err(err) = self.mirror.remove(&mirror_key(tab_id)).await {
                    clicker_warn!("Failed to remove mirrored state for tab {}: {}", tab_id, err);
                }
                TabScanState::idle(tab_id, url.map(ToOwned::to_owned))
            }
            Ok(Some(restored)) => {
                clicker_debug!("Restored tab {} state from session mirror", tab_id);
                // A transition may have landed while the mirror was read; it wins.
                lock(&self.entries)
                    .entry(tab_id)
                    .or_insert(restored)
                    .clone()
            }
            Ok(None) => TabScanState::idle(tab_id, url.map(ToOwned::to_owned)),
            Err(err) => {
                clicker_warn!("Failed to read mirrored state for tab {}: {}", tab_id, err);
                TabScanState::idle(tab_id, url.map(ToOwned::to_owned))
            }
        }
    }

    /// Merges `patch` onto the current (or default) state, stores the result,
    /// mirrors it and notifies observers. Returns the merged state.
    pub async fn set(&self, tab_id: TabId, patch: StatePatch) -> TabScanState {
        let merged = {
            let mut entries = lock(&self.entries);
            let current = entries
                .get(&tab_id)
                .cloned()
                .unwrap_or_else(|| TabScanState::idle(tab_id, None));
            let merged = current.merged(&patch);
            entries.insert(tab_id, merged.clone());
            merged
        };

        if let Err(err) = self.mirror.store(&mirror_key(tab_id), &merged).await {
            clicker_warn!("Failed to mirror state for tab {}: {}", tab_id, err);
        }

        self.broadcast(&merged);
        merged
    }

    /// Forgets `tab_id` in memory and in the mirror. Clearing an unknown tab
    /// is a no-op.
    pub async fn clear(&self, tab_id: TabId) {
        lock(&self.entries).remove(&tab_id);
        if let Err(err) = self.mirror.remove(&mirror_key(tab_id)).await {
            clicker_warn!("Failed to remove mirrored state for tab {}: {}", tab_id, err);
        }
    }

    /// A reloaded or closed tab must never inherit a stale terminal status.
    pub async fn handle_tab_event(&self, event: TabEvent) {
        clicker_debug!("Tab event {:?}, clearing state", event);
        self.clear(event.tab_id()).await;
    }

    fn broadcast(&self, state: &TabScanState) {
        // An error here only means there are no in-process subscribers.
        let _ = self.updates.send(state.clone());

        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            match listener.notify(state) {
                Ok(()) | Err(NotifyError::NoReceiver) => {}
                Err(err) => clicker_warn!("Status update for tab {} not delivered: {}", state.tab_id, err),
            }
        }
    }
}

fn same_page(recorded: Option<&str>, requested: Option<&str>) -> bool {
    match (recorded, requested) {
        (Some(recorded), Some(requested)) => recorded == requested,
        _ => true,
    }
}
