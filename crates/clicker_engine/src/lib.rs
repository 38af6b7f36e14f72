//! Clicker engine: IO around the pure scan core.
//!
//! Holds the tab state store, credential handling, the remote analysis
//! gateway, page access and the message router. Everything outside the process
//! is reached through a trait so tests can substitute it.
use std::sync::{Mutex, MutexGuard};

mod analytics;
mod client;
mod config;
mod config_source;
mod credentials;
mod engine;
mod error;
mod gateway;
mod mirror;
mod orchestrator;
mod page;
mod persist;
mod router;
mod settings_store;
mod store;

pub use analytics::{utc_clock, AnalyticsSink, Clock, HttpAnalyticsSink};
pub use client::{
    AnalysisClient, ClientFactory, CompletionRequest, OpenAiClient, OpenAiClientFactory,
};
pub use config::EngineConfig;
pub use config_source::{ConfigSource, HttpConfigSource};
pub use credentials::CredentialCache;
pub use engine::{Collaborators, Engine, EngineError, RemoteServices};
pub use error::{
    ClientError, ConfigError, PageError, ScanError, CONSENT_REQUIRED_MESSAGE,
    MALFORMED_KEY_MESSAGE, MISSING_KEY_MESSAGE, REJECTED_KEY_MESSAGE,
    SERVICE_UNAVAILABLE_MESSAGE,
};
pub use gateway::{parse_selector_reply, AnalysisGateway, SelectorSource};
pub use mirror::{mirror_key, FileSessionMirror, MemorySessionMirror, MirrorError, SessionMirror};
pub use orchestrator::ScanOrchestrator;
pub use page::{PageBridge, PageScript, ScriptHost, ScriptedPage};
pub use persist::{ensure_storage_dir, AtomicFileWriter, PersistError};
pub use router::{
    ActiveTab, Command, Dispatch, MessageRouter, Query, Reply, Request, SettingsPage,
    TabDirectory,
};
pub use settings_store::{MemorySettingsStore, SettingsObserver, SettingsObservers, SettingsStore};
pub use store::{NotifyError, StatusListener, TabEvent, TabStateStore};

/// Locks `mutex`, recovering the data if a previous holder panicked. Guards
/// never live across an `.await`.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
