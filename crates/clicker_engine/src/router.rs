use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use clicker_core::{ErrorPayload, Settings, TabId, TabScanState};
use clicker_logging::{clicker_debug, clicker_error, clicker_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::PageError;
use crate::gateway::AnalysisGateway;
use crate::orchestrator::{guarded, ScanOrchestrator};
use crate::persist::PersistError;
use crate::settings_store::SettingsStore;
use crate::store::TabStateStore;

/// One-way requests. The sender gets no payload back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartScan,
    OpenSettings,
    SaveSettings(Settings),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::StartScan => "start_scan",
            Command::OpenSettings => "open_settings",
            Command::SaveSettings(_) => "save_settings",
        }
    }
}

/// Two-way requests, answered through a deferred [`Reply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Status of the sender tab, or of the active tab when the sender is not
    /// a tab (e.g. the popup).
    GetStatus { sender_tab: Option<TabId> },
    TestCredential { candidate: String },
}

impl Query {
    fn name(&self) -> &'static str {
        match self {
            Query::GetStatus { .. } => "get_status",
            Query::TestCredential { .. } => "test_credential",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Command(Command),
    Query(Query),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Status {
        state: TabScanState,
    },
    NoActiveTab,
    CredentialCheck {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
}

/// How a request was taken in.
#[derive(Debug)]
pub enum Dispatch {
    /// A command is running; the handle completes when it is done.
    Accepted(JoinHandle<()>),
    /// A query is running; its reply arrives on the receiver. A dropped sender
    /// means the handler failed.
    Deferred(oneshot::Receiver<Reply>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTab {
    pub id: TabId,
    pub url: String,
}

/// Lookup of the focused tab of the focused window.
#[async_trait]
pub trait TabDirectory: Send + Sync {
    async fn active_tab(&self) -> Result<Option<ActiveTab>, PageError>;
}

#[async_trait]
pub trait SettingsPage: Send + Sync {
    async fn open(&self) -> Result<(), PageError>;
}

#[derive(Debug, Error)]
enum HandlerError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("no active tab")]
    NoActiveTab,
    #[error("reply receiver dropped")]
    ReplyDropped,
}

/// Boundary adapter between the extension's messages and the engine.
#[derive(Clone)]
pub struct MessageRouter {
    store: Arc<TabStateStore>,
    orchestrator: Arc<ScanOrchestrator>,
    gateway: Arc<AnalysisGateway>,
    settings: Arc<dyn SettingsStore>,
    tabs: Arc<dyn TabDirectory>,
    settings_page: Arc<dyn SettingsPage>,
}

impl MessageRouter {
    pub fn new(
        store: Arc<TabStateStore>,
        orchestrator: Arc<ScanOrchestrator>,
        gateway: Arc<AnalysisGateway>,
        settings: Arc<dyn SettingsStore>,
        tabs: Arc<dyn TabDirectory>,
        settings_page: Arc<dyn SettingsPage>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            gateway,
            settings,
            tabs,
            settings_page,
        }
    }

    /// Spawns the handler for `request` on the current runtime.
    pub fn dispatch(&self, request: Request) -> Dispatch {
        match request {
            Request::Command(command) => {
                let router = self.clone();
                let name = command.name();
                Dispatch::Accepted(spawn_handler(name, async move {
                    router.run_command(command).await
                }))
            }
            Request::Query(query) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                let router = self.clone();
                let name = query.name();
                spawn_handler(name, async move {
                    let reply = router.answer(query).await?;
                    reply_tx.send(reply).map_err(|_| HandlerError::ReplyDropped)
                });
                Dispatch::Deferred(reply_rx)
            }
        }
    }

    async fn run_command(&self, command: Command) -> Result<(), HandlerError> {
        match command {
            Command::StartScan => {
                let tab = self.tabs.active_tab().await?.ok_or(HandlerError::NoActiveTab)?;
                self.orchestrator.execute(tab.id, &tab.url).await;
                Ok(())
            }
            Command::OpenSettings => Ok(self.settings_page.open().await?),
            Command::SaveSettings(settings) => Ok(self.settings.save(settings).await?),
        }
    }

    async fn answer(&self, query: Query) -> Result<Reply, HandlerError> {
        match query {
            Query::GetStatus {
                sender_tab: Some(tab_id),
            } => Ok(Reply::Status {
                state: self.store.get(tab_id, None).await,
            }),
            Query::GetStatus { sender_tab: None } => match self.tabs.active_tab().await? {
                Some(tab) => Ok(Reply::Status {
                    state: self.store.get(tab.id, Some(&tab.url)).await,
                }),
                None => Ok(Reply::NoActiveTab),
            },
            Query::TestCredential { candidate } => {
                let reply = match self.gateway.test_credential(&candidate).await {
                    Ok(()) => Reply::CredentialCheck {
                        ok: true,
                        error: None,
                    },
                    Err(err) => Reply::CredentialCheck {
                        ok: false,
                        error: Some(err.to_payload()),
                    },
                };
                Ok(reply)
            }
        }
    }
}

fn spawn_handler<F>(name: &'static str, handler: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    tokio::spawn(async move {
        match guarded(handler).await {
            Ok(Ok(())) => clicker_debug!("Handled {}", name),
            Ok(Err(err)) => clicker_warn!("Handler {} failed: {}", name, err),
            Err(detail) => clicker_error!("Handler {} panicked: {}", name, detail),
        }
    })
}
