use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use clicker_core::{TabId, TabScanState};
use clicker_engine::{
    ActiveTab, NotifyError, PageError, PageScript, ScriptHost, SettingsPage, StatusListener,
    TabDirectory,
};
use clicker_logging::{clicker_debug, clicker_warn};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::protocol::{CallId, Outgoing, PageCall};

type PendingCall = oneshot::Sender<Result<Value, PageError>>;

/// The extension side of the engine: page scripts, tab lookup, the options
/// page and status pushes all travel as frames on the outgoing queue.
///
/// Each page call waits for the `call_result` frame carrying its id, or for
/// the call timeout, whichever comes first.
pub struct ExtensionBridge {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    pending: Mutex<HashMap<CallId, PendingCall>>,
    next_call: AtomicU64,
    call_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TabInfo {
    id: TabId,
    url: String,
}

impl ExtensionBridge {
    pub fn new(outgoing: mpsc::UnboundedSender<Outgoing>, call_timeout: Duration) -> Self {
        Self {
            outgoing,
            pending: Mutex::new(HashMap::new()),
            next_call: AtomicU64::new(1),
            call_timeout,
        }
    }

    /// Hands the result of `call_id` to its waiting caller. Late results for
    /// calls that already timed out are dropped.
    pub fn complete(&self, call_id: CallId, result: Result<Value, String>) {
        let Some(waiter) = self.pending().remove(&call_id) else {
            clicker_debug!("Dropping result of unknown or expired call {}", call_id);
            return;
        };
        // The caller may have given up in the meantime.
        let _ = waiter.send(result.map_err(PageError::Script));
    }

    /// Fails every outstanding call; used when the extension goes away.
    pub fn disconnect(&self) {
        let dropped = std::mem::take(&mut *self.pending());
        if !dropped.is_empty() {
            clicker_warn!("Extension disconnected with {} calls in flight", dropped.len());
        }
    }

    async fn call(&self, request: PageCall) -> Result<Value, PageError> {
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let (waiter, result) = oneshot::channel();
        self.pending().insert(call_id, waiter);

        if self.outgoing.send(Outgoing::Call { call_id, request }).is_err() {
            self.pending().remove(&call_id);
            return Err(PageError::Disconnected);
        }

        match tokio::time::timeout(self.call_timeout, result).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PageError::Disconnected),
            Err(_) => {
                self.pending().remove(&call_id);
                clicker_warn!("Page call {} timed out", call_id);
                Err(PageError::Timeout)
            }
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<CallId, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ScriptHost for ExtensionBridge {
    async fn run_script(
        &self,
        tab_id: TabId,
        script: PageScript,
        args: Value,
    ) -> Result<Value, PageError> {
        let request = match script {
            PageScript::ExtractHtml => PageCall::ExtractHtml {
                tab_id,
                source: script.source(),
            },
            _ => PageCall::RunScript {
                tab_id,
                name: script.name(),
                source: script.source(),
                args,
            },
        };
        self.call(request).await
    }
}

#[async_trait]
impl TabDirectory for ExtensionBridge {
    async fn active_tab(&self) -> Result<Option<ActiveTab>, PageError> {
        let value = self.call(PageCall::ActiveTab).await?;
        let tab: Option<TabInfo> =
            serde_json::from_value(value).map_err(|err| PageError::Malformed(err.to_string()))?;
        Ok(tab.map(|tab| ActiveTab {
            id: tab.id,
            url: tab.url,
        }))
    }
}

#[async_trait]
impl SettingsPage for ExtensionBridge {
    async fn open(&self) -> Result<(), PageError> {
        self.call(PageCall::OpenOptionsPage).await.map(|_| ())
    }
}

impl StatusListener for ExtensionBridge {
    fn notify(&self, state: &TabScanState) -> Result<(), NotifyError> {
        self.outgoing
            .send(Outgoing::StatusUpdate {
                state: state.clone(),
            })
            .map_err(|_| NotifyError::NoReceiver)
    }
}
