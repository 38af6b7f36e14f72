use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use clicker_core::{
    update, ErrorKind, ErrorPayload, ScanEffect, ScanMachine, ScanMsg, ScanOutcome, TabId,
    GENERIC_FAILURE_MESSAGE,
};
use clicker_logging::{clicker_error, clicker_info, clicker_warn};
use futures_util::FutureExt;

use crate::analytics::AnalyticsSink;
use crate::gateway::SelectorSource;
use crate::lock;
use crate::page::PageBridge;
use crate::store::TabStateStore;

/// Drives one scan per tab through extract, analyze and click, executing the
/// effects of the pure scan state machine.
///
/// Every collaborator call is isolated: an error or panic is classified and
/// ends the scan in an Error state instead of escaping.
pub struct ScanOrchestrator {
    store: Arc<TabStateStore>,
    page: Arc<dyn PageBridge>,
    selectors: Arc<dyn SelectorSource>,
    analytics: Arc<dyn AnalyticsSink>,
    snippet_chars: usize,
    active: Mutex<HashSet<TabId>>,
}

/// Releases the per-tab slot when a scan ends, however it ends.
struct ActiveScan<'a> {
    active: &'a Mutex<HashSet<TabId>>,
    tab_id: TabId,
}

impl Drop for ActiveScan<'_> {
    fn drop(&mut self) {
        lock(self.active).remove(&self.tab_id);
    }
}

impl ScanOrchestrator {
    pub fn new(
        store: Arc<TabStateStore>,
        page: Arc<dyn PageBridge>,
        selectors: Arc<dyn SelectorSource>,
        analytics: Arc<dyn AnalyticsSink>,
        snippet_chars: usize,
    ) -> Self {
        Self {
            store,
            page,
            selectors,
            analytics,
            snippet_chars,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Runs a full scan of `tab_id`. Returns `None` without touching any state
    /// when a scan of the same tab is already running.
    pub async fn execute(&self, tab_id: TabId, url: &str) -> Option<ScanOutcome> {
        let Some(_slot) = self.claim(tab_id) else {
            clicker_info!("Scan already running for tab {}, ignoring request", tab_id);
            return None;
        };
        clicker_info!("Starting scan of tab {} ({})", tab_id, url);

        let mut machine = ScanMachine::new(tab_id, url).with_snippet_limit(self.snippet_chars);
        let mut inbox = VecDeque::from([ScanMsg::Start]);
        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update(machine, msg);
            machine = next;
            for effect in effects {
                if let Some(reply) = self.run_effect(tab_id, effect).await {
                    inbox.push_back(reply);
                }
            }
        }

        let outcome = machine.outcome().cloned().unwrap_or_else(|| {
            clicker_error!("Scan of tab {} stopped without an outcome", tab_id);
            ScanOutcome::Failed(ErrorPayload::new(
                ErrorKind::GenericAnalysisError,
                GENERIC_FAILURE_MESSAGE,
            ))
        });
        clicker_info!("Scan of tab {} finished: {:?}", tab_id, outcome.status());
        Some(outcome)
    }

    fn claim(&self, tab_id: TabId) -> Option<ActiveScan<'_>> {
        if !lock(&self.active).insert(tab_id) {
            return None;
        }
        Some(ActiveScan {
            active: &self.active,
            tab_id,
        })
    }

    async fn run_effect(&self, tab_id: TabId, effect: ScanEffect) -> Option<ScanMsg> {
        match effect {
            ScanEffect::Publish(patch) => {
                self.store.set(tab_id, patch).await;
                None
            }
            ScanEffect::ExtractHtml => Some(match guarded(self.page.extract_html(tab_id)).await {
                Ok(Ok(html)) => ScanMsg::HtmlExtracted(html),
                Ok(Err(err)) => {
                    clicker_warn!("Could not read markup of tab {}: {}", tab_id, err);
                    ScanMsg::HtmlExtracted(None)
                }
                Err(detail) => ScanMsg::Fault(detail),
            }),
            ScanEffect::Analyze { html } => {
                Some(match guarded(self.selectors.find_accept_selector(&html)).await {
                    Ok(result) => ScanMsg::AnalysisFinished(result.map_err(ErrorPayload::from)),
                    Err(detail) => ScanMsg::Fault(detail),
                })
            }
            ScanEffect::Click { selector } => {
                Some(match guarded(self.page.click(tab_id, &selector)).await {
                    Ok(Ok(report)) => ScanMsg::ClickFinished(report),
                    Ok(Err(err)) => {
                        clicker_warn!("Click on tab {} failed: {}", tab_id, err);
                        ScanMsg::Fault(err.to_string())
                    }
                    Err(detail) => ScanMsg::Fault(detail),
                })
            }
            ScanEffect::Record(record) => {
                if let Err(detail) = guarded(self.analytics.submit(record)).await {
                    clicker_warn!("Analytics sink panicked: {}", detail);
                }
                None
            }
        }
    }
}

/// Awaits `future`, turning a panic into its message.
pub(crate) async fn guarded<F: Future>(future: F) -> Result<F::Output, String> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| {
            let detail = panic_message(payload.as_ref());
            clicker_error!("Collaborator panicked: {}", detail);
            detail
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
