#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use clicker_core::{AnalyticsRecord, ClickReport, Settings, TabId};
use clicker_engine::{
    ActiveTab, AnalysisClient, AnalyticsSink, ClientError, ClientFactory, Collaborators,
    CompletionRequest, ConfigError, ConfigSource, Engine, EngineConfig, MemorySessionMirror,
    MemorySettingsStore, PageBridge, PageError, RemoteServices, ScanError, SelectorSource,
    SettingsPage, TabDirectory,
};
use tokio::sync::Notify;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(clicker_logging::initialize_for_tests);
}

/// Page with canned markup and click results.
pub struct FakePage {
    pub html: Mutex<Result<Option<String>, PageError>>,
    pub click: Mutex<Result<ClickReport, PageError>>,
    pub extract_calls: AtomicUsize,
    pub click_calls: AtomicUsize,
    /// When set, extraction waits for a notification before answering.
    pub gate: Option<Arc<Notify>>,
}

impl FakePage {
    pub fn with_html(html: &str) -> Self {
        Self {
            html: Mutex::new(Ok(Some(html.to_string()))),
            click: Mutex::new(Ok(ClickReport::clicked())),
            extract_calls: AtomicUsize::new(0),
            click_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn without_markup() -> Self {
        let page = Self::with_html("");
        *page.html.lock().unwrap() = Ok(None);
        page
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn click_calls(&self) -> usize {
        self.click_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageBridge for FakePage {
    async fn extract_html(&self, _tab_id: TabId) -> Result<Option<String>, PageError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.html.lock().unwrap().clone()
    }

    async fn click(&self, _tab_id: TabId, _selector: &str) -> Result<ClickReport, PageError> {
        self.click_calls.fetch_add(1, Ordering::SeqCst);
        self.click.lock().unwrap().clone()
    }
}

pub enum SelectorBehavior {
    Reply(Result<Option<String>, ScanError>),
    Panic(&'static str),
}

pub struct FakeSelectors {
    behavior: SelectorBehavior,
    calls: AtomicUsize,
}

impl FakeSelectors {
    pub fn replying(reply: Result<Option<String>, ScanError>) -> Self {
        Self {
            behavior: SelectorBehavior::Reply(reply),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn panicking(message: &'static str) -> Self {
        Self {
            behavior: SelectorBehavior::Panic(message),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SelectorSource for FakeSelectors {
    async fn find_accept_selector(&self, _html: &str) -> Result<Option<String>, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            SelectorBehavior::Reply(reply) => reply.clone(),
            SelectorBehavior::Panic(message) => panic!("{}", message),
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<AnalyticsRecord>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<AnalyticsRecord> {
        self.records.lock().unwrap().drain(..).collect()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn submit(&self, record: AnalyticsRecord) {
        self.records.lock().unwrap().push(record);
    }
}

pub struct FixedTabs(pub Option<ActiveTab>);

#[async_trait]
impl TabDirectory for FixedTabs {
    async fn active_tab(&self) -> Result<Option<ActiveTab>, PageError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct CountingSettingsPage {
    opened: AtomicUsize,
}

impl CountingSettingsPage {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsPage for CountingSettingsPage {
    async fn open(&self) -> Result<(), PageError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared key source that is never reachable.
pub struct UnreachableConfig;

#[async_trait]
impl ConfigSource for UnreachableConfig {
    fn fresh_key(&self) -> Option<String> {
        None
    }

    async fn shared_key(&self) -> Result<String, ConfigError> {
        Err(ConfigError::Network("unreachable".to_string()))
    }
}

/// Clients that always answer with the same completion.
pub struct StaticClientFactory {
    pub completion: String,
}

struct StaticClient {
    completion: String,
}

#[async_trait]
impl AnalysisClient for StaticClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ClientError> {
        Ok(self.completion.clone())
    }

    async fn verify(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

impl ClientFactory for StaticClientFactory {
    fn create(&self, _api_key: &str) -> Result<Arc<dyn AnalysisClient>, ClientError> {
        Ok(Arc::new(StaticClient {
            completion: self.completion.clone(),
        }))
    }
}

pub struct TestEngine {
    pub engine: Engine,
    pub page: Arc<FakePage>,
    pub settings: Arc<MemorySettingsStore>,
    pub settings_page: Arc<CountingSettingsPage>,
    pub mirror: Arc<MemorySessionMirror>,
    pub analytics: Arc<RecordingSink>,
}

/// Engine wired to in-memory fakes. The analysis model always answers with
/// `completion`.
pub fn test_engine(
    settings: Settings,
    page: FakePage,
    active: Option<ActiveTab>,
    completion: &str,
) -> TestEngine {
    let page = Arc::new(page);
    let settings = Arc::new(MemorySettingsStore::new(settings));
    let settings_page = Arc::new(CountingSettingsPage::default());
    let mirror = Arc::new(MemorySessionMirror::new());
    let analytics = Arc::new(RecordingSink::default());

    let engine = Engine::assemble(
        &EngineConfig::default(),
        Collaborators {
            page: page.clone(),
            tabs: Arc::new(FixedTabs(active)),
            settings_page: settings_page.clone(),
            settings: settings.clone(),
            mirror: mirror.clone(),
        },
        RemoteServices {
            config: Arc::new(UnreachableConfig),
            clients: Arc::new(StaticClientFactory {
                completion: completion.to_string(),
            }),
            analytics: analytics.clone(),
        },
    );

    TestEngine {
        engine,
        page,
        settings,
        settings_page,
        mirror,
        analytics,
    }
}
