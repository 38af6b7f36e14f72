use std::sync::Arc;

use thiserror::Error;

use crate::analytics::{utc_clock, AnalyticsSink, HttpAnalyticsSink};
use crate::client::{ClientFactory, OpenAiClientFactory};
use crate::config::EngineConfig;
use crate::config_source::{ConfigSource, HttpConfigSource};
use crate::credentials::CredentialCache;
use crate::gateway::AnalysisGateway;
use crate::mirror::SessionMirror;
use crate::orchestrator::ScanOrchestrator;
use crate::page::PageBridge;
use crate::router::{MessageRouter, SettingsPage, TabDirectory};
use crate::settings_store::{SettingsObserver, SettingsStore};
use crate::store::TabStateStore;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Everything the engine reaches through the browser or local storage.
pub struct Collaborators {
    pub page: Arc<dyn PageBridge>,
    pub tabs: Arc<dyn TabDirectory>,
    pub settings_page: Arc<dyn SettingsPage>,
    pub settings: Arc<dyn SettingsStore>,
    pub mirror: Arc<dyn SessionMirror>,
}

/// Remote services: shared key endpoint, analysis API and analytics sink.
pub struct RemoteServices {
    pub config: Arc<dyn ConfigSource>,
    pub clients: Arc<dyn ClientFactory>,
    pub analytics: Arc<dyn AnalyticsSink>,
}

impl RemoteServices {
    /// HTTP implementations of every remote service, sharing one client.
    pub fn from_config(
        config: &EngineConfig,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self, EngineError> {
        let http = config.http_client()?;
        Ok(Self {
            config: Arc::new(HttpConfigSource::new(
                http.clone(),
                config.shared_key_url.clone(),
                config.shared_key_freshness(),
            )),
            clients: Arc::new(OpenAiClientFactory::new(
                http.clone(),
                config.analysis_base_url.clone(),
                config.model.clone(),
            )),
            analytics: Arc::new(HttpAnalyticsSink::new(
                http,
                config.analytics_url.clone(),
                settings,
                utc_clock(),
            )),
        })
    }
}

/// The wired engine.
pub struct Engine {
    pub store: Arc<TabStateStore>,
    pub credentials: Arc<CredentialCache>,
    pub gateway: Arc<AnalysisGateway>,
    pub orchestrator: Arc<ScanOrchestrator>,
    pub router: MessageRouter,
}

impl Engine {
    pub fn build(config: &EngineConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        let remote = RemoteServices::from_config(config, collaborators.settings.clone())?;
        Ok(Self::assemble(config, collaborators, remote))
    }

    pub fn assemble(
        config: &EngineConfig,
        collaborators: Collaborators,
        remote: RemoteServices,
    ) -> Self {
        let Collaborators {
            page,
            tabs,
            settings_page,
            settings,
            mirror,
        } = collaborators;

        let store = Arc::new(TabStateStore::new(mirror));
        let credentials = Arc::new(CredentialCache::new(
            settings.clone(),
            remote.config,
            remote.clients.clone(),
        ));
        let observer: Arc<dyn SettingsObserver> = credentials.clone();
        settings.subscribe(Arc::downgrade(&observer));

        let gateway = Arc::new(AnalysisGateway::new(
            credentials.clone(),
            remote.clients,
            config.max_analysis_chars,
        ));
        let orchestrator = Arc::new(ScanOrchestrator::new(
            store.clone(),
            page,
            gateway.clone(),
            remote.analytics,
            config.snippet_chars,
        ));
        let router = MessageRouter::new(
            store.clone(),
            orchestrator.clone(),
            gateway.clone(),
            settings,
            tabs,
            settings_page,
        );

        Self {
            store,
            credentials,
            gateway,
            orchestrator,
            router,
        }
    }
}
