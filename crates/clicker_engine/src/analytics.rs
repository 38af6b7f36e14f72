use std::sync::Arc;

use async_trait::async_trait;
use clicker_core::AnalyticsRecord;
use clicker_logging::{clicker_debug, clicker_warn};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::settings_store::SettingsStore;

/// Best-effort usage reporting. Implementations swallow their own failures.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn submit(&self, record: AnalyticsRecord);
}

/// Produces the RFC 3339 timestamp stamped on every submitted record.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

pub fn utc_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().to_rfc3339())
}

#[derive(Debug, Serialize)]
struct AnalyticsPayload<'a> {
    #[serde(flatten)]
    record: &'a AnalyticsRecord,
    timestamp: String,
}

/// Posts records as JSON. Nothing is sent unless the active tier is the free
/// tier and consent was explicitly given.
pub struct HttpAnalyticsSink {
    http: reqwest::Client,
    url: String,
    settings: Arc<dyn SettingsStore>,
    clock: Clock,
}

impl HttpAnalyticsSink {
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
        clock: Clock,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            settings,
            clock,
        }
    }
}

#[async_trait]
impl AnalyticsSink for HttpAnalyticsSink {
    async fn submit(&self, record: AnalyticsRecord) {
        if !self.settings.snapshot().analytics_allowed() {
            clicker_debug!("Analytics disabled for current settings, dropping {}", record.event);
            return;
        }

        let payload = AnalyticsPayload {
            record: &record,
            timestamp: (self.clock)(),
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                clicker_warn!("Failed to serialize analytics record: {}", err);
                return;
            }
        };

        let result = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                clicker_debug!("Submitted analytics event {}", record.event);
            }
            Ok(response) => {
                clicker_warn!("Analytics endpoint answered {}", response.status());
            }
            Err(err) => clicker_warn!("Analytics submission failed: {}", err),
        }
    }
}
