use std::time::Duration;

use clicker_core::{MAX_ANALYSIS_CHARS, MAX_SNIPPET_CHARS};
use serde::{Deserialize, Serialize};

/// Runtime configuration of the engine. Every field has a default so a config
/// file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the OpenAI-compatible analysis API.
    pub analysis_base_url: String,
    pub model: String,
    /// Endpoint serving the shared key for the free and subscribed plans.
    pub shared_key_url: String,
    pub analytics_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Characters of page markup submitted for analysis.
    pub max_analysis_chars: usize,
    /// Characters of page markup attached to analytics records.
    pub snippet_chars: usize,
    /// How long a fetched shared key is reused before it is fetched again.
    pub shared_key_freshness_secs: u64,
    /// Mirrored tab states older than this are ignored.
    pub session_ttl_secs: u64,
    /// Upper bound on a single round trip to the page.
    pub page_call_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            shared_key_url: "https://consent-clicker.app/api/config".to_string(),
            analytics_url: "https://consent-clicker.app/api/events".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            max_analysis_chars: MAX_ANALYSIS_CHARS,
            snippet_chars: MAX_SNIPPET_CHARS,
            shared_key_freshness_secs: 60 * 60,
            session_ttl_secs: 12 * 60 * 60,
            page_call_timeout_secs: 20,
        }
    }
}

impl EngineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shared_key_freshness(&self) -> Duration {
        Duration::from_secs(self.shared_key_freshness_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn page_call_timeout(&self) -> Duration {
        Duration::from_secs(self.page_call_timeout_secs)
    }

    /// Shared HTTP client for every remote collaborator.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout())
            .timeout(self.request_timeout())
            .build()
    }
}
