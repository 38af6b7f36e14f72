use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clicker_logging::{clicker_debug, clicker_info};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::lock;

/// Source of the shared API key used by the free and subscribed plans.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// The last fetched key if it is still inside its freshness window. No IO.
    fn fresh_key(&self) -> Option<String>;
    /// A fresh key, fetching it if the cached one has expired.
    async fn shared_key(&self) -> Result<String, ConfigError>;
}

#[derive(Debug, Deserialize)]
struct SharedKeyResponse {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

struct CachedKey {
    value: String,
    fetched_at: Instant,
}

pub struct HttpConfigSource {
    http: reqwest::Client,
    url: String,
    freshness: Duration,
    cached: Mutex<Option<CachedKey>>,
}

impl HttpConfigSource {
    pub fn new(http: reqwest::Client, url: impl Into<String>, freshness: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            freshness,
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<String, ConfigError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|err| ConfigError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| ConfigError::Network(err.to_string()))?;
        let parsed: SharedKeyResponse =
            serde_json::from_str(&body).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        parsed
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::Malformed("apiKey missing or empty".to_string()))
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    fn fresh_key(&self) -> Option<String> {
        lock(&self.cached)
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.freshness)
            .map(|cached| cached.value.clone())
    }

    async fn shared_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.fresh_key() {
            clicker_debug!("Using cached shared key");
            return Ok(key);
        }

        let key = self.fetch().await?;
        clicker_info!("Fetched shared key from remote configuration");
        *lock(&self.cached) = Some(CachedKey {
            value: key.clone(),
            fetched_at: Instant::now(),
        });
        Ok(key)
    }
}
