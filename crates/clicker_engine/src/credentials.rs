use std::sync::{Arc, Mutex};

use clicker_core::{CredentialSignature, Settings, Tier};
use clicker_logging::{clicker_debug, clicker_info, clicker_warn, redact};

use crate::client::{AnalysisClient, ClientFactory};
use crate::config_source::ConfigSource;
use crate::error::{
    ClientError, ScanError, CONSENT_REQUIRED_MESSAGE, MALFORMED_KEY_MESSAGE, MISSING_KEY_MESSAGE,
    SERVICE_UNAVAILABLE_MESSAGE,
};
use crate::lock;
use crate::settings_store::{SettingsObserver, SettingsStore};

struct CachedClient {
    signature: CredentialSignature,
    client: Arc<dyn AnalysisClient>,
}

/// Memoized analysis client for the current settings.
///
/// Two callers racing on a cold cache may both resolve a credential; the last
/// one to finish owns the slot. No lock is held across the resolution, so an
/// [`invalidate`](CredentialCache::invalidate) can land at any time. Every
/// cached client carries the signature it was resolved under, and a lookup only
/// hits when that signature matches the current settings.
pub struct CredentialCache {
    settings: Arc<dyn SettingsStore>,
    config: Arc<dyn ConfigSource>,
    factory: Arc<dyn ClientFactory>,
    slot: Mutex<Option<CachedClient>>,
}

impl CredentialCache {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        config: Arc<dyn ConfigSource>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            settings,
            config,
            factory,
            slot: Mutex::new(None),
        }
    }

    pub async fn get_client(&self) -> Result<Arc<dyn AnalysisClient>, ScanError> {
        let settings = self.settings.snapshot();
        let known = self.known_credential(&settings);
        let signature = CredentialSignature::compute(&settings, known.as_deref());
        if let Some(client) = self.cached(&signature) {
            return Ok(client);
        }

        let credential = self.resolve(&settings).await?;
        // Bind to what was actually resolved; a settings change during the
        // fetch makes this signature stale and the next lookup misses.
        let signature = CredentialSignature::compute(&settings, Some(&credential));
        let client = self.factory.create(&credential).map_err(|err| match err {
            ClientError::MalformedCredential => {
                ScanError::CredentialInvalid(MALFORMED_KEY_MESSAGE.to_string())
            }
            other => ScanError::Analysis(other.to_string()),
        })?;

        clicker_info!(
            "Created analysis client for tier {} with key {}",
            settings.tier.as_str(),
            redact(&credential)
        );
        *lock(&self.slot) = Some(CachedClient {
            signature,
            client: client.clone(),
        });
        Ok(client)
    }

    /// Drops the cached client unconditionally.
    pub fn invalidate(&self) {
        if lock(&self.slot).take().is_some() {
            clicker_debug!("Analysis client cache invalidated");
        }
    }

    /// Signature of the cached client, if any.
    pub fn cached_signature(&self) -> Option<CredentialSignature> {
        lock(&self.slot)
            .as_ref()
            .map(|cached| cached.signature.clone())
    }

    fn cached(&self, signature: &CredentialSignature) -> Option<Arc<dyn AnalysisClient>> {
        lock(&self.slot)
            .as_ref()
            .filter(|cached| &cached.signature == signature)
            .map(|cached| cached.client.clone())
    }

    /// Credential known without IO, used for the pre-resolution lookup.
    fn known_credential(&self, settings: &Settings) -> Option<String> {
        if settings.tier.uses_shared_key() {
            self.config.fresh_key()
        } else {
            byok_key(settings)
        }
    }

    async fn resolve(&self, settings: &Settings) -> Result<String, ScanError> {
        if !settings.tier.uses_shared_key() {
            return byok_key(settings)
                .ok_or_else(|| ScanError::CredentialInvalid(MISSING_KEY_MESSAGE.to_string()));
        }
        if settings.tier == Tier::Free && !settings.has_consent() {
            return Err(ScanError::ConsentRequired(
                CONSENT_REQUIRED_MESSAGE.to_string(),
            ));
        }
        self.config.shared_key().await.map_err(|err| {
            clicker_warn!("Shared key fetch failed: {}", err);
            ScanError::ConfigFetchFailed(SERVICE_UNAVAILABLE_MESSAGE.to_string())
        })
    }
}

fn byok_key(settings: &Settings) -> Option<String> {
    settings
        .api_key()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

impl SettingsObserver for CredentialCache {
    fn settings_changed(&self, previous: &Settings, current: &Settings) {
        if previous.affects_credentials(current) {
            self.invalidate();
        }
    }
}
