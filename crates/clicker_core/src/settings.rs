use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Operating mode selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// The user brings their own API key.
    Byok,
    /// Shared key, gated on consent to anonymous usage data.
    #[default]
    Free,
    /// Shared key for paying users.
    Subscribed,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Byok => "byok",
            Tier::Free => "free",
            Tier::Subscribed => "subscribed",
        }
    }

    pub fn uses_shared_key(self) -> bool {
        matches!(self, Tier::Free | Tier::Subscribed)
    }
}

/// Persisted user settings. The API key is stored base64-encoded; this is
/// obfuscation against casual inspection, not encryption.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub consent: Option<bool>,
    #[serde(default, rename = "api_key")]
    encoded_api_key: Option<String>,
}

impl Settings {
    pub fn new(tier: Tier, consent: Option<bool>, api_key: Option<&str>) -> Self {
        let mut settings = Self {
            tier,
            consent,
            encoded_api_key: None,
        };
        settings.set_api_key(api_key);
        settings
    }

    /// Decoded user API key. A value that fails to decode is treated as absent.
    pub fn api_key(&self) -> Option<String> {
        let encoded = self.encoded_api_key.as_deref()?;
        let bytes = STANDARD.decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }

    pub fn set_api_key(&mut self, api_key: Option<&str>) {
        self.encoded_api_key = api_key.map(|key| STANDARD.encode(key.as_bytes()));
    }

    pub fn has_consent(&self) -> bool {
        self.consent == Some(true)
    }

    /// Analytics are only ever submitted on the free tier with explicit consent.
    pub fn analytics_allowed(&self) -> bool {
        self.tier == Tier::Free && self.has_consent()
    }

    /// True when switching from `self` to `next` changes which client is valid.
    pub fn affects_credentials(&self, next: &Settings) -> bool {
        self.tier != next.tier
            || self.consent != next.consent
            || self.encoded_api_key != next.encoded_api_key
    }
}

/// Fingerprint of everything that decides which analysis client is valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialSignature(String);

impl CredentialSignature {
    /// `credential` is the resolved key: the user's key for BYOK, the shared
    /// key for the other tiers, or `None` when it is not known yet.
    pub fn compute(settings: &Settings, credential: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(settings.tier.as_str().as_bytes());
        hasher.update([0u8]);
        let consent = match settings.consent {
            Some(true) => "1",
            Some(false) => "0",
            None => "-",
        };
        hasher.update(consent.as_bytes());
        hasher.update([0u8]);
        if let Some(credential) = credential {
            hasher.update(b"k");
            hasher.update(credential.as_bytes());
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            use std::fmt::Write;
            let _ = write!(&mut hex, "{byte:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_stored_encoded() {
        let settings = Settings::new(Tier::Byok, None, Some("sk-secret"));
        assert_eq!(settings.encoded_api_key.as_deref(), Some("c2stc2VjcmV0"));
        assert_eq!(settings.api_key().as_deref(), Some("sk-secret"));
    }

    #[test]
    fn undecodable_key_reads_as_absent() {
        let settings = Settings {
            tier: Tier::Byok,
            consent: None,
            encoded_api_key: Some("%%%".to_string()),
        };
        assert_eq!(settings.api_key(), None);
    }

    #[test]
    fn signature_tracks_each_input() {
        let base = Settings::new(Tier::Free, Some(true), None);
        let sig = CredentialSignature::compute(&base, Some("k1"));

        assert_eq!(sig, CredentialSignature::compute(&base, Some("k1")));
        assert_ne!(sig, CredentialSignature::compute(&base, Some("k2")));
        assert_ne!(sig, CredentialSignature::compute(&base, None));

        let no_consent = Settings::new(Tier::Free, Some(false), None);
        assert_ne!(sig, CredentialSignature::compute(&no_consent, Some("k1")));

        let subscribed = Settings::new(Tier::Subscribed, Some(true), None);
        assert_ne!(sig, CredentialSignature::compute(&subscribed, Some("k1")));
    }

    #[test]
    fn analytics_need_free_tier_and_consent() {
        assert!(Settings::new(Tier::Free, Some(true), None).analytics_allowed());
        assert!(!Settings::new(Tier::Free, None, None).analytics_allowed());
        assert!(!Settings::new(Tier::Subscribed, Some(true), None).analytics_allowed());
        assert!(!Settings::new(Tier::Byok, Some(true), Some("k")).analytics_allowed());
    }
}
