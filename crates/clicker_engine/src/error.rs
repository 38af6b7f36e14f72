use clicker_core::{ErrorKind, ErrorPayload};
use thiserror::Error;

pub const MISSING_KEY_MESSAGE: &str = "No API key is configured. Add your key in the settings.";
pub const MALFORMED_KEY_MESSAGE: &str =
    "The API key has an invalid format. Check the key in the settings.";
pub const REJECTED_KEY_MESSAGE: &str =
    "The API key was rejected by the analysis service. Check the key in the settings.";
pub const CONSENT_REQUIRED_MESSAGE: &str =
    "The free plan requires consent to anonymous usage data. Enable it in the settings or choose another plan.";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "The analysis service is temporarily unavailable. Please try again later.";

/// Classified failure of the analysis path. Every variant maps to exactly one
/// [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("credential invalid: {0}")]
    CredentialInvalid(String),
    #[error("consent required: {0}")]
    ConsentRequired(String),
    #[error("config fetch failed: {0}")]
    ConfigFetchFailed(String),
    #[error("analysis failed: {0}")]
    Analysis(String),
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::CredentialInvalid(_) => ErrorKind::CredentialInvalid,
            ScanError::ConsentRequired(_) => ErrorKind::ConsentRequired,
            ScanError::ConfigFetchFailed(_) => ErrorKind::ConfigFetchFailed,
            ScanError::Analysis(_) => ErrorKind::GenericAnalysisError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ScanError::CredentialInvalid(message)
            | ScanError::ConsentRequired(message)
            | ScanError::ConfigFetchFailed(message)
            | ScanError::Analysis(message) => message,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.kind(), self.message())
    }
}

impl From<ScanError> for ErrorPayload {
    fn from(err: ScanError) -> Self {
        err.to_payload()
    }
}

/// Failure reported by the remote analysis client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("authentication rejected (http {0})")]
    Unauthorized(u16),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("credential is not a valid header value")]
    MalformedCredential,
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl ClientError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClientError::Timeout;
        }
        ClientError::Network(err.to_string())
    }
}

/// Failure fetching the shared credential from the remote configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed config response: {0}")]
    Malformed(String),
}

/// Failure talking to the page through the extension.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page call timed out")]
    Timeout,
    #[error("extension disconnected")]
    Disconnected,
    #[error("page script failed: {0}")]
    Script(String),
    #[error("unexpected page response: {0}")]
    Malformed(String),
}
