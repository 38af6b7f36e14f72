use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Closed failure taxonomy shared by every observer of a scan.
///
/// The serialized code is part of the wire contract with the UI and must not
/// change once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    CredentialInvalid,
    ConsentRequired,
    ConfigFetchFailed,
    HtmlFetchFailed,
    ClickFailed,
    GenericAnalysisError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::CredentialInvalid,
        ErrorKind::ConsentRequired,
        ErrorKind::ConfigFetchFailed,
        ErrorKind::HtmlFetchFailed,
        ErrorKind::ClickFailed,
        ErrorKind::GenericAnalysisError,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::CredentialInvalid => "CREDENTIAL_INVALID",
            ErrorKind::ConsentRequired => "CONSENT_REQUIRED",
            ErrorKind::ConfigFetchFailed => "CONFIG_FETCH_FAILED",
            ErrorKind::HtmlFetchFailed => "HTML_FETCH_FAILED",
            ErrorKind::ClickFailed => "CLICK_FAILED",
            ErrorKind::GenericAnalysisError => "GENERIC_ANALYSIS_ERROR",
        }
    }

    /// Whether the user can resolve this failure from the settings page.
    pub fn is_user_fixable(self) -> bool {
        matches!(self, ErrorKind::CredentialInvalid | ErrorKind::ConsentRequired)
    }

    /// Text the UI shows for this kind. User-fixable kinds get specific
    /// guidance; everything else collapses to a generic line.
    pub fn user_guidance(self) -> &'static str {
        match self {
            ErrorKind::CredentialInvalid => {
                "Your API key was rejected. Open the settings to check or replace it."
            }
            ErrorKind::ConsentRequired => {
                "The free tier needs your consent to anonymous usage data. Open the settings to review it."
            }
            ErrorKind::ClickFailed => "The consent button was found but could not be clicked.",
            ErrorKind::HtmlFetchFailed => "This page could not be read.",
            ErrorKind::ConfigFetchFailed | ErrorKind::GenericAnalysisError => {
                "Something went wrong while scanning this page. Please try again later."
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Wire form of a failure. Serializes with the kind's `guidance` text so the
/// UI never has to map codes itself; the field is ignored on the way back in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorKind,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Serialize for ErrorPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut payload = serializer.serialize_struct("ErrorPayload", 3)?;
        payload.serialize_field("code", &self.code)?;
        payload.serialize_field("message", &self.message)?;
        payload.serialize_field("guidance", self.code.user_guidance())?;
        payload.end()
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorKind;

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<_> = ErrorKind::ALL.iter().map(|kind| kind.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn only_settings_related_kinds_are_user_fixable() {
        let fixable: Vec<_> = ErrorKind::ALL
            .into_iter()
            .filter(|kind| kind.is_user_fixable())
            .collect();
        assert_eq!(
            fixable,
            vec![ErrorKind::CredentialInvalid, ErrorKind::ConsentRequired]
        );
    }
}
