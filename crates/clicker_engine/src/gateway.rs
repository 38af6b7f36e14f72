use std::sync::Arc;

use async_trait::async_trait;
use clicker_core::{prefix_chars, strip_code_fence};
use clicker_logging::{clicker_debug, clicker_warn};
use serde_json::Value;

use crate::client::{ClientFactory, CompletionRequest};
use crate::credentials::CredentialCache;
use crate::error::{
    ClientError, ScanError, MALFORMED_KEY_MESSAGE, MISSING_KEY_MESSAGE, REJECTED_KEY_MESSAGE,
};

const SYSTEM_PROMPT: &str = "You inspect the HTML of a web page and locate the control that \
accepts all cookies or otherwise dismisses the cookie consent banner. Reply with a JSON object \
of the form {\"selector\": \"<css selector>\"} where the CSS selector matches exactly that \
control. Prefer ids and stable attributes over positional selectors. If the page has no cookie \
consent banner, reply with {\"selector\": null}. Reply with the JSON object only.";

/// Anything that can name the accept control of a page.
#[async_trait]
pub trait SelectorSource: Send + Sync {
    async fn find_accept_selector(&self, html: &str) -> Result<Option<String>, ScanError>;
}

/// Remote analysis of page markup, with credentials from the [`CredentialCache`].
pub struct AnalysisGateway {
    credentials: Arc<CredentialCache>,
    factory: Arc<dyn ClientFactory>,
    max_chars: usize,
}

impl AnalysisGateway {
    pub fn new(
        credentials: Arc<CredentialCache>,
        factory: Arc<dyn ClientFactory>,
        max_chars: usize,
    ) -> Self {
        Self {
            credentials,
            factory,
            max_chars,
        }
    }

    /// Validates `candidate` with a throwaway client. The credential cache is
    /// never consulted or modified.
    pub async fn test_credential(&self, candidate: &str) -> Result<(), ScanError> {
        if candidate.trim().is_empty() {
            return Err(ScanError::CredentialInvalid(MISSING_KEY_MESSAGE.to_string()));
        }
        let client = self.factory.create(candidate).map_err(|err| {
            clicker_debug!("Candidate key rejected locally: {}", err);
            ScanError::CredentialInvalid(MALFORMED_KEY_MESSAGE.to_string())
        })?;
        client.verify().await.map_err(|err| {
            clicker_debug!("Candidate key rejected by service: {}", err);
            ScanError::CredentialInvalid(REJECTED_KEY_MESSAGE.to_string())
        })
    }
}

#[async_trait]
impl SelectorSource for AnalysisGateway {
    async fn find_accept_selector(&self, html: &str) -> Result<Option<String>, ScanError> {
        let markup = prefix_chars(html, self.max_chars);
        let client = self.credentials.get_client().await?;
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: markup.to_string(),
        };
        let content = client.complete(&request).await.map_err(map_client_error)?;
        parse_selector_reply(&content)
    }
}

fn map_client_error(err: ClientError) -> ScanError {
    match err {
        ClientError::Unauthorized(_) | ClientError::MalformedCredential => {
            ScanError::CredentialInvalid(REJECTED_KEY_MESSAGE.to_string())
        }
        other => {
            clicker_warn!("Analysis request failed: {}", other);
            ScanError::Analysis(other.to_string())
        }
    }
}

/// Interprets the model reply. Only an explicit `"selector": null` means
/// "no banner"; every other shape that is not a non-blank string is a fault.
pub fn parse_selector_reply(content: &str) -> Result<Option<String>, ScanError> {
    let body = strip_code_fence(content);
    let value: Value = serde_json::from_str(body)
        .map_err(|err| ScanError::Analysis(format!("reply is not valid JSON: {err}")))?;

    match value.get("selector") {
        Some(Value::Null) => Ok(None),
        Some(Value::String(selector)) if !selector.trim().is_empty() => {
            Ok(Some(selector.trim().to_string()))
        }
        Some(other) => Err(ScanError::Analysis(format!(
            "reply has an unusable selector value: {other}"
        ))),
        None => Err(ScanError::Analysis(
            "reply has no selector field".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_selector_reply;
    use crate::error::ScanError;

    #[test]
    fn explicit_null_is_a_soft_negative() {
        assert_eq!(parse_selector_reply(r#"{"selector": null}"#), Ok(None));
    }

    #[test]
    fn fenced_reply_is_unwrapped() {
        let reply = "```json\n{\"selector\":\"#x\"}\n```";
        assert_eq!(parse_selector_reply(reply), Ok(Some("#x".to_string())));
    }

    #[test]
    fn malformed_replies_are_faults() {
        for reply in [
            "I could not find it",
            r##"{"button": "#x"}"##,
            r#"{"selector": 42}"#,
            r#"{"selector": "  "}"#,
            r##"["#x"]"##,
        ] {
            assert!(
                matches!(parse_selector_reply(reply), Err(ScanError::Analysis(_))),
                "reply {reply:?} should be a fault"
            );
        }
    }
}
