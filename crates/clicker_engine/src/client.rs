use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// A single deterministic prompt: one system and one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

/// Handle to the remote analysis model, bound to one credential.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Returns the raw text content of the model's reply.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ClientError>;
    /// Cheapest call that proves the credential is accepted.
    async fn verify(&self) -> Result<(), ClientError>;
}

/// Builds clients bound to a specific credential.
pub trait ClientFactory: Send + Sync {
    fn create(&self, api_key: &str) -> Result<Arc<dyn AnalysisClient>, ClientError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    authorization: HeaderValue,
}

impl OpenAiClient {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl AnalysisClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ClientError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
        };
        let payload =
            serde_json::to_vec(&body).map_err(|err| ClientError::Malformed(err.to_string()))?;

        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        check_status(response.status())?;

        let text = response.text().await.map_err(ClientError::from_reqwest)?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|err| ClientError::Malformed(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ClientError::Malformed("reply has no message content".to_string()))
    }

    async fn verify(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .get(self.endpoint("models"))
            .header(AUTHORIZATION, self.authorization.clone())
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        check_status(response.status())
    }
}

fn check_status(status: StatusCode) -> Result<(), ClientError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ClientError::Unauthorized(status.as_u16()))
        }
        _ => Err(ClientError::HttpStatus(status.as_u16())),
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClientFactory {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiClientFactory {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

impl ClientFactory for OpenAiClientFactory {
    fn create(&self, api_key: &str) -> Result<Arc<dyn AnalysisClient>, ClientError> {
        let api_key = api_key.trim();
        if api_key.is_empty() || api_key.chars().any(char::is_whitespace) {
            return Err(ClientError::MalformedCredential);
        }
        let mut authorization = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ClientError::MalformedCredential)?;
        authorization.set_sensitive(true);

        Ok(Arc::new(OpenAiClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            authorization,
        }))
    }
}
