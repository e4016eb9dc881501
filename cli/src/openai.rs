use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use interpreter::{ChatMessage, ModelBackend, ModelError};

const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn new(base_url: &str, api_key: Option<String>, temperature: f32) -> Self {
        OpenAiBackend {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature,
        }
    }
}

impl OpenAiBackend {
    /// Ids of the models the endpoint serves, sorted.
    pub async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let mut builder = self.client.get(format!("{}/models", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ModelError::Failed(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Failed(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        parse_model_list(&body)
    }
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

fn parse_model_list(body: &str) -> Result<Vec<String>, ModelError> {
    let list: ModelList = serde_json::from_str(body)
        .map_err(|e| ModelError::Failed(format!("malformed model list: {}", e)))?;
    let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
    ids.sort();
    Ok(ids)
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let request = CompletionRequest {
            model,
            messages,
            temperature: self.temperature,
        };
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ModelError::Failed(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Failed(e.to_string()))?;
        tracing::debug!(%status, bytes = body.len(), "model response");

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::Failed(format!("malformed response: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ModelError::Failed("no choices in response".to_string()))
    }
}

fn classify_error(status: StatusCode, body: &str) -> ModelError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if envelope.error.code.as_deref() == Some(CONTEXT_LENGTH_EXCEEDED) => {
            ModelError::ContextLengthExceeded
        }
        Ok(envelope) => ModelError::Failed(format!("{}: {}", status, envelope.error.message)),
        Err(_) => ModelError::Failed(format!("{}: {}", status, body.trim())),
    }
}
