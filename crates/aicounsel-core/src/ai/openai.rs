use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionBackend, SpeechBackend};
use crate::error::{Error, Result};
use crate::state::LogEntry;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [LogEntry],
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

/// Body of a text-to-speech request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
    pub response_format: String,
    pub speed: f32,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn query(&self, messages: &[LogEntry]) -> Result<String> {
        let request = OpenAIRequest {
            model: &self.model,
            messages,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "Sending completion request");

        let response = self.client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Status {
                service: "completion endpoint",
                status: status.as_u16(),
                body,
            });
        }

        parse_completion(&body)
    }

    pub async fn create_speech(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        tracing::debug!(model = %request.model, voice = %request.voice, chars = request.input.chars().count(), "Sending speech request");

        let response = self.client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(Error::Transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                service: "speech endpoint",
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(Error::Transport)?;
        Ok(bytes.to_vec())
    }
}

/// Pull `choices[0].message.content` out of a completion response body.
pub fn parse_completion(body: &str) -> Result<String> {
    let response: OpenAIResponse = serde_json::from_str(body)?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::ResponseFormat("choices array is empty".to_string()))?;

    choice
        .message
        .content
        .ok_or_else(|| Error::ResponseFormat("choices[0].message.content is missing".to_string()))
}

#[async_trait]
impl CompletionBackend for OpenAIClient {
    async fn complete(&self, messages: &[LogEntry]) -> Result<String> {
        self.query(messages).await
    }
}

#[async_trait]
impl SpeechBackend for OpenAIClient {
    async fn speech(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        self.create_speech(request).await
    }
}
