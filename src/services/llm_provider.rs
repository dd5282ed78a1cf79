use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TTS_MODEL: &str = "tts-1";
const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 200;
const ERROR_BODY_PREVIEW: usize = 512;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub tts_model: String,
    /// Provider voice used for every clip, overriding the catalog mapping.
    pub tts_voice: Option<String>,
    pub api_endpoint: String,
    pub timeout: Duration,
}

impl LLMConfig {
    pub fn from_env() -> Self {
        let endpoint = env_string("LLM_API_ENDPOINT")
            .or_else(|| env_string("LLM_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());

        Self {
            api_key: env_string("LLM_API_KEY"),
            model: env_string("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            tts_model: env_string("LLM_TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: env_string("LLM_TTS_VOICE"),
            api_endpoint: versioned_endpoint(&endpoint),
            timeout: Duration::from_millis(
                env_string("LLM_TIMEOUT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|v| !v.trim().is_empty())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_endpoint.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("LLM not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyResponse,
}

impl LLMError {
    /// Connection failures, throttling and server errors are worth another try.
    fn is_transient(&self) -> bool {
        match self {
            LLMError::Request(e) => !e.is_builder(),
            LLMError::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Thin client for chat completions and speech synthesis.
#[derive(Clone)]
pub struct LLMProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl LLMProvider {
    pub fn from_env() -> Self {
        Self::new(LLMConfig::from_env())
    }

    pub fn new(config: LLMConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn is_available(&self) -> bool {
        self.config.api_key().is_some()
            && !self.config.model.trim().is_empty()
            && !self.config.api_endpoint.trim().is_empty()
    }

    pub fn tts_voice(&self) -> Option<&str> {
        self.config.tts_voice.as_deref()
    }

    /// Returns the first choice's text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LLMError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
        };
        let bytes = self.post(&self.config.url("chat/completions"), &request).await?;

        let completion: ChatCompletion = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, body = %preview(&bytes), "Unreadable chat completion");
            e
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LLMError::EmptyResponse)
    }

    pub async fn complete_with_system(&self, system: &str, user: &str) -> Result<String, LLMError> {
        self.chat(&[
            ChatMessage::new(ChatRole::System, system),
            ChatMessage::new(ChatRole::User, user),
        ])
        .await
    }

    /// Synthesizes `input` with `voice`, returning the encoded MP3 bytes.
    pub async fn speech(&self, input: &str, voice: &str) -> Result<Vec<u8>, LLMError> {
        let request = SpeechRequest {
            model: &self.config.tts_model,
            input,
            voice,
            response_format: "mp3",
        };
        let bytes = self.post(&self.config.url("audio/speech"), &request).await?;
        if bytes.is_empty() {
            return Err(LLMError::EmptyResponse);
        }
        Ok(bytes)
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Vec<u8>, LLMError> {
        let api_key = self.config.api_key().ok_or(LLMError::NotConfigured("LLM_API_KEY"))?;

        let mut attempt = 0;
        loop {
            match self.send_once(url, api_key, body).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt < MAX_RETRIES && err.is_transient() => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "LLM request failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once<T: Serialize + ?Sized>(
        &self,
        url: &str,
        api_key: &str,
        body: &T,
    ) -> Result<Vec<u8>, LLMError> {
        let response = self.client.post(url).bearer_auth(api_key).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(url, %status, len = bytes.len(), "LLM response");

        if !status.is_success() {
            return Err(LLMError::HttpStatus {
                status,
                body: preview(&bytes),
            });
        }
        Ok(bytes.to_vec())
    }
}

/// Pulls a JSON object out of a chat reply that may wrap it in prose or a
/// fenced block.
pub fn extract_json_from_response(response: &str) -> String {
    let trimmed = response.trim();

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(|inner| inner.trim().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS << attempt)
}

fn preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).chars().take(ERROR_BODY_PREVIEW).collect()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Appends `/v1` unless the endpoint already names an API version.
fn versioned_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") || trimmed.contains("/v1/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}
