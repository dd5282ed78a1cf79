use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::services::llm_provider::LLMError;
use crate::services::settings::{FlashcardSettings, LanguageOption, VoiceOption};
use crate::services::word_record::{WordRecord, WordUpdate};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Failed(String),
    #[error("stage timed out after {0}ms")]
    StageTimeout(u64),
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unknown error")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Html,
    Csv,
    Anki,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Anki => "anki",
        }
    }

    /// Anki decks are emitted as its tab-separated plain-text import format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Anki => "txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported export format: {0}")]
pub struct UnknownExportFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownExportFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "csv" => Ok(Self::Csv),
            "anki" => Ok(Self::Anki),
            other => Err(UnknownExportFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub word_id: String,
    pub update: WordUpdate,
}

/// Write half of a word's progress channel. The gateway reports one update
/// per completed stage; a single consumer applies them in arrival order.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    word_id: String,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSink {
    pub fn channel(word_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                word_id: word_id.into(),
                tx,
            },
            rx,
        )
    }

    pub fn word_id(&self) -> &str {
        &self.word_id
    }

    pub fn report(&self, update: WordUpdate) {
        let event = ProgressEvent {
            word_id: self.word_id.clone(),
            update,
        };
        if self.tx.send(event).is_err() {
            debug!(word_id = %self.word_id, "Progress consumer gone, update dropped");
        }
    }
}

/// Backend that generates card content and renders exports.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn available_languages(&self) -> Result<Vec<LanguageOption>, GatewayError>;

    async fn available_voices(&self, language_code: &str) -> Result<Vec<VoiceOption>, GatewayError>;

    /// Runs every generation stage for `word`, reporting each stage through
    /// `progress`. Resolves with the finished card or the first stage failure.
    async fn process_word(
        &self,
        word: &str,
        settings: &FlashcardSettings,
        progress: ProgressSink,
    ) -> Result<WordRecord, GatewayError>;

    async fn export_flashcards(
        &self,
        records: &[WordRecord],
        format: ExportFormat,
        settings: &FlashcardSettings,
    ) -> Result<ExportArtifact, GatewayError>;
}
