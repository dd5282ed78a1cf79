use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNKNOWN_ERROR: &str = "Unknown error";

const ID_SUFFIX_LEN: usize = 7;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl WordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioSlot {
    TargetWord,
    Definition,
    ExampleSentence1,
    ExampleSentence2,
}

impl AudioSlot {
    pub const ALL: [Self; 4] = [
        Self::TargetWord,
        Self::Definition,
        Self::ExampleSentence1,
        Self::ExampleSentence2,
    ];

    /// Short tag used in synthesized audio file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            Self::TargetWord => "target",
            Self::Definition => "definition",
            Self::ExampleSentence1 => "example1",
            Self::ExampleSentence2 => "example2",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_sentence1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_sentence2: Option<String>,
}

impl AudioUrls {
    pub fn get(&self, slot: AudioSlot) -> Option<&str> {
        match slot {
            AudioSlot::TargetWord => self.target_word.as_deref(),
            AudioSlot::Definition => self.definition.as_deref(),
            AudioSlot::ExampleSentence1 => self.example_sentence1.as_deref(),
            AudioSlot::ExampleSentence2 => self.example_sentence2.as_deref(),
        }
    }

    pub fn set(&mut self, slot: AudioSlot, url: impl Into<String>) {
        let url = Some(url.into());
        match slot {
            AudioSlot::TargetWord => self.target_word = url,
            AudioSlot::Definition => self.definition = url,
            AudioSlot::ExampleSentence1 => self.example_sentence1 = url,
            AudioSlot::ExampleSentence2 => self.example_sentence2 = url,
        }
    }

    /// Copies every slot present in `other`; absent slots never erase audio.
    pub fn merge(&mut self, other: &AudioUrls) {
        for slot in AudioSlot::ALL {
            if let Some(url) = other.get(slot) {
                self.set(slot, url);
            }
        }
    }

    pub fn len(&self) -> usize {
        AudioSlot::ALL.iter().filter(|s| self.get(**s).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.len() == AudioSlot::ALL.len()
    }
}

/// Fields produced by one generation stage. Identity and status are owned by
/// the orchestrator, so they never travel in an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_sentence1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_sentence2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_urls: Option<AudioUrls>,
}

impl WordUpdate {
    pub fn from_record(record: &WordRecord) -> Self {
        Self {
            source_word: Some(record.source_word.clone()),
            target_word: Some(record.target_word.clone()),
            definition: Some(record.definition.clone()),
            example_sentence1: Some(record.example_sentence1.clone()),
            example_sentence2: Some(record.example_sentence2.clone()),
            audio_urls: Some(record.audio_urls.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal word status transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: WordStatus,
    pub to: WordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    pub id: String,
    pub source_word: String,
    pub target_word: String,
    pub definition: String,
    pub example_sentence1: String,
    pub example_sentence2: String,
    pub audio_urls: AudioUrls,
    pub status: WordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WordRecord {
    /// A freshly accepted word. The raw input sits in `source_word` until the
    /// gateway decides, per translation direction, where it belongs.
    pub fn pending(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_word: input.into(),
            target_word: String::new(),
            definition: String::new(),
            example_sentence1: String::new(),
            example_sentence2: String::new(),
            audio_urls: AudioUrls::default(),
            status: WordStatus::Pending,
            error: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == WordStatus::Completed
    }

    pub fn has_all_content(&self) -> bool {
        !self.target_word.is_empty()
            && !self.definition.is_empty()
            && !self.example_sentence1.is_empty()
            && !self.example_sentence2.is_empty()
            && self.audio_urls.is_complete()
    }

    pub fn begin_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(WordStatus::Processing)
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(WordStatus::Completed)
    }

    /// Moves to `error`, normalizing a blank reason to [`UNKNOWN_ERROR`].
    pub fn fail(&mut self, reason: &str) -> Result<(), TransitionError> {
        self.transition(WordStatus::Error)?;
        self.error = Some(normalize_error_message(reason));
        Ok(())
    }

    /// Settles an unfinished record as failed. A pending record passes
    /// through `processing` first. Returns false if it was already terminal.
    pub fn abandon(&mut self, reason: &str) -> bool {
        if self.status == WordStatus::Pending && self.begin_processing().is_err() {
            return false;
        }
        self.fail(reason).is_ok()
    }

    /// Merges a stage update. Updates are only accepted while processing;
    /// late updates for a finished record are dropped.
    pub fn apply(&mut self, update: &WordUpdate) -> bool {
        if self.status != WordStatus::Processing {
            return false;
        }

        if let Some(ref v) = update.source_word {
            self.source_word.clone_from(v);
        }
        if let Some(ref v) = update.target_word {
            self.target_word.clone_from(v);
        }
        if let Some(ref v) = update.definition {
            self.definition.clone_from(v);
        }
        if let Some(ref v) = update.example_sentence1 {
            self.example_sentence1.clone_from(v);
        }
        if let Some(ref v) = update.example_sentence2 {
            self.example_sentence2.clone_from(v);
        }
        if let Some(ref audio) = update.audio_urls {
            self.audio_urls.merge(audio);
        }

        true
    }

    fn transition(&mut self, to: WordStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

pub fn normalize_error_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{word}-{unix millis}-{random base36}`; the suffix separates records that
/// share text and creation millisecond.
pub fn new_record_id(word: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", word, Utc::now().timestamp_millis(), suffix)
}
