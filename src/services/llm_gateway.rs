use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::services::catalog;
use crate::services::export;
use crate::services::gateway::{
    ExportArtifact, ExportFormat, GatewayError, GenerationGateway, ProgressSink,
};
use crate::services::llm_provider::{extract_json_from_response, LLMProvider};
use crate::services::settings::{
    FlashcardSettings, LanguageOption, TranslationDirection, VoiceOption,
};
use crate::services::word_record::{AudioSlot, AudioUrls, WordRecord, WordStatus, WordUpdate};

const SYSTEM_PROMPT: &str = "You write vocabulary flashcards for language learners. \
Reply with a single JSON object and nothing else.";
const FALLBACK_VOICE: &str = "alloy";
const FEMALE_VOICE: &str = "nova";
const MALE_VOICE: &str = "onyx";
const PROVIDER_VOICES: &[&str] = &[
    "alloy", "ash", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
];

#[derive(Debug, Deserialize)]
struct TranslationReply {
    translation: String,
    definition: String,
}

#[derive(Debug, Deserialize)]
struct SentenceReply {
    sentence: String,
}

/// Gateway backed by an OpenAI-compatible chat + speech API. Audio and
/// exports land on local disk and are served by the HTTP layer.
pub struct LlmGateway {
    llm: LLMProvider,
    audio_dir: PathBuf,
    export_dir: PathBuf,
}

impl LlmGateway {
    pub fn new(llm: LLMProvider, audio_dir: PathBuf, export_dir: PathBuf) -> Self {
        Self {
            llm,
            audio_dir,
            export_dir,
        }
    }

    async fn ask<T: serde::de::DeserializeOwned>(&self, prompt: &str) -> Result<T, GatewayError> {
        let reply = self.llm.complete_with_system(SYSTEM_PROMPT, prompt).await?;
        let json = extract_json_from_response(&reply);
        Ok(serde_json::from_str(&json)?)
    }

    async fn synthesize(
        &self,
        word_id: &str,
        slot: AudioSlot,
        text: &str,
        voice: &str,
    ) -> Result<String, GatewayError> {
        let bytes = self.llm.speech(text, voice).await?;
        let file_name = audio_file_name(word_id, slot);
        tokio::fs::create_dir_all(&self.audio_dir).await?;
        tokio::fs::write(self.audio_dir.join(&file_name), bytes).await?;
        Ok(format!("/audio/{file_name}"))
    }
}

#[async_trait]
impl GenerationGateway for LlmGateway {
    async fn available_languages(&self) -> Result<Vec<LanguageOption>, GatewayError> {
        Ok(catalog::languages())
    }

    async fn available_voices(&self, language_code: &str) -> Result<Vec<VoiceOption>, GatewayError> {
        Ok(catalog::voices_for(language_code))
    }

    async fn process_word(
        &self,
        word: &str,
        settings: &FlashcardSettings,
        progress: ProgressSink,
    ) -> Result<WordRecord, GatewayError> {
        let id = progress.word_id().to_string();
        let mut card = WordRecord::pending(id.clone(), word);

        let reply: TranslationReply = self.ask(&translation_prompt(word, settings)).await?;
        let translation = reply.translation.trim().to_string();
        if translation.is_empty() {
            return Err(GatewayError::Failed(format!("No translation returned for \"{word}\"")));
        }
        match settings.translation_direction {
            TranslationDirection::SourceToTarget => card.target_word = translation,
            TranslationDirection::TargetToSource => {
                card.source_word = translation;
                card.target_word = word.to_string();
            }
        }
        card.definition = reply.definition.trim().to_string();
        progress.report(WordUpdate {
            source_word: Some(card.source_word.clone()),
            target_word: Some(card.target_word.clone()),
            definition: Some(card.definition.clone()),
            ..WordUpdate::default()
        });

        let first: SentenceReply = self
            .ask(&example_prompt(&card.target_word, settings, None))
            .await?;
        card.example_sentence1 = first.sentence.trim().to_string();
        progress.report(WordUpdate {
            example_sentence1: Some(card.example_sentence1.clone()),
            ..WordUpdate::default()
        });

        let second: SentenceReply = self
            .ask(&example_prompt(
                &card.target_word,
                settings,
                Some(&card.example_sentence1),
            ))
            .await?;
        card.example_sentence2 = second.sentence.trim().to_string();
        progress.report(WordUpdate {
            example_sentence2: Some(card.example_sentence2.clone()),
            ..WordUpdate::default()
        });

        let voice = provider_voice(&settings.selected_voice, self.llm.tts_voice());
        let mut audio = AudioUrls::default();
        for slot in AudioSlot::ALL {
            let text = match slot {
                AudioSlot::TargetWord => &card.target_word,
                AudioSlot::Definition => &card.definition,
                AudioSlot::ExampleSentence1 => &card.example_sentence1,
                AudioSlot::ExampleSentence2 => &card.example_sentence2,
            };
            let url = self.synthesize(&id, slot, text, voice).await?;
            audio.set(slot, url);
        }
        card.audio_urls = audio.clone();
        progress.report(WordUpdate {
            audio_urls: Some(audio),
            ..WordUpdate::default()
        });

        debug!(word_id = %id, word, "Card generated");
        card.status = WordStatus::Completed;
        Ok(card)
    }

    async fn export_flashcards(
        &self,
        records: &[WordRecord],
        format: ExportFormat,
        settings: &FlashcardSettings,
    ) -> Result<ExportArtifact, GatewayError> {
        let file_name = export::write_export(&self.export_dir, records, format, settings).await?;
        Ok(ExportArtifact {
            url: format!("/exports/{file_name}"),
        })
    }
}

fn display_language(code: &str) -> &str {
    catalog::language_name(code).unwrap_or(code)
}

fn translation_prompt(word: &str, settings: &FlashcardSettings) -> String {
    let source = display_language(&settings.source_language);
    let target = display_language(&settings.target_language);

    match settings.translation_direction {
        TranslationDirection::SourceToTarget => format!(
            r#"Translate the {source} word "{word}" into {target}.
Also write a short {source} definition of "{word}".
Return: {{"translation": "...", "definition": "..."}}"#
        ),
        TranslationDirection::TargetToSource => format!(
            r#"The word "{word}" is {target}. Translate it into {source}.
Also write a short {source} definition of its meaning.
Return: {{"translation": "...", "definition": "..."}}"#
        ),
    }
}

fn example_prompt(target_word: &str, settings: &FlashcardSettings, avoid: Option<&str>) -> String {
    let target = display_language(&settings.target_language);
    let mut prompt = format!(
        r#"Write one natural {target} example sentence that uses "{target_word}".
Tone: {}."#,
        settings.tone_or_neutral()
    );
    if let Some(previous) = avoid {
        prompt.push_str(&format!("\nShow a different usage than: \"{previous}\""));
    }
    prompt.push_str("\nReturn: {\"sentence\": \"...\"}");
    prompt
}

/// Record ids embed user text, so only a safe subset reaches the file system.
fn audio_file_name(word_id: &str, slot: AudioSlot) -> String {
    let safe: String = word_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}-{}.mp3", safe, slot.file_tag())
}

/// Maps a catalog voice onto one the speech endpoint accepts: an explicit
/// override wins, provider voice names pass through, and catalog voices
/// are matched by gender.
fn provider_voice<'a>(selected: &'a str, override_voice: Option<&'a str>) -> &'a str {
    if let Some(voice) = override_voice.filter(|v| !v.trim().is_empty()) {
        return voice;
    }

    let selected = selected.trim();
    if PROVIDER_VOICES.contains(&selected) {
        return selected;
    }

    match catalog::voice_gender(selected) {
        Some(gender) if gender.eq_ignore_ascii_case("female") => FEMALE_VOICE,
        Some(gender) if gender.eq_ignore_ascii_case("male") => MALE_VOICE,
        _ => FALLBACK_VOICE,
    }
}
