use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::services::catalog;
use crate::services::gateway::{
    ExportArtifact, ExportFormat, GatewayError, GenerationGateway, ProgressSink,
};
use crate::services::settings::{
    FlashcardSettings, LanguageOption, TranslationDirection, VoiceOption,
};
use crate::services::word_record::{AudioSlot, AudioUrls, WordRecord, WordStatus, WordUpdate};

// Nominal latencies in milliseconds, multiplied by the latency scale.
const LANGUAGES_DELAY_MS: u64 = 500;
const VOICES_DELAY_MS: u64 = 800;
const TRANSLATION_DELAY_MS: u64 = 1000;
const EXAMPLE_1_DELAY_MS: u64 = 1500;
const EXAMPLE_2_DELAY_MS: u64 = 1000;
const AUDIO_DELAY_MS: u64 = 2000;
const EXPORT_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct ProcessCall {
    pub word: String,
    pub settings: FlashcardSettings,
}

#[derive(Debug, Clone)]
pub struct ExportCall {
    pub word_ids: Vec<String>,
    pub format: ExportFormat,
    pub settings: FlashcardSettings,
}

/// In-process gateway producing placeholder content after simulated delays.
///
/// Words can be scripted to fail or to hang after the first stage, and every
/// call is recorded for inspection.
pub struct SimulatedGateway {
    latency_scale: f64,
    failing_words: HashSet<String>,
    stalling_words: HashSet<String>,
    fail_exports: AtomicBool,
    fail_catalog: AtomicBool,
    process_calls: Mutex<Vec<ProcessCall>>,
    export_calls: Mutex<Vec<ExportCall>>,
}

impl SimulatedGateway {
    /// No artificial latency; stages only yield to the scheduler.
    pub fn new() -> Self {
        Self::with_latency_scale(0.0)
    }

    /// Delays matching a real backend round trip.
    pub fn realistic() -> Self {
        Self::with_latency_scale(1.0)
    }

    pub fn with_latency_scale(latency_scale: f64) -> Self {
        Self {
            latency_scale: latency_scale.max(0.0),
            failing_words: HashSet::new(),
            stalling_words: HashSet::new(),
            fail_exports: AtomicBool::new(false),
            fail_catalog: AtomicBool::new(false),
            process_calls: Mutex::new(Vec::new()),
            export_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, word: impl Into<String>) -> Self {
        self.failing_words.insert(word.into());
        self
    }

    pub fn stalling_on(mut self, word: impl Into<String>) -> Self {
        self.stalling_words.insert(word.into());
        self
    }

    pub fn set_fail_exports(&self, fail: bool) {
        self.fail_exports.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_catalog(&self, fail: bool) {
        self.fail_catalog.store(fail, Ordering::Relaxed);
    }

    pub fn process_calls(&self) -> Vec<ProcessCall> {
        self.process_calls.lock().clone()
    }

    pub fn export_calls(&self) -> Vec<ExportCall> {
        self.export_calls.lock().clone()
    }

    async fn delay(&self, nominal_ms: u64) {
        if self.latency_scale <= 0.0 {
            tokio::task::yield_now().await;
            return;
        }
        let scaled = nominal_ms as f64 * self.latency_scale / 1000.0;
        tokio::time::sleep(Duration::from_secs_f64(scaled)).await;
    }

    fn check_catalog(&self) -> Result<(), GatewayError> {
        if self.fail_catalog.load(Ordering::Relaxed) {
            return Err(GatewayError::Failed("catalog service unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationGateway for SimulatedGateway {
    async fn available_languages(&self) -> Result<Vec<LanguageOption>, GatewayError> {
        self.delay(LANGUAGES_DELAY_MS).await;
        self.check_catalog()?;
        Ok(catalog::languages())
    }

    async fn available_voices(&self, language_code: &str) -> Result<Vec<VoiceOption>, GatewayError> {
        self.delay(VOICES_DELAY_MS).await;
        self.check_catalog()?;
        Ok(catalog::voices_for(language_code))
    }

    async fn process_word(
        &self,
        word: &str,
        settings: &FlashcardSettings,
        progress: ProgressSink,
    ) -> Result<WordRecord, GatewayError> {
        self.process_calls.lock().push(ProcessCall {
            word: word.to_string(),
            settings: settings.clone(),
        });

        let id = progress.word_id().to_string();
        let mut card = WordRecord::pending(id.clone(), word);

        self.delay(TRANSLATION_DELAY_MS).await;
        match settings.translation_direction {
            TranslationDirection::SourceToTarget => {
                card.target_word = format!("{} (translated to {})", word, settings.target_language);
            }
            TranslationDirection::TargetToSource => {
                card.source_word = format!("{} (translated to {})", word, settings.source_language);
                card.target_word = word.to_string();
            }
        }
        card.definition = format!("Definition of \"{}\" in {}", word, settings.source_language);
        progress.report(WordUpdate {
            source_word: Some(card.source_word.clone()),
            target_word: Some(card.target_word.clone()),
            definition: Some(card.definition.clone()),
            ..WordUpdate::default()
        });

        if self.failing_words.contains(word) {
            return Err(GatewayError::Failed(format!(
                "Example generation failed for \"{word}\""
            )));
        }
        if self.stalling_words.contains(word) {
            std::future::pending::<()>().await;
        }

        self.delay(EXAMPLE_1_DELAY_MS).await;
        card.example_sentence1 = format!(
            "This is an example sentence using \"{}\" with {} tone.",
            word,
            settings.tone_or_neutral()
        );
        progress.report(WordUpdate {
            example_sentence1: Some(card.example_sentence1.clone()),
            ..WordUpdate::default()
        });

        self.delay(EXAMPLE_2_DELAY_MS).await;
        card.example_sentence2 =
            format!("Here is another example sentence with \"{word}\" showing different usage.");
        progress.report(WordUpdate {
            example_sentence2: Some(card.example_sentence2.clone()),
            ..WordUpdate::default()
        });

        self.delay(AUDIO_DELAY_MS).await;
        let mut audio = AudioUrls::default();
        for slot in AudioSlot::ALL {
            audio.set(slot, format!("/api/audio/{}-{}.mp3", id, slot.file_tag()));
        }
        card.audio_urls = audio.clone();
        progress.report(WordUpdate {
            audio_urls: Some(audio),
            ..WordUpdate::default()
        });

        card.status = WordStatus::Completed;
        Ok(card)
    }

    async fn export_flashcards(
        &self,
        records: &[WordRecord],
        format: ExportFormat,
        settings: &FlashcardSettings,
    ) -> Result<ExportArtifact, GatewayError> {
        self.export_calls.lock().push(ExportCall {
            word_ids: records.iter().map(|r| r.id.clone()).collect(),
            format,
            settings: settings.clone(),
        });

        self.delay(EXPORT_DELAY_MS).await;
        if self.fail_exports.load(Ordering::Relaxed) {
            return Err(GatewayError::Failed("export service unavailable".to_string()));
        }

        Ok(ExportArtifact {
            url: format!(
                "/api/export?format={}&timestamp={}",
                format,
                Utc::now().timestamp_millis()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::ProgressEvent;

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<WordUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = rx.try_recv() {
            updates.push(event.update);
        }
        updates
    }

    #[tokio::test]
    async fn test_source_to_target_reports_four_stages() {
        let gateway = SimulatedGateway::new();
        let (sink, mut rx) = ProgressSink::channel("run-1");
        let card = gateway
            .process_word("run", &FlashcardSettings::default(), sink)
            .await
            .unwrap();

        assert_eq!(card.id, "run-1");
        assert_eq!(card.source_word, "run");
        assert_eq!(card.target_word, "run (translated to es)");
        assert!(card.has_all_content());
        assert_eq!(card.audio_urls.get(AudioSlot::TargetWord), Some("/api/audio/run-1-target.mp3"));

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 4);
        assert!(updates[0].target_word.is_some() && updates[0].definition.is_some());
        assert!(updates[1].example_sentence1.is_some());
        assert!(updates[2].example_sentence2.is_some());
        assert!(updates[3].audio_urls.as_ref().is_some_and(AudioUrls::is_complete));
    }

    #[tokio::test]
    async fn test_target_to_source_keeps_input_as_target() {
        let gateway = SimulatedGateway::new();
        let settings = FlashcardSettings {
            translation_direction: TranslationDirection::TargetToSource,
            ..FlashcardSettings::default()
        };
        let (sink, _rx) = ProgressSink::channel("correr-1");
        let card = gateway.process_word("correr", &settings, sink).await.unwrap();

        assert_eq!(card.target_word, "correr");
        assert_eq!(card.source_word, "correr (translated to en)");
    }

    #[tokio::test]
    async fn test_tone_flows_into_first_example() {
        let gateway = SimulatedGateway::new();
        let settings = FlashcardSettings {
            tone_instructions: "formal".to_string(),
            ..FlashcardSettings::default()
        };
        let (sink, _rx) = ProgressSink::channel("x");
        let card = gateway.process_word("run", &settings, sink).await.unwrap();
        assert!(card.example_sentence1.contains("with formal tone"));
    }

    #[tokio::test]
    async fn test_failing_word_errors_after_first_stage() {
        let gateway = SimulatedGateway::new().failing_on("xyz");
        let (sink, mut rx) = ProgressSink::channel("xyz-1");
        let err = gateway
            .process_word("xyz", &FlashcardSettings::default(), sink)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("xyz"));
        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(gateway.process_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_export_records_call_and_can_fail() {
        let gateway = SimulatedGateway::new();
        let records = vec![WordRecord::pending("a", "run")];

        let artifact = gateway
            .export_flashcards(&records, ExportFormat::Csv, &FlashcardSettings::default())
            .await
            .unwrap();
        assert!(artifact.url.starts_with("/api/export?format=csv&timestamp="));

        gateway.set_fail_exports(true);
        assert!(gateway
            .export_flashcards(&records, ExportFormat::Html, &FlashcardSettings::default())
            .await
            .is_err());

        let calls = gateway.export_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].word_ids, vec!["a".to_string()]);
        assert_eq!(calls[1].format, ExportFormat::Html);
    }

    #[tokio::test]
    async fn test_catalog_failure_toggle() {
        let gateway = SimulatedGateway::new();
        assert_eq!(gateway.available_voices("fr").await.unwrap().len(), 2);
        gateway.set_fail_catalog(true);
        assert!(gateway.available_languages().await.is_err());
    }
}
