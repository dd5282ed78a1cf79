use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::{Notification, NotificationBus};
use crate::services::gateway::{
    ExportFormat, GatewayError, GenerationGateway, ProgressEvent, ProgressSink,
};
use crate::services::settings::{FlashcardSettings, LanguageOption, SettingsPatch, VoiceOption};
use crate::services::word_input::split_words;
use crate::services::word_record::{
    new_record_id, normalize_error_message, WordRecord, WordStatus, WordUpdate,
};

const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);
const CANCELLED_REASON: &str = "Processing was cancelled before the word finished";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlashcardError {
    #[error("words are still being processed")]
    Busy,
    #[error("no flashcards to export")]
    NothingToExport,
    #[error("no completed flashcards to export")]
    NothingReady,
    #[error("export failed: {0}")]
    ExportFailed(String),
    #[error("no words entered")]
    EmptyInput,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    /// Longest silence tolerated between two progress reports of one word.
    pub stage_timeout: Duration,
    /// Words in flight at once within a batch; 1 keeps strict insertion order.
    pub workers: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOutcome {
    Completed,
    Failed,
    /// The record was no longer pending when its turn came.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub word_ids: Vec<String>,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardSnapshot {
    pub words: Vec<WordRecord>,
    pub settings: FlashcardSettings,
    pub is_processing: bool,
    pub available_languages: Vec<LanguageOption>,
    pub available_voices: Vec<VoiceOption>,
}

/// Keeps the processing flag raised while alive.
struct BusyGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Hands out batch turns in enqueue order. The turn moves on once the
/// serving batch and every batch before it has finished or been dropped.
struct BatchTurns {
    state: Mutex<TurnState>,
    serving: watch::Sender<u64>,
}

#[derive(Default)]
struct TurnState {
    next_ticket: u64,
    serving: u64,
    finished: BTreeSet<u64>,
}

impl BatchTurns {
    fn new() -> Self {
        let (serving, _) = watch::channel(0);
        Self {
            state: Mutex::new(TurnState::default()),
            serving,
        }
    }

    fn issue(&self) -> u64 {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        ticket
    }

    async fn wait(&self, ticket: u64) {
        let mut serving = self.serving.subscribe();
        // The sender is owned by `self`, so the channel cannot close here.
        let _ = serving.wait_for(|current| *current >= ticket).await;
    }

    fn finish(&self, ticket: u64) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.finished.insert(ticket);

        let before = state.serving;
        while state.finished.remove(&state.serving) {
            state.serving += 1;
        }
        if state.serving != before {
            self.serving.send_replace(state.serving);
        }
    }
}

/// Words accepted into the collection and waiting for their batch to run.
///
/// Dropping a batch, whether it ran to the end, was cancelled mid-word or
/// never ran, fails any of its records still pending or processing and
/// hands the turn to the next batch.
pub struct PendingBatch {
    word_ids: Vec<String>,
    ticket: u64,
    words: Arc<RwLock<Vec<WordRecord>>>,
    notifications: Arc<NotificationBus>,
    turns: Arc<BatchTurns>,
    _busy: BusyGuard,
}

impl PendingBatch {
    pub fn word_ids(&self) -> &[String] {
        &self.word_ids
    }
}

impl Drop for PendingBatch {
    fn drop(&mut self) {
        let abandoned: Vec<String> = {
            let mut words = self.words.write();
            words
                .iter_mut()
                .filter(|w| self.word_ids.contains(&w.id))
                .filter_map(|w| w.abandon(CANCELLED_REASON).then(|| w.source_word.clone()))
                .collect()
        };

        for input in &abandoned {
            warn!(word = %input, "Word abandoned before finishing");
            self.notifications.publish(processing_error(input));
        }
        self.turns.finish(self.ticket);
    }
}

fn processing_error(input: &str) -> Notification {
    Notification::error(
        "Processing Error",
        format!("Failed to process word \"{input}\". Please try again."),
    )
}

/// Owns the word collection and settings and drives words through the
/// generation gateway. All mutation of the collection goes through here.
pub struct FlashcardOrchestrator {
    gateway: Arc<dyn GenerationGateway>,
    notifications: Arc<NotificationBus>,
    options: OrchestratorOptions,
    words: Arc<RwLock<Vec<WordRecord>>>,
    settings: RwLock<FlashcardSettings>,
    available_languages: RwLock<Vec<LanguageOption>>,
    available_voices: RwLock<Vec<VoiceOption>>,
    active_batches: Arc<AtomicUsize>,
    turns: Arc<BatchTurns>,
}

impl FlashcardOrchestrator {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        notifications: Arc<NotificationBus>,
        options: OrchestratorOptions,
    ) -> Self {
        Self::with_settings(gateway, notifications, options, FlashcardSettings::default())
    }

    pub fn with_settings(
        gateway: Arc<dyn GenerationGateway>,
        notifications: Arc<NotificationBus>,
        options: OrchestratorOptions,
        settings: FlashcardSettings,
    ) -> Self {
        Self {
            gateway,
            notifications,
            options,
            words: Arc::new(RwLock::new(Vec::new())),
            settings: RwLock::new(settings),
            available_languages: RwLock::new(Vec::new()),
            available_voices: RwLock::new(Vec::new()),
            active_batches: Arc::new(AtomicUsize::new(0)),
            turns: Arc::new(BatchTurns::new()),
        }
    }

    pub fn notifications(&self) -> &Arc<NotificationBus> {
        &self.notifications
    }

    pub fn words(&self) -> Vec<WordRecord> {
        self.words.read().clone()
    }

    pub fn word(&self, id: &str) -> Option<WordRecord> {
        self.words.read().iter().find(|w| w.id == id).cloned()
    }

    pub fn settings(&self) -> FlashcardSettings {
        self.settings.read().clone()
    }

    pub fn is_processing(&self) -> bool {
        self.active_batches.load(Ordering::Acquire) > 0
    }

    pub fn available_languages(&self) -> Vec<LanguageOption> {
        self.available_languages.read().clone()
    }

    pub fn available_voices(&self) -> Vec<VoiceOption> {
        self.available_voices.read().clone()
    }

    pub fn snapshot(&self) -> FlashcardSnapshot {
        FlashcardSnapshot {
            words: self.words(),
            settings: self.settings(),
            is_processing: self.is_processing(),
            available_languages: self.available_languages(),
            available_voices: self.available_voices(),
        }
    }

    /// Loads the language list and the voices for the current target language.
    pub async fn load_catalog(&self) {
        match self.gateway.available_languages().await {
            Ok(languages) => {
                debug!(count = languages.len(), "Languages loaded");
                *self.available_languages.write() = languages;
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch languages");
                self.notifications.publish(Notification::error(
                    "Error",
                    "Failed to load available languages. Please try again.",
                ));
            }
        }

        self.refresh_voices().await;
    }

    /// Merges `patch` into the settings. Words already dispatched keep the
    /// settings they were dispatched with.
    pub async fn update_settings(&self, patch: SettingsPatch) -> FlashcardSettings {
        let change = self.settings.write().apply(patch);

        if change.target_language_changed {
            self.refresh_voices().await;
        }

        self.settings()
    }

    async fn refresh_voices(&self) {
        let language = self.settings.read().target_language.clone();
        if language.is_empty() {
            return;
        }

        match self.gateway.available_voices(&language).await {
            Ok(voices) => {
                let mut settings = self.settings.write();
                // The target language may have moved on while we were waiting.
                if settings.target_language != language {
                    debug!(language = %language, "Discarding stale voice list");
                    return;
                }
                if settings.reconcile_voice(&voices) {
                    debug!(voice = %settings.selected_voice, "Default voice selected");
                }
                *self.available_voices.write() = voices;
            }
            Err(e) => {
                error!(error = %e, language = %language, "Failed to fetch voices");
                self.notifications.publish(Notification::error(
                    "Error",
                    "Failed to load available voices. Please try again.",
                ));
            }
        }
    }

    /// Appends one pending record per word and drives the batch to completion.
    /// An empty input changes nothing.
    pub async fn add_words<I, S>(&self, words: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.enqueue_words(words) {
            Some(batch) => self.run_batch(batch).await,
            None => BatchReport::default(),
        }
    }

    /// Splits free text into words and processes them as one batch.
    pub async fn add_text(&self, text: &str) -> Result<BatchReport, FlashcardError> {
        let batch = self.enqueue_text(text)?;
        Ok(self.run_batch(batch).await)
    }

    pub fn enqueue_text(&self, text: &str) -> Result<PendingBatch, FlashcardError> {
        match self.enqueue_words(split_words(text)) {
            Some(batch) => Ok(batch),
            None => {
                self.notifications.publish(Notification::warning(
                    "No Words Entered",
                    "Please enter at least one word to process.",
                ));
                Err(FlashcardError::EmptyInput)
            }
        }
    }

    /// Accepts words into the collection as `pending` and raises the
    /// processing flag. Returns `None` for an empty input.
    pub fn enqueue_words<I, S>(&self, words: I) -> Option<PendingBatch>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inputs: Vec<String> = words.into_iter().map(Into::into).collect();
        if inputs.is_empty() {
            return None;
        }

        let mut collection = self.words.write();
        // Raised under the collection lock so a concurrent clear sees it.
        self.active_batches.fetch_add(1, Ordering::AcqRel);
        let busy = BusyGuard {
            active: Arc::clone(&self.active_batches),
        };
        // Issued under the collection lock so turn order matches append order.
        let ticket = self.turns.issue();

        let mut taken: HashSet<String> = collection.iter().map(|w| w.id.clone()).collect();
        let mut word_ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            let mut id = new_record_id(&input);
            while taken.contains(&id) {
                id = new_record_id(&input);
            }
            taken.insert(id.clone());
            word_ids.push(id.clone());
            collection.push(WordRecord::pending(id, input));
        }

        info!(count = word_ids.len(), "Words queued");
        Some(PendingBatch {
            word_ids,
            ticket,
            words: Arc::clone(&self.words),
            notifications: Arc::clone(&self.notifications),
            turns: Arc::clone(&self.turns),
            _busy: busy,
        })
    }

    /// Processes a batch once every batch enqueued before it has finished,
    /// regardless of which caller reaches this point first. A failing word
    /// never stops the rest of the batch.
    pub async fn run_batch(&self, batch: PendingBatch) -> BatchReport {
        self.turns.wait(batch.ticket).await;
        let workers = self.options.workers.max(1);

        let outcomes: Vec<WordOutcome> = stream::iter(batch.word_ids.iter().cloned())
            .map(|id| async move { self.process_word(&id).await })
            .buffered(workers)
            .collect()
            .await;

        let report = BatchReport {
            completed: outcomes.iter().filter(|o| **o == WordOutcome::Completed).count(),
            failed: outcomes.iter().filter(|o| **o == WordOutcome::Failed).count(),
            word_ids: batch.word_ids.clone(),
        };
        info!(
            total = report.word_ids.len(),
            completed = report.completed,
            failed = report.failed,
            "Batch finished"
        );

        drop(batch);
        report
    }

    async fn process_word(&self, word_id: &str) -> WordOutcome {
        let dispatch = {
            let mut words = self.words.write();
            match words.iter_mut().find(|w| w.id == word_id) {
                Some(record) => match record.begin_processing() {
                    Ok(()) => Some(record.source_word.clone()),
                    Err(e) => {
                        warn!(word_id, error = %e, "Word not dispatchable");
                        None
                    }
                },
                None => {
                    warn!(word_id, "Word vanished before processing");
                    None
                }
            }
        };
        let Some(input) = dispatch else {
            return WordOutcome::Skipped;
        };
        let settings = self.settings();

        debug!(word_id, word = %input, "Processing word");
        match self.drive_gateway(word_id, &input, &settings).await {
            Ok(card) => {
                let mut words = self.words.write();
                let Some(record) = words.iter_mut().find(|w| w.id == word_id) else {
                    return WordOutcome::Skipped;
                };
                record.apply(&WordUpdate::from_record(&card));
                match record.complete() {
                    Ok(()) => {
                        debug!(word_id, "Word completed");
                        WordOutcome::Completed
                    }
                    Err(e) => {
                        warn!(word_id, error = %e, "Could not complete word");
                        WordOutcome::Skipped
                    }
                }
            }
            Err(e) => {
                let reason = normalize_error_message(&e.to_string());
                error!(word_id, word = %input, error = %reason, "Error processing word");
                {
                    let mut words = self.words.write();
                    if let Some(record) = words.iter_mut().find(|w| w.id == word_id) {
                        if let Err(te) = record.fail(&reason) {
                            warn!(word_id, error = %te, "Could not mark word failed");
                        }
                    }
                }
                self.notifications.publish(processing_error(&input));
                WordOutcome::Failed
            }
        }
    }

    /// Runs the gateway call while applying its progress reports in order.
    /// The call is abandoned once no report arrives within the stage timeout.
    async fn drive_gateway(
        &self,
        word_id: &str,
        input: &str,
        settings: &FlashcardSettings,
    ) -> Result<WordRecord, GatewayError> {
        let (sink, mut updates) = ProgressSink::channel(word_id);
        let call = self.gateway.process_word(input, settings, sink);
        tokio::pin!(call);

        let stage_timeout = self.options.stage_timeout;
        let mut deadline = Instant::now() + stage_timeout;

        loop {
            tokio::select! {
                biased;
                Some(event) = updates.recv() => {
                    self.apply_progress(event);
                    deadline = Instant::now() + stage_timeout;
                }
                result = &mut call => {
                    while let Ok(event) = updates.try_recv() {
                        self.apply_progress(event);
                    }
                    return result;
                }
                () = tokio::time::sleep_until(deadline) => {
                    return Err(GatewayError::StageTimeout(stage_timeout.as_millis() as u64));
                }
            }
        }
    }

    fn apply_progress(&self, event: ProgressEvent) {
        let mut words = self.words.write();
        match words.iter_mut().find(|w| w.id == event.word_id) {
            Some(record) => {
                if !record.apply(&event.update) {
                    debug!(word_id = %event.word_id, status = record.status.as_str(), "Late progress dropped");
                }
            }
            None => debug!(word_id = %event.word_id, "Progress for unknown word dropped"),
        }
    }

    /// Empties the collection unless words are still being processed.
    pub fn clear_words(&self) -> Result<usize, FlashcardError> {
        let removed = {
            let mut words = self.words.write();
            let in_flight = words.iter().any(|w| w.status == WordStatus::Processing);
            if self.is_processing() || in_flight {
                None
            } else {
                let removed = words.len();
                words.clear();
                Some(removed)
            }
        };

        match removed {
            Some(removed) => {
                info!(removed, "Words cleared");
                Ok(removed)
            }
            None => {
                self.notifications.publish(Notification::warning(
                    "Cannot Clear Words",
                    "Please wait until all words have finished processing.",
                ));
                Err(FlashcardError::Busy)
            }
        }
    }

    /// Exports every completed card; unfinished and failed words are skipped.
    pub async fn export(&self, format: ExportFormat) -> Result<String, FlashcardError> {
        let completed: Result<Vec<WordRecord>, FlashcardError> = {
            let words = self.words.read();
            if words.is_empty() {
                Err(FlashcardError::NothingToExport)
            } else {
                let completed: Vec<WordRecord> =
                    words.iter().filter(|w| w.status == WordStatus::Completed).cloned().collect();
                if completed.is_empty() {
                    Err(FlashcardError::NothingReady)
                } else {
                    Ok(completed)
                }
            }
        };

        let completed = match completed {
            Ok(completed) => completed,
            Err(FlashcardError::NothingToExport) => {
                self.notifications.publish(Notification::warning(
                    "No Flashcards to Export",
                    "Please add and process words before exporting.",
                ));
                return Err(FlashcardError::NothingToExport);
            }
            Err(e) => {
                self.notifications.publish(Notification::warning(
                    "No Completed Flashcards",
                    "Please wait until at least one word has finished processing.",
                ));
                return Err(e);
            }
        };

        let settings = self.settings();
        match self.gateway.export_flashcards(&completed, format, &settings).await {
            Ok(artifact) => {
                self.notifications.publish(Notification::info(
                    "Export Successful",
                    format!(
                        "Your flashcards have been exported in {} format.",
                        format.as_str().to_uppercase()
                    ),
                ));
                Ok(artifact.url)
            }
            Err(e) => {
                error!(error = %e, format = format.as_str(), "Export error");
                self.notifications.publish(Notification::error(
                    "Export Failed",
                    "An error occurred while exporting your flashcards. Please try again.",
                ));
                Err(FlashcardError::ExportFailed(normalize_error_message(&e.to_string())))
            }
        }
    }
}
