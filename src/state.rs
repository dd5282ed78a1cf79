use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::{Config, GatewayKind};
use crate::core::NotificationBus;
use crate::services::gateway::GenerationGateway;
use crate::services::llm_gateway::LlmGateway;
use crate::services::llm_provider::LLMProvider;
use crate::services::orchestrator::FlashcardOrchestrator;
use crate::services::settings::FlashcardSettings;
use crate::services::simulated_gateway::SimulatedGateway;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    orchestrator: Arc<FlashcardOrchestrator>,
    audio_dir: PathBuf,
    export_dir: PathBuf,
}

impl AppState {
    pub fn new(orchestrator: Arc<FlashcardOrchestrator>, audio_dir: PathBuf, export_dir: PathBuf) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            orchestrator,
            audio_dir,
            export_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let orchestrator = FlashcardOrchestrator::with_settings(
            Self::create_gateway(config),
            Arc::new(NotificationBus::new()),
            config.orchestrator_options(),
            FlashcardSettings::with_target_language(config.target_language.clone()),
        );
        Self::new(Arc::new(orchestrator), config.audio_dir(), config.export_dir())
    }

    pub fn create_gateway(config: &Config) -> Arc<dyn GenerationGateway> {
        match config.gateway {
            GatewayKind::Simulated => {
                Arc::new(SimulatedGateway::with_latency_scale(config.simulated_latency_scale))
            }
            GatewayKind::Llm => {
                let llm = LLMProvider::from_env();
                if !llm.is_available() {
                    tracing::warn!("LLM gateway selected but LLM_API_KEY is not set");
                }
                Arc::new(LlmGateway::new(llm, config.audio_dir(), config.export_dir()))
            }
        }
    }

    pub fn orchestrator(&self) -> &Arc<FlashcardOrchestrator> {
        &self.orchestrator
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }
}
