#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::broadcast;

use flashcard_forge::core::{Notification, NotificationBus};
use flashcard_forge::services::orchestrator::{FlashcardOrchestrator, OrchestratorOptions};
use flashcard_forge::services::simulated_gateway::SimulatedGateway;
use flashcard_forge::state::AppState;

pub fn orchestrator_with(gateway: Arc<SimulatedGateway>) -> Arc<FlashcardOrchestrator> {
    Arc::new(FlashcardOrchestrator::new(
        gateway,
        Arc::new(NotificationBus::new()),
        OrchestratorOptions::default(),
    ))
}

pub struct TestApp {
    pub router: Router,
    pub orchestrator: Arc<FlashcardOrchestrator>,
    pub gateway: Arc<SimulatedGateway>,
    _data_dir: tempfile::TempDir,
}

pub fn create_test_app(gateway: SimulatedGateway) -> TestApp {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let gateway = Arc::new(gateway);
    let orchestrator = orchestrator_with(gateway.clone());
    let state = AppState::new(
        Arc::clone(&orchestrator),
        data_dir.path().join("audio"),
        data_dir.path().join("exports"),
    );

    TestApp {
        router: flashcard_forge::create_app(state),
        orchestrator,
        gateway,
        _data_dir: data_dir,
    }
}

/// Collects every notification already published to `rx`.
pub fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
