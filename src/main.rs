use std::net::SocketAddr;
use std::sync::Arc;

use flashcard_forge::config::Config;
use flashcard_forge::logging;
use flashcard_forge::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let _log_guard = logging::init_tracing(&config.log_options());

    tracing::info!(
        gateway = ?config.gateway,
        workers = config.workers,
        stage_timeout_ms = config.stage_timeout.as_millis() as u64,
        data_dir = %config.data_dir.display(),
        "Starting flashcard-forge"
    );

    let state = AppState::from_config(&config);

    let orchestrator = Arc::clone(state.orchestrator());
    let catalog_orchestrator = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        catalog_orchestrator.load_catalog().await;
    });

    let app = flashcard_forge::create_app(state);

    let addr = config.bind_addr();
    tracing::info!(%addr, "flashcard-forge listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    if orchestrator.is_processing() {
        tracing::warn!(
            words = orchestrator.words().len(),
            "Shutting down with words still in flight"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
