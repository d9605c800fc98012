pub mod config;
pub mod error;
pub mod routes;
pub mod upload;

use std::sync::Arc;

use anyhow::{Context, Result};
use siren_classifier::{ClassificationPipeline, OnnxClassifier};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::{router, AppState, Prediction};
pub use upload::TransientUpload;

/// Loads the model, binds the listener and serves until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<()> {
    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("create upload dir {:?}", config.upload_dir))?;

    let classifier = OnnxClassifier::load(&config.model_path, config.intra_threads)?;
    let pipeline = ClassificationPipeline::with_config(config.spectrogram, Arc::new(classifier))
        .context("build classification pipeline")?;
    let state = AppState::new(pipeline, config.upload_dir.clone());
    let app = router(state, config.max_upload_bytes);

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => warn!(?err, "failed to listen for ctrl-c"),
    }
}
