use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use siren_classifier::ClassificationPipeline;
use siren_domain::{ClassifyError, SirenClass};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::upload::TransientUpload;

/// Multipart field carrying the audio clip.
pub const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ClassificationPipeline>,
    upload_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(pipeline: ClassificationPipeline, upload_dir: PathBuf) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            upload_dir: Arc::new(upload_dir),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub prediction: SirenClass,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Health {
    pub status: String,
    pub classes: Vec<SirenClass>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        classes: SirenClass::ALL.to_vec(),
    })
}

async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!(%rejection, "request is not multipart");
            return Err(ClassifyError::MissingFile.into());
        }
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // Only parts that carry a filename are file uploads.
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            debug!("ignoring `file` field without a filename");
            continue;
        };
        let bytes = field.bytes().await?;
        upload = Some((file_name, bytes));
        break;
    }
    let (file_name, bytes) = upload.ok_or(ClassifyError::MissingFile)?;
    info!(%file_name, size = bytes.len(), "received upload");

    let class = tokio::task::spawn_blocking(move || -> Result<SirenClass, ClassifyError> {
        let upload = TransientUpload::create(&state.upload_dir, Some(&file_name), &bytes)?;
        let result = state.pipeline.classify_file(upload.path());
        if let Err(err) = upload.remove() {
            warn!(%err, "transient upload was not removed");
        }
        result
    })
    .await??;

    Ok(Json(Prediction { prediction: class }))
}
