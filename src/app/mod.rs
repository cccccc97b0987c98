use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    response::Json,
    routing::get,
};
use bytes::Bytes;
use nvml_wrapper::Nvml;
use serde::Serialize;
use std::{path::Path, sync::Arc};
use tch::Device;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

pub mod config;

mod classifier;
mod detector;
mod diseases;
mod error;
mod gpu_info;
mod gradcam;
mod image_utils;
mod overlay;
mod pages;

use crate::app::{
    classifier::{LeafClassifier, VGG16_FEATURES},
    config::Config,
    detector::{Detection, Detector, DetectorSettings},
    error::DetectError,
    gpu_info::GpuInfo,
};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    device: String,
    classes: Vec<&'static str>,
    threshold: f64,
    gpu_info: Option<GpuInfo>,
}

#[derive(Clone)]
struct AppState {
    detector: Arc<Detector>,
    nvml: Option<Arc<Nvml>>,
}

/// A file field pulled out of the multipart body.
struct Upload {
    file_name: String,
    data: Bytes,
}

pub async fn start_app(config: Config) -> Result<()> {
    config.validate()?;

    info!("Starting tomato leaf disease detection service...");

    let nvml = gpu_info::init_nvml().map(Arc::new);

    let device = if !config.cpu && tch::Cuda::is_available() {
        info!("CUDA available, running on GPU");
        Device::Cuda(0)
    } else {
        info!("Running on CPU");
        Device::Cpu
    };

    info!("Loading classifier weights from {}", config.model.display());
    let model = LeafClassifier::load(
        &config.model,
        device,
        VGG16_FEATURES,
        diseases::DISEASES.len() as i64,
    )
    .with_context(|| format!("failed to load model {}", config.model.display()))?;

    let detector = Detector::new(
        Arc::new(model),
        DetectorSettings {
            input_size: config.input_size,
            normalization: config.normalization,
            threshold: config.threshold,
            overlay_alpha: config.overlay_alpha,
        },
    );

    let state = AppState {
        detector: Arc::new(detector),
        nvml,
    };

    let app = build_router(state, &config.static_dir, config.max_upload_bytes());

    info!("Listening on http://{}", config.bind);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState, static_dir: &Path, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/detect", get(pages::detect).post(detect_image))
        .route("/about", get(pages::about))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        device: format!("{:?}", state.detector.model().device()),
        classes: diseases::class_names(),
        threshold: state.detector.settings().threshold,
        gpu_info: state.nvml.as_deref().map(GpuInfo::new),
    })
}

async fn detect_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Detection>, DetectError> {
    let span = info_span!("detect", request_id = %Uuid::new_v4());

    async move {
        let multipart = multipart.map_err(|_| DetectError::NoFilePart)?;
        let upload = read_upload(multipart).await?;

        if upload.file_name.is_empty() {
            return Err(DetectError::NoSelectedFile);
        }
        if !image_utils::is_jpeg_filename(&upload.file_name) {
            return Err(DetectError::NotJpeg);
        }

        info!(file = %upload.file_name, bytes = upload.data.len(), "received upload");

        let detector = state.detector.clone();
        let worker_span = tracing::Span::current();
        let result = tokio::task::spawn_blocking(move || {
            let _guard = worker_span.enter();
            detector.detect(&upload.data)
        })
        .await
        .map_err(|e| DetectError::Worker(e.to_string()))?;

        match &result {
            Err(DetectError::LowConfidence {
                class_index,
                confidence,
            }) => warn!(class_index, confidence, "prediction below threshold"),
            Err(e) => warn!("detection failed: {}", e),
            Ok(_) => {}
        }

        result.map(Json)
    }
    .instrument(span)
    .await
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, DetectError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        // plain form fields are not uploads
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await?;
        return Ok(Upload { file_name, data });
    }

    Err(DetectError::NoFilePart)
}
