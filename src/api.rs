//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::Settings;
use crate::download;
use crate::error::AppError;
use crate::generation::{GenerationRequest, Generator, InvalidRequest};
use crate::normalizer::EntryWarning;
use crate::styles::{self, StyleView, MAX_STYLE_LEN};
use crate::ui;

/// Shared by every handler
pub struct AppState {
    pub settings: Settings,
    pub generator: Generator,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fashion-studio/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let generator = Generator::from_settings(&settings, http.clone());
        Ok(AppState {
            settings,
            generator,
            http,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.server.body_limit_bytes;

    Router::new()
        .route("/", get(ui::index))
        .route("/health", get(health))
        .route("/api/styles", get(list_styles))
        .route("/api/generate", post(generate))
        .route("/api/download", post(download_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    /// Kept raw so malformed values are reported as `INVALID_QUANTITY`
    #[serde(default)]
    pub quantity: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub images: Vec<String>,
    pub warnings: Vec<EntryWarning>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub image: String,
    pub style: String,
    /// 0-based position in the result grid
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_styles() -> Json<Vec<StyleView>> {
    Json(styles::catalog())
}

/// POST /api/generate
async fn generate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let start = Instant::now();
    let Json(body) = body?;

    let request = GenerationRequest::new(
        body.image.as_deref(),
        body.style.as_deref(),
        body.quantity.as_ref(),
        &state.settings.upload,
    )?;

    let normalized = state.generator.generate(&request).await?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    info!(
        style = %request.style(),
        quantity = request.quantity(),
        images = normalized.images.len(),
        elapsed_ms,
        "Generation finished"
    );

    Ok(Json(GenerateResponse {
        success: true,
        images: normalized.images,
        warnings: normalized.warnings,
        elapsed_ms,
    }))
}

/// POST /api/download
async fn download_image(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;
    if body.style.trim().chars().count() > MAX_STYLE_LEN {
        return Err(InvalidRequest::StyleTooLong.into());
    }

    let resolved = download::resolve(&state.http, &body.image, state.settings.upload.max_bytes).await?;
    let name = download::file_name(
        body.style.trim(),
        body.index,
        chrono::Utc::now().timestamp_millis(),
        &resolved.content_type,
    );

    Ok((
        [
            (header::CONTENT_TYPE, resolved.content_type),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", name)),
        ],
        resolved.bytes,
    )
        .into_response())
}
