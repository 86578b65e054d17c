//! HTTP surface of the gateway.
//!
//! Exposes the image synthesis endpoints consumed by the web client, plus a
//! reachability report describing how the service can be reached from
//! outside. Handlers validate, delegate to the synthesis client, and map
//! domain errors onto HTTP statuses.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::error::JobError;
use crate::state::{AppState, Reachability};
use crate::synthesis::{
    EditRequest, ExpansionOptions, PollOutcome, StagedImage, SynthesisOutcome, SynthesisRequest,
    DEFAULT_MAX_DIMENSION, DEFAULT_SIZE, DEFAULT_TARGET_RATIO,
};
use crate::tunnel::AddressScope;

/// Largest accepted request body; edit images arrive base64-inflated
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

// ============================================================================
// Request bodies
// ============================================================================

/// JSON body for POST /generate-image.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_prompt_extend")]
    pub prompt_extend: bool,
    #[serde(default)]
    pub watermark: bool,
}

/// JSON body for POST /edit-image.
#[derive(Debug, Deserialize)]
pub struct EditBody {
    /// Image bytes as base64, bare or wrapped in a data URL
    pub image: String,
    pub edit_prompt: String,
    #[serde(default)]
    pub enable_expansion: bool,
    #[serde(default = "default_target_ratio")]
    pub target_ratio: String,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

fn default_size() -> String {
    DEFAULT_SIZE.to_string()
}

fn default_prompt_extend() -> bool {
    true
}

fn default_target_ratio() -> String {
    DEFAULT_TARGET_RATIO.to_string()
}

fn default_max_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

// ============================================================================
// Responses
// ============================================================================

/// JSON response for a submission (generate or edit).
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// JSON response for GET /check-task.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSON response for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// JSON response for GET /reachability.
#[derive(Debug, Serialize)]
pub struct ReachabilityResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub candidates: Vec<CandidateResponse>,
    /// When the current reachability was established (RFC 3339)
    pub since: String,
}

#[derive(Debug, Serialize)]
pub struct CandidateResponse {
    pub address: String,
    pub scope: AddressScope,
}

/// Map a domain error onto an HTTP reply. Validation problems are the
/// caller's fault; everything remote-side is a bad gateway.
fn error_reply(context: &str, e: JobError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        JobError::Validation(_) => StatusCode::BAD_REQUEST,
        JobError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    error!("{}: {}", context, e);
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// Accept either a bare base64 string or a full data URL.
fn decode_image_field(value: &str) -> Result<Vec<u8>, JobError> {
    let encoded = match value.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => value,
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| JobError::Validation(format!("image field is not valid base64: {}", e)))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /generate-image - Submit a text-to-image job
async fn generate_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<SubmissionResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!("Generation request: size={}", body.size);

    let request = SynthesisRequest {
        prompt: body.prompt,
        negative_prompt: body.negative_prompt,
        size: body.size,
        prompt_extend: body.prompt_extend,
        watermark: body.watermark,
    };

    match state.synthesis.submit(&request).await {
        Ok(SynthesisOutcome::Immediate(url)) => Ok(Json(SubmissionResponse {
            success: true,
            image_url: Some(url),
            task_id: None,
            status: None,
        })),
        Ok(SynthesisOutcome::Queued(task_id)) => Ok(Json(SubmissionResponse {
            success: true,
            image_url: None,
            task_id: Some(task_id),
            status: Some("processing".to_string()),
        })),
        Err(e) => Err(error_reply("Generation request failed", e)),
    }
}

/// GET /check-task/{task_id} - Query a queued job once
async fn check_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.synthesis.poll(&task_id).await {
        Ok(PollOutcome::Completed(url)) => Ok(Json(TaskResponse {
            success: true,
            status: "completed".to_string(),
            image_url: Some(url),
            error: None,
        })),
        // The job failed but the query itself succeeded, so this is a 200
        Ok(PollOutcome::Failed(message)) => Ok(Json(TaskResponse {
            success: false,
            status: "failed".to_string(),
            image_url: None,
            error: Some(message),
        })),
        Ok(PollOutcome::Pending) => Ok(Json(TaskResponse {
            success: true,
            status: "processing".to_string(),
            image_url: None,
            error: None,
        })),
        Err(e) => Err(error_reply("Task status query failed", e)),
    }
}

/// POST /edit-image - Submit an instruction-driven image edit
async fn edit_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EditBody>,
) -> Result<Json<SubmissionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let bytes =
        decode_image_field(&body.image).map_err(|e| error_reply("Edit request rejected", e))?;
    info!("Edit request: {} image bytes", bytes.len());

    let image = StagedImage::stage(&state.config.spool_dir, &bytes)
        .await
        .map_err(|e| error_reply("Staging edit image failed", JobError::Io(e)))?;

    let request = EditRequest {
        image,
        instruction: body.edit_prompt,
        expansion: ExpansionOptions {
            enabled: body.enable_expansion,
            target_ratio: body.target_ratio,
            max_dimension: body.max_dimension,
        },
    };

    // The staged file is released when `request` drops, on every path.
    match state.synthesis.edit(&request).await {
        Ok(SynthesisOutcome::Immediate(url)) => Ok(Json(SubmissionResponse {
            success: true,
            image_url: Some(url),
            task_id: None,
            status: None,
        })),
        Ok(SynthesisOutcome::Queued(task_id)) => Ok(Json(SubmissionResponse {
            success: true,
            image_url: None,
            task_id: Some(task_id),
            status: Some("processing".to_string()),
        })),
        Err(e) => Err(error_reply("Edit request failed", e)),
    }
}

/// GET /reachability - How this gateway can be reached from outside
async fn reachability(State(state): State<Arc<AppState>>) -> Json<ReachabilityResponse> {
    let report = state.reachability().await;
    let since: DateTime<Utc> = report.since.into();

    let mut response = ReachabilityResponse {
        public_url: None,
        provider: None,
        candidates: Vec::new(),
        since: since.to_rfc3339(),
    };

    match report.mode {
        Reachability::Probing => {}
        Reachability::Tunneled { provider, url } => {
            response.provider = Some(provider);
            response.public_url = Some(url);
        }
        Reachability::LanOnly { candidates } => {
            response.candidates = candidates
                .into_iter()
                .map(|c| CandidateResponse {
                    address: c.address.to_string(),
                    scope: c.scope,
                })
                .collect();
        }
    }

    Json(response)
}

/// Create the gateway router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - the web frontend is served elsewhere
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/generate-image", post(generate_image))
        .route("/check-task/{task_id}", get(check_task))
        .route("/edit-image", post(edit_image))
        .route("/reachability", get(reachability))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until ctrl-c; tears down the tunnel on the way out.
pub async fn run_api(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.listen_addr();
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
    state.shutdown_tunnel().await;
}
