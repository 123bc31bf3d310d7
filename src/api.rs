//! REST API server for the financial report analyzer
//!
//! Exposes `analyze` and `answer_question` over HTTP for the web UI.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::error::{AnalysisError, ErrorKind};
use crate::models::{AnalysisResult, DocumentPayload, MetricRequest};

const DEFAULT_FORECAST_HORIZON: &str = "1 year";
const INVALID_INPUT: &str = "Invalid input format.";
const ANALYSIS_REQUIRED: &str = "Please analyze a report first to use the chatbot.";
const ASSISTANT_FAILED: &str = "Failed to get an answer from the AI assistant.";
const BODY_LIMIT_HEADROOM: usize = 64 * 1024;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(alias = "dataUri")]
    pub financial_report_data_uri: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default = "default_forecast_horizon")]
    pub forecast_horizon: String,
}

fn default_forecast_horizon() -> String {
    DEFAULT_FORECAST_HORIZON.to_string()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default, alias = "analysisData")]
    pub analysis: Option<AnalysisResult>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            code: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: code.map(str::to_string),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Helpers: Error → Status
/// =============================

fn status_for(err: &AnalysisError) -> StatusCode {
    if matches!(err, AnalysisError::InvalidPayload(_)) {
        return StatusCode::BAD_REQUEST;
    }
    match err.kind() {
        ErrorKind::ArchiveCorrupt | ErrorKind::NoContentExtracted => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::AnalysisUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ProcessingError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: &AnalysisError) -> (StatusCode, Json<ApiResponse>) {
    let message = match err {
        AnalysisError::InvalidPayload(_) => err.to_string(),
        _ => err.user_message().to_string(),
    };
    (
        status_for(err),
        Json(ApiResponse::error(message, Some(err.code()))),
    )
}

fn invalid_input(rejection: JsonRejection) -> (StatusCode, Json<ApiResponse>) {
    warn!("Rejected request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(INVALID_INPUT, None)),
    )
}

/// Documents arrive base64-encoded inside JSON, so the body limit covers
/// the 4/3 encoding overhead plus room for the other fields.
fn request_body_limit(max_upload_bytes: usize) -> usize {
    (max_upload_bytes / 3)
        .saturating_add(1)
        .saturating_mul(4)
        .saturating_add(BODY_LIMIT_HEADROOM)
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Analysis Endpoint
/// =============================

async fn analyze_report(
    State(state): State<ApiState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_input(rejection),
    };

    let document = match DocumentPayload::from_data_uri(&req.financial_report_data_uri) {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, "Rejected document payload");
            return failure(&e);
        }
    };

    info!(
        media_type = document.media_type(),
        bytes = document.len(),
        horizon = %req.forecast_horizon,
        "Received analysis request"
    );

    let request = MetricRequest::new(req.metrics, req.forecast_horizon);

    match state.orchestrator.analyze(&document, &request).await {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::success(result))),
        Err(e) => failure(&e),
    }
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_input(rejection),
    };

    if req.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(INVALID_INPUT, None)),
        );
    }

    let Some(analysis) = req.analysis else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(ANALYSIS_REQUIRED, None)),
        );
    };

    let context = analysis.to_context_text();

    match state
        .orchestrator
        .answer_question(&req.question, &context)
        .await
    {
        Ok(answer) => (StatusCode::OK, Json(ApiResponse::success(answer))),
        Err(e) => {
            warn!(error = %e, "Question answering failed");
            let status = match e.kind() {
                ErrorKind::AnalysisUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(ApiResponse::error(ASSISTANT_FAILED, Some(e.code()))))
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>, max_upload_bytes: usize) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze_report))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(request_body_limit(max_upload_bytes)))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                info_span!(
                    "http_request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
    max_upload_bytes: usize,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator, max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
