//! Public HTTP handlers: health, usage counters and the enhancement key

use crate::api::models::{ApiKeyResponse, ErrorResponse, HealthResponse, SuccessResponse};
use crate::error::AppError;
use crate::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Count one page view
#[utoipa::path(
    get,
    path = "/api/stats/view",
    tag = "Stats",
    responses(
        (status = 200, description = "View recorded", body = SuccessResponse)
    )
)]
pub async fn record_page_view(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    // counting is best effort, the client never sees a storage failure
    let stats = state.stats.clone();
    match tokio::task::spawn_blocking(move || stats.record_page_view()).await {
        Ok(Ok(stats)) => debug!(page_views = stats.page_views, "Page view recorded"),
        Ok(Err(e)) => warn!(error = %e, "Failed to record page view"),
        Err(e) => warn!(error = %e, "Page view task failed"),
    }
    Json(SuccessResponse::ok())
}

/// Count one generated image
#[utoipa::path(
    post,
    path = "/api/stats/image",
    tag = "Stats",
    responses(
        (status = 200, description = "Image recorded", body = SuccessResponse)
    )
)]
pub async fn record_image(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    let stats = state.stats.clone();
    match tokio::task::spawn_blocking(move || stats.record_image()).await {
        Ok(Ok(stats)) => debug!(images_generated = stats.images_generated, "Image recorded"),
        Ok(Err(e)) => warn!(error = %e, "Failed to record generated image"),
        Err(e) => warn!(error = %e, "Image count task failed"),
    }
    Json(SuccessResponse::ok())
}

/// Hand the prompt enhancement key to the client
#[utoipa::path(
    get,
    path = "/api/gemini-key",
    tag = "Settings",
    responses(
        (status = 200, description = "Key is configured", body = ApiKeyResponse),
        (status = 404, description = "Key is not configured", body = ErrorResponse)
    )
)]
pub async fn gemini_key(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let api_key = state
        .settings
        .read()
        .await
        .enhancement
        .resolve_api_key()
        .ok_or_else(|| AppError::NotFound("Gemini API key not configured".to_string()))?;

    Ok(Json(ApiKeyResponse { api_key }))
}
