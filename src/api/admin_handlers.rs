//! Admin login and protected admin endpoints

use crate::api::auth::{clear_cookie_header, session_cookie, session_cookie_header, verify_password};
use crate::api::models::{
    AdminSettingsResponse, AuthStatusResponse, ErrorResponse, LoginRequest, SettingsUpdateResponse,
    SuccessResponse,
};
use crate::error::AppError;
use crate::stats::UsageStats;
use crate::AppState;
use axum::{
    extract::{FromRequest, Request, State},
    http::{
        header::{CONTENT_TYPE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::IntoResponse,
    Form, Json,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Read the login body as JSON or urlencoded form. Anything unreadable counts as empty.
async fn read_login(request: Request) -> LoginRequest {
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.starts_with("application/x-www-form-urlencoded"));

    let parsed = if is_form {
        Form::<LoginRequest>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .ok()
    } else {
        Json::<LoginRequest>::from_request(request, &())
            .await
            .map(|Json(body)| body)
            .ok()
    };
    parsed.unwrap_or_default()
}

/// Log in with the shared admin password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body(
        content = LoginRequest,
        content_type = "application/json",
        description = "Also accepted as application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, description = "Logged in, session cookie set", body = SuccessResponse),
        (status = 400, description = "Password missing", body = ErrorResponse),
        (status = 401, description = "Wrong password", body = ErrorResponse),
        (status = 500, description = "No admin password configured", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    let password = read_login(request)
        .await
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Password required".to_string()))?;

    let (expected_hash, cookie_name) = {
        let config = state.settings.read().await;
        (
            config.admin.password_hash.clone(),
            config.admin.cookie_name.clone(),
        )
    };

    let expected_hash = expected_hash
        .filter(|hash| !hash.trim().is_empty())
        .ok_or_else(|| AppError::NotConfigured("Admin password not configured".to_string()))?;

    if !verify_password(&password, &expected_hash) {
        warn!("Rejected admin login");
        return Err(AppError::InvalidPassword);
    }

    let session_id = state.sessions.create();
    info!("Admin logged in");

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        session_cookie_header(&cookie_name, &session_id, state.sessions.ttl_secs()),
    );
    Ok((
        StatusCode::OK,
        headers,
        Json(SuccessResponse::with_message("Login successful")),
    ))
}

/// End the current admin session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Logged out", body = SuccessResponse)
    )
)]
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let cookie_name = state.settings.read().await.admin.cookie_name.clone();
    if let Some(id) = session_cookie(&headers, &cookie_name) {
        state.sessions.remove(&id);
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, clear_cookie_header(&cookie_name));
    (response_headers, Json(SuccessResponse::with_message("Logged out")))
}

/// Whether the caller holds a valid admin session
#[utoipa::path(
    get,
    path = "/api/auth/check",
    tag = "Auth",
    responses(
        (status = 200, description = "Session state", body = AuthStatusResponse)
    )
)]
pub async fn check_auth(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<AuthStatusResponse> {
    let cookie_name = state.settings.read().await.admin.cookie_name.clone();
    let is_authenticated = session_cookie(&headers, &cookie_name)
        .map_or(false, |id| state.sessions.is_valid(&id));

    Json(AuthStatusResponse { is_authenticated })
}

/// Usage counters
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "Current counters", body = UsageStats),
        (status = 401, description = "No admin session", body = ErrorResponse)
    )
)]
pub async fn admin_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UsageStats>, AppError> {
    let stats = state.stats.clone();
    let counters = tokio::task::spawn_blocking(move || stats.read())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read usage counters: {}", e)))?;
    Ok(Json(counters))
}

/// Which secrets are configured, masked
#[utoipa::path(
    get,
    path = "/api/admin/settings",
    tag = "Admin",
    responses(
        (status = 200, description = "Masked settings", body = AdminSettingsResponse),
        (status = 401, description = "No admin session", body = ErrorResponse)
    )
)]
pub async fn admin_settings(State(state): State<Arc<AppState>>) -> Json<AdminSettingsResponse> {
    let configured = state
        .settings
        .read()
        .await
        .enhancement
        .resolve_api_key()
        .is_some();

    Json(AdminSettingsResponse {
        gemini_api_key: if configured { "***SET***" } else { "Not set" }.to_string(),
    })
}

/// Keys cannot be changed at runtime
#[utoipa::path(
    post,
    path = "/api/admin/settings/gemini",
    tag = "Admin",
    responses(
        (status = 200, description = "Key is managed through the environment", body = SettingsUpdateResponse),
        (status = 401, description = "No admin session", body = ErrorResponse)
    )
)]
pub async fn update_gemini_key(State(state): State<Arc<AppState>>) -> Json<SettingsUpdateResponse> {
    let env_var = state.settings.read().await.enhancement.api_key_env.clone();

    Json(SettingsUpdateResponse {
        error: "API keys are managed through environment variables".to_string(),
        message: format!(
            "Set {} in the server environment and restart the server.",
            env_var
        ),
    })
}
