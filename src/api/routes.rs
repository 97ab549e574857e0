//! HTTP route definitions

use crate::api::models::*;
use crate::api::{admin_handlers, auth, handlers};
use crate::stats::UsageStats;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Image Studio API",
        version = "0.1.0",
        description = "Usage counters and admin endpoints backing the image studio client.",
        license(name = "MIT"),
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        handlers::health_check,
        handlers::record_page_view,
        handlers::record_image,
        handlers::gemini_key,
        admin_handlers::login,
        admin_handlers::logout,
        admin_handlers::check_auth,
        admin_handlers::admin_stats,
        admin_handlers::admin_settings,
        admin_handlers::update_gemini_key,
    ),
    components(schemas(
        SuccessResponse,
        ErrorResponse,
        LoginRequest,
        AuthStatusResponse,
        AdminSettingsResponse,
        SettingsUpdateResponse,
        ApiKeyResponse,
        HealthResponse,
        UsageStats,
    )),
    tags(
        (name = "Stats", description = "Usage counters"),
        (name = "Auth", description = "Admin login"),
        (name = "Admin", description = "Endpoints requiring an admin session"),
        (name = "Settings", description = "Client configuration"),
        (name = "Health", description = "Health and monitoring endpoints"),
    )
)]
pub struct ApiDoc;

/// Create the main application router
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/stats", get(admin_handlers::admin_stats))
        .route("/settings", get(admin_handlers::admin_settings))
        .route("/settings/gemini", post(admin_handlers::update_gemini_key))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let api_routes = Router::new()
        .route("/stats/view", get(handlers::record_page_view))
        .route("/stats/image", post(handlers::record_image))
        .route("/auth/login", post(admin_handlers::login))
        .route("/auth/logout", post(admin_handlers::logout))
        .route("/auth/check", get(admin_handlers::check_auth))
        .route("/gemini-key", get(handlers::gemini_key))
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .nest("/api", api_routes)
        .with_state(state)
        // mirrors the request origin so the session cookie is accepted cross-origin
        .layer(CorsLayer::very_permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}
