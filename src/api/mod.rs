//! API layer - HTTP handlers and routing
//!
//! REST JSON under `/api/v1`, authenticated by the `session` cookie or a
//! bearer token. Locally stored uploads are served under the storage
//! public base URL.

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod common;
pub mod courses;
pub mod jobs;
pub mod messages;
pub mod middleware;
pub mod organizations;
pub mod profiles;
pub mod recommendations;
pub mod reports;
pub mod startups;
pub mod uploads;

#[cfg(test)]
mod tests;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::StorageDriver;

pub use middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser, RequestStats};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub avg_response_time_us: f64,
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = &state.request_stats;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: stats.uptime_seconds(),
        total_requests: stats.total_requests(),
        avg_response_time_us: stats.avg_response_time_us(),
    })
}

/// Build the main API router
pub fn build_api_router(state: &AppState) -> Router<AppState> {
    let admin_routes = admin::router().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::require_admin,
    ));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router())
        .nest("/profiles", profiles::router())
        .nest("/organizations", organizations::router())
        .nest("/courses", courses::router())
        .nest("/enrollments", courses::enrollments_router())
        .nest("/jobs", jobs::router())
        .nest("/applications", jobs::applications_router())
        .nest("/messages", messages::router())
        .nest("/startups", startups::router())
        .nest("/reports", reports::router())
        .nest("/uploads", uploads::router(state.config.upload.max_file_size))
        .nest("/recommendations", recommendations::router())
        .nest("/analytics", analytics::router())
        .nest("/admin", admin_routes)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(%origin, "Ignoring invalid CORS origin");
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new().nest("/api/v1", build_api_router(&state));

    let storage = &state.config.storage;
    let base = storage.public_base_url.trim_end_matches('/');
    if storage.driver == StorageDriver::Local && base.starts_with('/') {
        router = router.nest_service(base, ServeDir::new(&storage.local_path));
    }

    router
        .layer(cors_layer(&state.config.server.cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
