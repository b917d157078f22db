//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`. Routes are grouped by the access
//! they need: public (session optional), protected (session required) and
//! admin.

pub mod admin;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod common;
pub mod contents;
pub mod decks;
pub mod error_notebook;
pub mod exams;
pub mod mentorships;
pub mod middleware;
pub mod planner;
pub mod questions;
pub mod responses;
pub mod review_sessions;
pub mod reviews;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::DatabasePool;

pub use middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser, RequestStats};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    database: &'static str,
}

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .nest("/admin/categories", categories::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need a session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/contents", contents::protected_router())
        .merge(comments::protected_router())
        .merge(decks::protected_router())
        .nest("/questions", questions::router())
        .nest("/unified-reviews", reviews::router())
        .nest("/error-notebook", error_notebook::router())
        .merge(exams::router())
        .merge(mentorships::protected_router())
        .nest("/planner", planner::router())
        .nest("/review-sessions", review_sessions::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes; a valid session is attached when present
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .nest("/categories", categories::router())
        .nest("/contents", contents::public_router())
        .merge(comments::public_router())
        .merge(decks::public_router())
        .merge(mentorships::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ))
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .fallback(not_found)
        .layer(cors_layer(cors_origin))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        // Outermost, so every request is counted
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

/// Cookie authentication needs an explicit origin; `*` allows any origin
/// without credentials.
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    match origin.trim() {
        "*" => cors.allow_origin(Any),
        origin => match origin.parse::<HeaderValue>() {
            Ok(value) => cors.allow_origin(value).allow_credentials(true),
            Err(_) => {
                tracing::warn!("Invalid CORS origin {:?}, allowing any origin", origin);
                cors.allow_origin(Any)
            }
        },
    }
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_up = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check: {:#}", e);
            false
        }
    };
    Json(HealthResponse {
        status: if database_up { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.request_stats.uptime_seconds(),
        database: if database_up { "ok" } else { "unavailable" },
    })
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Route not found")
}
