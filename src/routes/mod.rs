//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) for the local desktop frontend
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // Challenges
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/challenge/next", get(http::http_next_challenge))
        .route(
            "/api/v1/challenges",
            get(http::http_list_challenges).post(http::http_create_challenge),
        )
        .route(
            "/api/v1/challenges/:id",
            get(http::http_get_challenge)
                .put(http::http_update_challenge)
                .delete(http::http_delete_challenge),
        )
        .route("/api/v1/categories", get(http::http_categories))
        // Progress
        .route("/api/v1/completions", post(http::http_post_completion))
        .route("/api/v1/stats", get(http::http_get_stats))
        .route("/api/v1/stats/reset", post(http::http_reset_stats))
        .route("/api/v1/reset", post(http::http_reset_application))
        .route("/api/v1/history", get(http::http_history))
        .route("/api/v1/history/categories", get(http::http_history_categories))
        .route("/api/v1/history/daily", get(http::http_history_daily))
        // Reminders
        .route(
            "/api/v1/settings/notifications",
            get(http::http_get_notifications).put(http::http_put_notifications),
        )
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
