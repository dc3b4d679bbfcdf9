//! Axum router configuration with middleware.
//!
//! API routes live under `/api/v1/`; the chat WebSocket is at `/ws/chat`.
//! Middleware: CORS, tracing.

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use courier_types::api::HealthReply;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Greeter
        .route("/greet", post(handlers::greet::say_hello))
        .route("/greet/again", post(handlers::greet::say_hello_again))
        // Tokens
        .route("/tokens", post(handlers::token::issue_token))
        .route("/tokens/validate", post(handlers::token::validate_token))
        // Files
        .route("/files/{*filename}", get(handlers::files::download_file))
        // Live chat sessions
        .route("/chat/sessions", get(handlers::chat::list_sessions))
        .route("/chat/sessions/{id}", delete(handlers::chat::abort_session));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws/chat", get(handlers::chat::chat_ws))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> Json<HealthReply> {
    Json(HealthReply {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
