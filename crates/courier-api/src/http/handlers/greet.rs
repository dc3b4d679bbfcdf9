//! Greeting handlers.
//!
//! Endpoints:
//! - POST /api/v1/greet        - SayHello
//! - POST /api/v1/greet/again  - SayHelloAgain

use std::time::Instant;

use axum::Json;
use uuid::Uuid;

use courier_core::greeter;
use courier_types::api::{GreetReply, GreetRequest};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;

/// POST /api/v1/greet
pub async fn say_hello(
    Json(body): Json<GreetRequest>,
) -> Result<Json<ApiResponse<GreetReply>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let message = greeter::say_hello(&body.name)?;
    tracing::info!(name = %body.name.trim(), "registered greeting");

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(GreetReply { message }, request_id, elapsed)))
}

/// POST /api/v1/greet/again
pub async fn say_hello_again(
    Json(body): Json<GreetRequest>,
) -> Result<Json<ApiResponse<GreetReply>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let message = greeter::say_hello_again(&body.name)?;
    tracing::info!(name = %body.name.trim(), "returning greeting");

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(GreetReply { message }, request_id, elapsed)))
}
