//! Token issuance and validation handlers.
//!
//! Endpoints:
//! - POST /api/v1/tokens           - IssueToken
//! - POST /api/v1/tokens/validate  - ValidateToken

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use courier_types::api::{TokenReply, TokenRequest, ValidateRequest};
use courier_types::token::Claims;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/tokens
pub async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<ApiResponse<TokenReply>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let issued = state.authority.issue(&body.client_id)?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        TokenReply {
            token: issued.token.into_inner(),
        },
        request_id,
        elapsed,
    )))
}

/// POST /api/v1/tokens/validate
pub async fn validate_token(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<ApiResponse<Claims>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let claims = state.authority.validate(&body.token)?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(claims, request_id, elapsed)))
}
