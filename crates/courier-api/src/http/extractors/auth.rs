//! Session token extractor.
//!
//! Reads `Authorization: Bearer <token>` and validates it with the server's
//! token authority. Whether a missing or bad token rejects the request
//! depends on `AppState::enforce_tokens`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use courier_types::token::Claims;

use crate::http::error::AppError;
use crate::state::AppState;

/// Claims of the caller's token, if one was presented and accepted.
///
/// With enforcement on, extraction fails unless a valid token is present, so
/// the inner value is always `Some`.
#[derive(Debug, Clone)]
pub struct TokenGate(pub Option<Claims>);

impl TokenGate {
    pub fn client_id(&self) -> Option<&str> {
        self.0.as_ref().map(|claims| claims.sub.as_str())
    }
}

impl FromRequestParts<AppState> for TokenGate {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match extract_bearer(parts) {
            Ok(token) => token,
            Err(e) if state.enforce_tokens => return Err(e),
            Err(e) => {
                tracing::debug!(error = ?e, "ignoring unusable authorization header");
                return Ok(TokenGate(None));
            }
        };

        match (token, state.enforce_tokens) {
            (None, false) => Ok(TokenGate(None)),
            (None, true) => Err(AppError::Unauthorized(
                "Missing session token. Provide via 'Authorization: Bearer <token>' header."
                    .to_string(),
            )),
            (Some(token), enforce) => match state.authority.validate(&token) {
                Ok(claims) => Ok(TokenGate(Some(claims))),
                Err(e) if enforce => Err(e.into()),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring invalid session token");
                    Ok(TokenGate(None))
                }
            },
        }
    }
}

/// Extract the bearer token from the `Authorization` header.
fn extract_bearer(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(auth) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let auth_str = auth.to_str().map_err(|_| {
        AppError::Unauthorized("Invalid Authorization header encoding".to_string())
    })?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        _ => Err(AppError::Unauthorized(
            "Authorization header must be 'Bearer <token>'".to_string(),
        )),
    }
}
