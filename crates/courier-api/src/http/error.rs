//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use courier_types::error::{ChatError, ErrorCode, GreetError, TokenError, TransferError};

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Greet(GreetError),
    Token(TokenError),
    Transfer(TransferError),
    Chat(ChatError),
    /// Missing or rejected credentials.
    Unauthorized(String),
    Validation(String),
    NotFound(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Greet(e) => e.code(),
            AppError::Token(e) => e.code(),
            AppError::Transfer(e) => e.code(),
            AppError::Chat(e) => e.code(),
            AppError::Unauthorized(_) => ErrorCode::Unauthenticated,
            AppError::Validation(_) => ErrorCode::InvalidArgument,
            AppError::NotFound(_) => ErrorCode::NotFound,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Greet(e) => e.to_string(),
            AppError::Token(e) => e.to_string(),
            AppError::Transfer(e) => e.to_string(),
            AppError::Chat(e) => e.to_string(),
            AppError::Unauthorized(msg) | AppError::Validation(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
        }
    }
}

/// HTTP status for each wire code.
///
/// `CANCELLED` uses the non-standard 499 (client closed request).
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthenticated | ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Cancelled => {
            StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Inverse of [`status_for`], for bodies that carry no envelope.
pub fn code_for_status(status: u16) -> ErrorCode {
    match status {
        400 => ErrorCode::InvalidArgument,
        401 | 403 => ErrorCode::Unauthenticated,
        404 => ErrorCode::NotFound,
        499 => ErrorCode::Cancelled,
        502..=504 => ErrorCode::Unavailable,
        _ => ErrorCode::Internal,
    }
}

impl From<GreetError> for AppError {
    fn from(e: GreetError) -> Self {
        AppError::Greet(e)
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Token(e)
    }
}

impl From<TransferError> for AppError {
    fn from(e: TransferError) -> Self {
        AppError::Transfer(e)
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = self.message();
        match code {
            ErrorCode::Internal => tracing::error!(%code, %message, "request failed"),
            _ => tracing::debug!(%code, %message, "request rejected"),
        }

        ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string(), 0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (AppError::from(GreetError::EmptyName), StatusCode::BAD_REQUEST),
            (AppError::from(TokenError::BadSignature), StatusCode::UNAUTHORIZED),
            (
                AppError::from(TokenError::Malformed("x".into())),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::from(TransferError::NotFound("a.txt".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(TransferError::OutsideRoot("../a".into())),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn cancelled_is_499() {
        assert_eq!(status_for(ErrorCode::Cancelled).as_u16(), 499);
        assert_eq!(code_for_status(499), ErrorCode::Cancelled);
    }

    #[test]
    fn status_round_trips_for_client_codes() {
        for code in [
            ErrorCode::InvalidArgument,
            ErrorCode::NotFound,
            ErrorCode::Cancelled,
            ErrorCode::Internal,
        ] {
            assert_eq!(code_for_status(status_for(code).as_u16()), code);
        }
        assert_eq!(code_for_status(503), ErrorCode::Unavailable);
    }
}
