use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status taxonomy shared by every call on the wire.
///
/// Each domain error maps onto exactly one code; the HTTP layer derives the
/// response status from it and clients rebuild it from the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    Unauthenticated,
    InvalidToken,
    NotFound,
    Unavailable,
    Cancelled,
    Internal,
}

impl ErrorCode {
    /// Stable wire name (e.g. `NOT_FOUND`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Parse a wire name back into a code. Unknown names map to `Internal`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "INVALID_ARGUMENT" => ErrorCode::InvalidArgument,
            "UNAUTHENTICATED" => ErrorCode::Unauthenticated,
            "INVALID_TOKEN" => ErrorCode::InvalidToken,
            "NOT_FOUND" => ErrorCode::NotFound,
            "UNAVAILABLE" => ErrorCode::Unavailable,
            "CANCELLED" => ErrorCode::Cancelled,
            _ => ErrorCode::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the unary greeting calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GreetError {
    #[error("name must not be empty")]
    EmptyName,
}

impl GreetError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

/// Errors from token issuance and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("client_id must not be empty")]
    EmptyClientId,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported token algorithm: '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("token signature verification failed")]
    BadSignature,

    #[error("token issuer mismatch: expected '{expected}', got '{actual}'")]
    WrongIssuer { expected: String, actual: String },

    #[error("token expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("signing error: {0}")]
    Signing(String),
}

impl TokenError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TokenError::EmptyClientId => ErrorCode::InvalidArgument,
            TokenError::Malformed(_) | TokenError::UnsupportedAlgorithm(_) => {
                ErrorCode::InvalidToken
            }
            TokenError::BadSignature
            | TokenError::WrongIssuer { .. }
            | TokenError::Expired { .. } => ErrorCode::Unauthenticated,
            TokenError::Signing(_) => ErrorCode::Internal,
        }
    }
}

/// Errors from the chunked transfer engine and its file sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("filename must not be empty")]
    EmptyName,

    #[error("path escapes the file root: '{0}'")]
    OutsideRoot(String),

    #[error("file not found: '{0}'")]
    NotFound(String),

    #[error("read failed after {bytes_sent} bytes: {message}")]
    Io { bytes_sent: u64, message: String },
}

impl TransferError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TransferError::EmptyName | TransferError::OutsideRoot(_) => {
                ErrorCode::InvalidArgument
            }
            TransferError::NotFound(_) => ErrorCode::NotFound,
            TransferError::Io { .. } => ErrorCode::Internal,
        }
    }
}

/// Errors from the duplex chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode chat frame: {0}")]
    Decode(String),

    #[error("failed to encode chat frame: {0}")]
    Encode(String),

    #[error("chat session cancelled")]
    Cancelled,

    #[error("chat task failed: {0}")]
    TaskFailed(String),
}

impl ChatError {
    pub fn transport(err: impl fmt::Display) -> Self {
        ChatError::Transport(err.to_string())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ChatError::Transport(_) => ErrorCode::Unavailable,
            ChatError::Decode(_) => ErrorCode::InvalidArgument,
            ChatError::Encode(_) | ChatError::TaskFailed(_) => ErrorCode::Internal,
            ChatError::Cancelled => ErrorCode::Cancelled,
        }
    }
}

/// Errors surfaced by the session client and its service adapters.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error status.
    #[error("{code}: {message}")]
    Status { code: ErrorCode, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store error: {0}")]
    Credentials(String),

    /// Some chunks were written before the stream failed. They sit in
    /// `partial`; the requested destination is untouched.
    #[error("transfer failed after {bytes_written} bytes: {source}")]
    PartialTransfer {
        bytes_written: u64,
        partial: PathBuf,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    pub fn status(code: ErrorCode, message: impl Into<String>) -> Self {
        ClientError::Status {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Status { code, .. } => *code,
            ClientError::Transport(_) => ErrorCode::Unavailable,
            ClientError::Transfer(e) => e.code(),
            ClientError::Chat(e) => e.code(),
            ClientError::Io(_) | ClientError::Credentials(_) => ErrorCode::Internal,
            ClientError::PartialTransfer { source, .. } => source.code(),
        }
    }
}

/// Errors loading an explicitly requested configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_map_to_taxonomy() {
        assert_eq!(TokenError::EmptyClientId.code(), ErrorCode::InvalidArgument);
        assert_eq!(
            TokenError::Malformed("x".to_string()).code(),
            ErrorCode::InvalidToken
        );
        assert_eq!(TokenError::BadSignature.code(), ErrorCode::Unauthenticated);
        assert_eq!(
            TokenError::Expired {
                expired_at: Utc::now()
            }
            .code(),
            ErrorCode::Unauthenticated
        );
    }

    #[test]
    fn transfer_not_found_display() {
        let err = TransferError::NotFound("a.txt".to_string());
        assert_eq!(err.to_string(), "file not found: 'a.txt'");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn error_code_wire_names_roundtrip() {
        for code in [
            ErrorCode::InvalidArgument,
            ErrorCode::Unauthenticated,
            ErrorCode::InvalidToken,
            ErrorCode::NotFound,
            ErrorCode::Unavailable,
            ErrorCode::Cancelled,
            ErrorCode::Internal,
        ] {
            assert_eq!(ErrorCode::from_wire(code.as_str()), code);
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
        assert_eq!(ErrorCode::from_wire("TEAPOT"), ErrorCode::Internal);
    }

    #[test]
    fn partial_transfer_keeps_source_code() {
        let err = ClientError::PartialTransfer {
            bytes_written: 2048,
            partial: PathBuf::from("report.bin.part"),
            source: Box::new(ClientError::Transport("reset".to_string())),
        };
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert!(err.to_string().contains("2048"));
    }
}
