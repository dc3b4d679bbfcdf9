//! File download handler.
//!
//! Endpoint:
//! - GET /api/v1/files/{*filename} - DownloadFile
//!
//! A successful download is not enveloped: the body is the file, streamed one
//! chunk per body frame. Errors that happen before the first chunk (missing
//! file, root escape) are ordinary envelope errors. A read failure after that
//! aborts the body, which the client sees as a truncated transfer.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use crate::http::error::AppError;
use crate::http::extractors::auth::TokenGate;
use crate::state::AppState;

/// GET /api/v1/files/{*filename}
pub async fn download_file(
    State(state): State<AppState>,
    gate: TokenGate,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let chunks = state.transfer.download(&filename).await?;
    tracing::info!(
        filename = %filename,
        client_id = gate.client_id().unwrap_or("-"),
        chunk_size = state.transfer.chunk_size(),
        "download started"
    );

    let label = filename.clone();
    let body = Body::from_stream(chunks.map(move |chunk| {
        if let Err(e) = &chunk {
            tracing::warn!(filename = %label, error = %e, "download aborted");
        }
        chunk.map(|c| c.content)
    }));

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&filename)),
        ],
        body,
    )
        .into_response())
}

fn content_disposition(filename: &str) -> String {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    let safe: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
