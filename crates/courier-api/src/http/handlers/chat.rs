//! Duplex chat over WebSocket, plus the live-session registry endpoints.
//!
//! Endpoints:
//! - GET    /ws/chat                     - Chat (WebSocket upgrade)
//! - GET    /api/v1/chat/sessions        - List live sessions
//! - DELETE /api/v1/chat/sessions/{id}   - Abort a live session
//!
//! Each upgraded socket is split into a frame sink and a frame stream and
//! handed to [`ChatSession::serve`]. Text frames carry JSON `ChatFrame`s;
//! binary, ping and pong frames are ignored and a close frame ends the
//! inbound direction.

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{future, SinkExt, StreamExt};
use uuid::Uuid;

use courier_core::chat::{BoxFrameSink, BoxFrameStream, ChatSession};
use courier_types::api::{ChatSessionClosed, ChatSessionInfo};
use courier_types::chat::ChatFrame;
use courier_types::error::ChatError;

use crate::http::error::AppError;
use crate::http::extractors::auth::TokenGate;
use crate::http::response::ApiResponse;
use crate::state::{ActiveChat, AppState};

/// GET /ws/chat
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    gate: TokenGate,
) -> impl IntoResponse {
    let client_id = gate.client_id().map(str::to_string);
    ws.on_upgrade(move |socket| handle_chat(socket, state, client_id))
}

async fn handle_chat(socket: WebSocket, state: AppState, client_id: Option<String>) {
    let (sink, stream) = frame_transport(socket);

    let session = ChatSession::new(state.shutdown.child_token());
    let session_id = session.id();
    state.chat_sessions.insert(
        session_id,
        ActiveChat {
            cancel: session.cancellation(),
            client_id: client_id.clone(),
            started_at: chrono::Utc::now(),
        },
    );
    tracing::debug!(%session_id, client_id = client_id.as_deref().unwrap_or("-"), "chat connected");

    let result = session.serve(&state.chat_config, sink, stream, None).await;
    state.chat_sessions.remove(&session_id);

    match result {
        Ok(summary) => tracing::debug!(
            %session_id,
            received = summary.received,
            sent = summary.sent,
            "chat disconnected"
        ),
        Err(e) => tracing::warn!(%session_id, error = %e, "chat session ended with error"),
    }
}

/// Adapt a WebSocket into the chat frame transport.
fn frame_transport(socket: WebSocket) -> (BoxFrameSink, BoxFrameStream) {
    let (ws_sender, ws_receiver) = socket.split();

    let sink = ws_sender
        .sink_map_err(ChatError::transport)
        .with(|frame: ChatFrame| future::ready(frame.encode().map(|text| Message::Text(text.into()))));

    let stream = ws_receiver
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(ChatFrame::decode(text.as_str())),
                Ok(_) => None,
                Err(e) => Some(Err(ChatError::transport(e))),
            })
        });

    (Box::pin(sink), Box::pin(stream))
}

/// GET /api/v1/chat/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    _gate: TokenGate,
) -> Result<Json<ApiResponse<Vec<ChatSessionInfo>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let mut sessions: Vec<ChatSessionInfo> = state
        .chat_sessions
        .iter()
        .map(|entry| ChatSessionInfo {
            session_id: entry.key().to_string(),
            client_id: entry.client_id.clone(),
            started_at: entry.started_at,
        })
        .collect();
    sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(sessions, request_id, elapsed)))
}

/// DELETE /api/v1/chat/sessions/{id}
pub async fn abort_session(
    State(state): State<AppState>,
    _gate: TokenGate,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ChatSessionClosed>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let session_id = parse_uuid(&id)?;

    if !state.cancel_chat(&session_id) {
        return Err(AppError::NotFound(format!("no live chat session {session_id}")));
    }
    tracing::info!(%session_id, "chat session aborted");

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        ChatSessionClosed {
            session_id: session_id.to_string(),
            cancelled: true,
        },
        request_id,
        elapsed,
    )))
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}
