//! HTTP/WebSocket API layer for courier.
//!
//! Axum-based API at `/api/v1/` with optional bearer-token gating, envelope
//! response format, and CORS support. The chat channel is a WebSocket at
//! `/ws/chat`.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
