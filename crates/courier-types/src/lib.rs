//! Shared domain types for courier.
//!
//! This crate contains the types that flow between the token authority, the
//! chunked transfer engine, the duplex chat channel, and the session client:
//! claims, file chunks, chat messages and frames, error enums, and
//! configuration.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, secrecy.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod token;
pub mod transfer;
