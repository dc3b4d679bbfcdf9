//! Session layer for courier.
//!
//! This crate holds the parts that need real design: token issuance and
//! validation, the chunked transfer state machine, and the duplex chat
//! protocol with its task coordination. It also defines the "ports" the
//! infrastructure and transport layers implement: [`transfer::FileSource`],
//! [`client::CredentialStore`], and the client-side service contracts.
//!
//! It depends only on `courier-types` -- never on `courier-infra` or any
//! HTTP/WebSocket crate.

pub mod auth;
pub mod chat;
pub mod client;
pub mod greeter;
pub mod transfer;
