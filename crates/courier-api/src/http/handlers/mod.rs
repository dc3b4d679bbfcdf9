//! HTTP request handlers.

pub mod chat;
pub mod files;
pub mod greet;
pub mod token;
