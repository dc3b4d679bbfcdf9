//! Infrastructure layer for courier.
//!
//! Implements the ports defined in `courier-core` against the local machine:
//! root-confined file access for downloads, the two-line credential file, and
//! the `config.toml` loader.

pub mod config;
pub mod credentials;
pub mod filesystem;
