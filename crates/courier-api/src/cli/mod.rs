//! CLI command definitions for the `courier` binary.
//!
//! `courier serve` runs the server; every other command is a client of a
//! running server (`--server`, or `client.server_url` from the config).

pub mod auth;
pub mod chat;
pub mod download;
pub mod menu;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use courier_infra::credentials::FileCredentialStore;

use crate::client::{self, RemoteClient};

/// Greetings, session tokens, chunked downloads and duplex chat.
#[derive(Parser)]
#[command(name = "courier", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Config file to load instead of `<data dir>/config.toml`.
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server base URL for client commands.
    #[arg(long, global = true, env = "COURIER_SERVER")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server.
    Serve {
        /// Listen address (default from config: 0.0.0.0:50051).
        #[arg(long)]
        addr: Option<String>,

        /// Directory downloads are served from.
        #[arg(long)]
        files_root: Option<PathBuf>,

        /// Reject download and chat calls without a valid token.
        #[arg(long)]
        enforce_tokens: bool,
    },

    /// Send a greeting.
    Greet {
        name: String,

        /// Use the returning-user greeting.
        #[arg(long)]
        again: bool,
    },

    /// Register or log in and store the issued token.
    Login {
        /// Client id; prompted for when omitted.
        username: Option<String>,

        /// Register as a new user instead of logging in.
        #[arg(long)]
        register: bool,
    },

    /// Remove stored credentials.
    Logout,

    /// Issue a fresh token for the stored client id (not stored).
    Token,

    /// Validate a token (the stored one by default).
    Validate {
        token: Option<String>,
    },

    /// Download a file from the server.
    Download {
        filename: String,

        /// Destination path (default: `<download prefix><file name>`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Chat with the server. Type `exit` or `quit` to leave.
    Chat,

    /// Interactive menu: log in, then download, chat, and manage tokens.
    Menu,
}

/// Settings shared by the client commands.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub server_url: String,
    pub credential_file: PathBuf,
    pub download_prefix: String,
    pub json: bool,
}

impl ClientContext {
    pub fn connect(&self) -> anyhow::Result<RemoteClient> {
        let store = FileCredentialStore::new(&self.credential_file);
        Ok(client::connect(&self.server_url, store)?)
    }
}
