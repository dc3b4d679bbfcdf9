//! Configuration types for courier.
//!
//! `CourierConfig` represents the `config.toml` in the data directory. It has
//! a `[server]` table for the listening side and a `[client]` table for the
//! caller side. Every field has a default, so an empty file is valid.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::transfer::DEFAULT_CHUNK_SIZE;

/// Development signing secret. The server warns when it is still in use.
pub const DEV_SECRET: &str = "your-256-bit-secret";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server-side settings: listener, file root, token and chat parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory that `DownloadFile` names are resolved against.
    #[serde(default = "default_files_root")]
    pub files_root: PathBuf,

    /// Require a valid bearer token on download and chat calls.
    #[serde(default)]
    pub enforce_tokens: bool,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:50051".to_string()
}

fn default_files_root() -> PathBuf {
    PathBuf::from("files")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            files_root: default_files_root(),
            enforce_tokens: false,
            token: TokenConfig::default(),
            transfer: TransferConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// Token authority settings.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Shared HMAC secret. Never serialized back out.
    #[serde(
        default = "default_secret",
        deserialize_with = "deserialize_secret",
        skip_serializing
    )]
    pub secret: SecretString,

    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Token lifetime in seconds (15 minutes by default).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_secret() -> SecretString {
    SecretString::from(DEV_SECRET)
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_issuer() -> String {
    "auth_server".to_string()
}

fn default_ttl_secs() -> u64 {
    15 * 60
}

impl TokenConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret.expose_secret() == DEV_SECRET
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            issuer: default_issuer(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Clone for TokenConfig {
    fn clone(&self) -> Self {
        Self {
            secret: SecretString::from(self.secret.expose_secret().to_string()),
            issuer: self.issuer.clone(),
            ttl_secs: self.ttl_secs,
        }
    }
}

/// Chunked transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Duplex chat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_heartbeat_user")]
    pub heartbeat_user: String,

    #[serde(default = "default_heartbeat_message")]
    pub heartbeat_message: String,

    /// Capacity of the per-session outbound queue feeding the writer task.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

fn default_heartbeat_user() -> String {
    "Server".to_string()
}

fn default_heartbeat_message() -> String {
    "Pong from server".to_string()
}

fn default_outbound_capacity() -> usize {
    64
}

impl ChatConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        // A zero interval would make `tokio::time::interval` panic.
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_user: default_heartbeat_user(),
            heartbeat_message: default_heartbeat_message(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

/// Caller-side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Two-line credential file (token, then client id). Relative paths are
    /// resolved against the data directory.
    #[serde(default = "default_credential_file")]
    pub credential_file: PathBuf,

    /// Prefix for downloaded files written to the working directory.
    #[serde(default = "default_download_prefix")]
    pub download_prefix: String,
}

fn default_server_url() -> String {
    "http://127.0.0.1:50051".to_string()
}

fn default_credential_file() -> PathBuf {
    PathBuf::from("auth.txt")
}

fn default_download_prefix() -> String {
    "downloaded_".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            credential_file: default_credential_file(),
            download_prefix: default_download_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = CourierConfig::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:50051");
        assert_eq!(config.server.transfer.chunk_size, 1024);
        assert_eq!(config.server.token.ttl_secs, 900);
        assert_eq!(config.server.token.issuer, "auth_server");
        assert_eq!(config.server.chat.heartbeat_interval(), Duration::from_secs(5));
        assert!(config.server.token.uses_dev_secret());
        assert!(!config.server.enforce_tokens);
        assert_eq!(config.client.credential_file, PathBuf::from("auth.txt"));
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: CourierConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.chat.heartbeat_message, "Pong from server");
        assert_eq!(config.client.download_prefix, "downloaded_");
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config: CourierConfig = toml::from_str(
            r#"
[server]
listen_addr = "127.0.0.1:9000"
enforce_tokens = true

[server.token]
secret = "s3cret"
ttl_secs = 60

[server.chat]
heartbeat_interval_ms = 250

[client]
server_url = "http://example.test:9000"
"#,
        )
        .unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
        assert!(config.server.enforce_tokens);
        assert_eq!(config.server.token.secret.expose_secret(), "s3cret");
        assert!(!config.server.token.uses_dev_secret());
        assert_eq!(config.server.token.ttl(), Duration::from_secs(60));
        assert_eq!(config.server.token.issuer, "auth_server");
        assert_eq!(config.server.chat.heartbeat_interval_ms, 250);
        assert_eq!(config.server.chat.heartbeat_user, "Server");
        assert_eq!(config.client.server_url, "http://example.test:9000");
    }

    #[test]
    fn serialized_config_omits_secret() {
        let mut config = CourierConfig::default();
        config.server.token.secret = SecretString::from("do-not-leak");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("do-not-leak"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn zero_heartbeat_interval_is_clamped() {
        let chat = ChatConfig {
            heartbeat_interval_ms: 0,
            ..ChatConfig::default()
        };
        assert_eq!(chat.heartbeat_interval(), Duration::from_millis(1));
    }
}
