//! Configuration loader for courier.
//!
//! Reads `config.toml` from the data directory (`~/.courier/` in production)
//! and deserializes it into [`CourierConfig`]. Falls back to defaults when the
//! file is missing or malformed. An explicitly named file is loaded strictly.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use courier_types::config::CourierConfig;
use courier_types::error::ConfigError;

/// Environment variable that overrides `server.token.secret`.
pub const TOKEN_SECRET_ENV: &str = "COURIER_TOKEN_SECRET";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`CourierConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> CourierConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return CourierConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return CourierConfig::default();
        }
    };

    match toml::from_str::<CourierConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            CourierConfig::default()
        }
    }
}

/// Load a specific config file, surfacing any failure.
pub async fn load_config_file(path: &Path) -> Result<CourierConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

    toml::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Apply environment overrides from the process environment.
pub fn apply_env_overrides(config: &mut CourierConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply environment overrides using `lookup` as the environment.
pub fn apply_overrides_from(config: &mut CourierConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(secret) = lookup(TOKEN_SECRET_ENV).filter(|s| !s.is_empty()) {
        tracing::debug!("Using token secret from {TOKEN_SECRET_ENV}");
        config.server.token.secret = SecretString::from(secret);
    }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.listen_addr, "0.0.0.0:50051");
        assert!(config.server.token.uses_dev_secret());
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[server]
files_root = "/srv/files"

[server.transfer]
chunk_size = 4096
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.files_root, PathBuf::from("/srv/files"));
        assert_eq!(config.server.transfer.chunk_size, 4096);
        assert_eq!(config.server.chat.heartbeat_interval_ms, 5000);
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.transfer.chunk_size, 1024);
    }

    #[tokio::test]
    async fn explicit_file_errors_are_surfaced() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("absent.toml");
        assert!(matches!(
            load_config_file(&missing).await.unwrap_err(),
            ConfigError::Read { .. }
        ));

        let broken = tmp.path().join("broken.toml");
        tokio::fs::write(&broken, "[server\n").await.unwrap();
        assert!(matches!(
            load_config_file(&broken).await.unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn env_secret_overrides_file_value() {
        let mut config = CourierConfig::default();
        apply_overrides_from(&mut config, |key| {
            (key == TOKEN_SECRET_ENV).then(|| "from-env".to_string())
        });
        assert_eq!(config.server.token.secret.expose_secret(), "from-env");

        let mut untouched = CourierConfig::default();
        apply_overrides_from(&mut untouched, |_| Some(String::new()));
        assert!(untouched.server.token.uses_dev_secret());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/home/user/.courier");
        assert_eq!(
            resolve_relative(base, Path::new("auth.txt")),
            PathBuf::from("/home/user/.courier/auth.txt")
        );
        assert_eq!(
            resolve_relative(base, Path::new("/tmp/auth.txt")),
            PathBuf::from("/tmp/auth.txt")
        );
    }
}
