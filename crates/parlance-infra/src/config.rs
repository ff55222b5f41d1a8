//! Configuration loading for the data layer.
//!
//! Reads `config.toml` from the data directory and deserializes it into
//! [`DatabaseConfig`]. Falls back to sensible defaults when the file is
//! missing or malformed -- a broken config file must never stop startup.

use std::path::Path;

use parlance_types::config::DatabaseConfig;

/// Load database configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns defaults pointing at the standard
///   database path under `data_dir`.
/// - If the file exists but fails to read or parse, logs a warning and
///   returns the same defaults.
pub async fn load_database_config(data_dir: &Path) -> DatabaseConfig {
    let config_path = data_dir.join("config.toml");
    let fallback = DatabaseConfig::new(database_url_in(data_dir));

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return fallback;
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return fallback;
        }
    };

    match toml::from_str::<DatabaseConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            fallback
        }
    }
}

/// Returns the default database URL based on the `PARLANCE_DATA_DIR` env
/// var, falling back to `~/.parlance/parlance.db`.
pub fn default_database_url() -> String {
    let data_dir = std::env::var("PARLANCE_DATA_DIR").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{home}/.parlance")
    });
    format!("sqlite://{data_dir}/parlance.db")
}

fn database_url_in(data_dir: &Path) -> String {
    format!("sqlite://{}/parlance.db", data_dir.display())
}
