// Configuration loading and validation (config/client.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadError { path: PathBuf, message: String },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL for the one-shot action endpoints.
    pub http_url: String,
    /// WebSocket endpoint for server-pushed events.
    pub ws_url: String,
    /// Bound on one connection attempt, milliseconds.
    pub connect_timeout_ms: u64,
    /// Bound on one action request, milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            http_url: "http://127.0.0.1:5000".to_string(),
            ws_url: "ws://127.0.0.1:5000/events".to_string(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// First-retry delay; each consecutive failure doubles it.
    pub base_delay_ms: u64,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            base_delay_ms: 1_000,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Opaque difficulty dial forwarded to the authority, 1..=10.
    pub difficulty: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { difficulty: 5 }
    }
}

/// Raw deserialization target for the whole client.toml file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerConfig,
    connection: ConnectionConfig,
    engine: EngineConfig,
}

/// The assembled application config.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub connection: ConnectionConfig,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            connection: ConnectionConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.server.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.connection.base_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load config from `{base_dir}/config/client.toml`.
///
/// A missing file is not an error: every field has a documented default, so
/// a fresh checkout runs against a local authority out of the box.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("client.toml");

    let file: ConfigFile = if path.exists() {
        let raw = std::fs::read_to_string(&path).map_err(|err| ConfigError::ReadError {
            path: path.clone(),
            message: err.to_string(),
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
            path: path.clone(),
            source,
        })?
    } else {
        ConfigFile::default()
    };

    let config = Config {
        server: file.server,
        connection: file.connection,
        engine: file.engine,
    };
    validate(&config)?;
    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working
/// directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|err| ConfigError::ReadError {
        path: PathBuf::from("."),
        message: err.to_string(),
    })?;
    load_config_from(&cwd)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.http_url.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "server.http_url".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if !config.server.http_url.starts_with("http://")
        && !config.server.http_url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError {
            field: "server.http_url".to_string(),
            message: "must start with http:// or https://".to_string(),
        });
    }
    if !config.server.ws_url.starts_with("ws://") && !config.server.ws_url.starts_with("wss://") {
        return Err(ConfigError::ValidationError {
            field: "server.ws_url".to_string(),
            message: "must start with ws:// or wss://".to_string(),
        });
    }
    if config.server.connect_timeout_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.connect_timeout_ms".to_string(),
            message: "must be positive".to_string(),
        });
    }
    if config.connection.max_attempts == 0 {
        return Err(ConfigError::ValidationError {
            field: "connection.max_attempts".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.connection.base_delay_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "connection.base_delay_ms".to_string(),
            message: "must be positive".to_string(),
        });
    }
    if !(1..=10).contains(&config.engine.difficulty) {
        return Err(ConfigError::ValidationError {
            field: "engine.difficulty".to_string(),
            message: "must be between 1 and 10".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.connection.max_attempts, 5);
        assert_eq!(config.engine.difficulty, 5);
        assert_eq!(config.base_delay(), Duration::from_millis(1_000));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("chessmate-config-missing");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let config = load_config_from(&dir).unwrap();
        assert_eq!(config.server.http_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let dir = std::env::temp_dir().join("chessmate-config-partial");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("config")).unwrap();
        std::fs::write(
            dir.join("config").join("client.toml"),
            "[connection]\nmax_attempts = 3\n",
        )
        .unwrap();

        let config = load_config_from(&dir).unwrap();
        assert_eq!(config.connection.max_attempts, 3);
        // Untouched sections fall back to defaults.
        assert_eq!(config.connection.base_delay_ms, 1_000);
        assert_eq!(config.engine.difficulty, 5);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let dir = std::env::temp_dir().join("chessmate-config-bad");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("config")).unwrap();
        std::fs::write(dir.join("config").join("client.toml"), "not toml [").unwrap();

        assert!(matches!(
            load_config_from(&dir),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn zero_max_attempts_is_rejected() {
        let mut config = Config::default();
        config.connection.max_attempts = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::ValidationError { field, .. }) if field == "connection.max_attempts"
        ));
    }

    #[test]
    fn out_of_range_difficulty_is_rejected() {
        let mut config = Config::default();
        config.engine.difficulty = 11;
        assert!(validate(&config).is_err());
        config.engine.difficulty = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn bad_url_schemes_are_rejected() {
        let mut config = Config::default();
        config.server.ws_url = "http://127.0.0.1:5000/events".to_string();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.server.http_url = "ftp://example.com".to_string();
        assert!(validate(&config).is_err());
    }
}
