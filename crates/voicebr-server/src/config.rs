//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use voicebr_nexmo::{BroadcastConfig, NexmoConfig, Prompts};

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where directories and recordings live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Voice platform credentials and limits.
    #[serde(default)]
    pub nexmo: NexmoConfig,

    /// Outbound call policy.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Text spoken on inbound and outbound legs.
    #[serde(default)]
    pub prompts: Prompts,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL of this server. Every webhook URL
    /// handed to the voice platform is built from it.
    #[serde(default = "default_external_origin")]
    pub external_origin: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding `whitelist.csv`, `broadcast.csv` and `recs/`.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "voicebr_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_external_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_root_dir() -> String {
    "data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            external_origin: default_external_origin(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `VOICEBR_HOST` overrides `server.host`
/// - `VOICEBR_PORT` overrides `server.port`
/// - `VOICEBR_EXTERNAL_ORIGIN` overrides `server.external_origin`
/// - `VOICEBR_STORAGE_DIR` overrides `storage.root_dir`
/// - `VOICEBR_LOG_LEVEL` overrides `logging.level`
/// - `VOICEBR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `VOICEBR_APP_ID` overrides `nexmo.application_id`
/// - `VOICEBR_PRIVATE_KEY_PATH` overrides `nexmo.private_key_path`
/// - `VOICEBR_NUMBER` overrides `nexmo.number`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("VOICEBR_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("VOICEBR_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(origin) = var("VOICEBR_EXTERNAL_ORIGIN") {
        config.server.external_origin = origin;
    }
    if let Some(dir) = var("VOICEBR_STORAGE_DIR") {
        config.storage.root_dir = dir;
    }
    if let Some(level) = var("VOICEBR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("VOICEBR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(app_id) = var("VOICEBR_APP_ID") {
        config.nexmo.application_id = app_id;
    }
    if let Some(path) = var("VOICEBR_PRIVATE_KEY_PATH") {
        config.nexmo.private_key_path = Some(path.into());
    }
    if let Some(number) = var("VOICEBR_NUMBER") {
        config.nexmo.number = number;
    }
}
