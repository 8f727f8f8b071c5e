pub mod validation;

use std::path::Path;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Environment variable naming the config file path.
pub const CONFIG_PATH_ENV: &str = "A4F_PROXY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub base_path: String,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_max_blocking_threads: Option<usize>,
    /// Browser origins allowed to call the proxy. `*` allows any origin; empty disables CORS.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8001
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            base_path: String::new(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            runtime_max_blocking_threads: None,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Upstream a4f.co endpoints and per-operation timeouts (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_display_base")]
    pub display_base: String,
    #[serde(default = "default_display_timeout_secs")]
    pub display_timeout_secs: u64,
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,
    #[serde(default = "default_media_timeout_secs")]
    pub image_timeout_secs: u64,
    #[serde(default = "default_media_timeout_secs")]
    pub transcription_timeout_secs: u64,
    #[serde(default = "default_media_timeout_secs")]
    pub speech_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.a4f.co/v1".to_string()
}
fn default_display_base() -> String {
    "https://www.a4f.co/api".to_string()
}
fn default_display_timeout_secs() -> u64 {
    10
}
fn default_chat_timeout_secs() -> u64 {
    60
}
fn default_media_timeout_secs() -> u64 {
    120
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            display_base: default_display_base(),
            display_timeout_secs: default_display_timeout_secs(),
            chat_timeout_secs: default_chat_timeout_secs(),
            image_timeout_secs: default_media_timeout_secs(),
            transcription_timeout_secs: default_media_timeout_secs(),
            speech_timeout_secs: default_media_timeout_secs(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] or [`ConfigError::Validation`].
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load the file at `path`, falling back to built-in defaults when it does not exist.
///
/// The returned flag is `true` when defaults were used.
///
/// # Errors
///
/// Same as [`load_config`], except a missing file is not an error.
pub fn load_config_or_default(path: &str) -> Result<(AppConfig, bool), ConfigError> {
    if !Path::new(path).exists() {
        let config = AppConfig::default();
        validate_config(&config)?;
        return Ok((config, true));
    }
    load_config(path).map(|config| (config, false))
}

/// Resolve the config path from [`CONFIG_PATH_ENV`], defaulting to [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn config_path_from_env() -> String {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}
