use super::{AppConfig, ConfigError};

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "TRACE", "DISABLED",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream_config(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.runtime_worker_threads == Some(0) {
        return Err(validation_err(
            "server.runtime_worker_threads must be greater than 0 when set",
        ));
    }
    if server.runtime_max_blocking_threads == Some(0) {
        return Err(validation_err(
            "server.runtime_max_blocking_threads must be greater than 0 when set",
        ));
    }
    for origin in &server.cors_origins {
        let origin = origin.trim();
        if origin != "*" && http::HeaderValue::from_str(origin).is_err() {
            return Err(validation_err(format!(
                "server.cors_origins entry '{origin}' is not a valid header value"
            )));
        }
    }
    Ok(())
}

fn validate_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(validation_err(format!(
            "upstream.{field} must start with http:// or https://"
        )));
    }
    url::Url::parse(value)
        .map_err(|e| validation_err(format!("upstream.{field} is not a valid URL: {e}")))?;
    Ok(())
}

fn validate_upstream_config(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    validate_base_url("api_base", &upstream.api_base)?;
    validate_base_url("display_base", &upstream.display_base)?;

    let timeouts = [
        ("display_timeout_secs", upstream.display_timeout_secs),
        ("chat_timeout_secs", upstream.chat_timeout_secs),
        ("image_timeout_secs", upstream.image_timeout_secs),
        ("transcription_timeout_secs", upstream.transcription_timeout_secs),
        ("speech_timeout_secs", upstream.speech_timeout_secs),
    ];
    for (field, secs) in timeouts {
        if secs == 0 {
            return Err(validation_err(format!(
                "upstream.{field} must be greater than 0"
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "log_level '{}' is invalid. Must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
