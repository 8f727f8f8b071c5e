use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::ProxyError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REDIRECTS: usize = 5;

/// Build the pooled client shared by the model directory and the gateway.
///
/// No client-wide timeout is set: every upstream call carries its own.
///
/// # Errors
///
/// Returns `ProxyError::Config` when the TLS backend cannot be initialised.
pub fn build_http_client(config: &ServerConfig) -> Result<reqwest::Client, ProxyError> {
    let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
    };

    reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(concat!("a4f-proxy/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| ProxyError::Config(format!("Failed to build HTTP client: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults_and_disabled_idle_timeout() {
        assert!(build_http_client(&ServerConfig::default()).is_ok());
        let config = ServerConfig {
            http_pool_idle_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert!(build_http_client(&config).is_ok());
    }
}
