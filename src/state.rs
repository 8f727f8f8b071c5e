use tower_http::cors::CorsLayer;

use crate::catalog::ModelDirectory;
use crate::config::AppConfig;
use crate::error::ProxyError;
use crate::gateway::Gateway;
use crate::routing::build_cors_layer;
use crate::transport::build_http_client;

/// Shared application state accessible to all handlers.
///
/// Built once at startup; holds only immutable configuration and the pooled client.
pub struct AppState {
    pub config: AppConfig,
    pub directory: ModelDirectory,
    pub gateway: Gateway,
    pub cors: Option<CorsLayer>,
}

impl AppState {
    /// # Errors
    ///
    /// Returns `ProxyError::Config` when the HTTP client cannot be built.
    pub fn new(config: AppConfig) -> Result<Self, ProxyError> {
        let client = build_http_client(&config.server)?;
        Ok(Self::with_client(config, client))
    }

    #[must_use]
    pub fn with_client(config: AppConfig, client: reqwest::Client) -> Self {
        let directory = ModelDirectory::new(client.clone(), &config.upstream);
        let gateway = Gateway::new(client, &config.upstream);
        let cors = build_cors_layer(&config.server.cors_origins);
        Self {
            config,
            directory,
            gateway,
            cors,
        }
    }
}
