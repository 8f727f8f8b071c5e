use std::time::Duration;

use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ModelRecord, Tier};
use crate::config::UpstreamConfig;
use crate::error::ProxyError;

#[derive(Debug, Deserialize)]
struct DisplayModelsResponse {
    #[serde(default)]
    models: Vec<Map<String, Value>>,
}

/// Models listed under one plan, plus the swallowed failure if the fetch failed.
#[derive(Debug, Clone)]
pub struct TierListing {
    pub plan: String,
    pub models: Vec<ModelRecord>,
    pub error: Option<String>,
}

impl TierListing {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.error.is_some()
    }
}

/// Concatenation of every tier, in [`Tier::ALL`] order.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    pub models: Vec<ModelRecord>,
    pub unavailable_tiers: Vec<String>,
}

/// Client for the upstream display endpoint.
pub struct ModelDirectory {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ModelDirectory {
    #[must_use]
    pub fn new(client: reqwest::Client, upstream: &UpstreamConfig) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/get-display-models",
                upstream.display_base.trim_end_matches('/')
            ),
            timeout: Duration::from_secs(upstream.display_timeout_secs),
        }
    }

    /// Fetch one plan by its raw name. Never fails: an upstream error yields
    /// an empty listing with `error` set.
    pub async fn fetch_plan(&self, plan: &str) -> TierListing {
        match self.try_fetch_plan(plan).await {
            Ok(models) => TierListing {
                plan: plan.to_string(),
                models,
                error: None,
            },
            Err(err) => {
                tracing::error!(tier = plan, error = %err, "error fetching models");
                TierListing {
                    plan: plan.to_string(),
                    models: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    pub async fn fetch_tier(&self, tier: Tier) -> TierListing {
        self.fetch_plan(tier.as_str()).await
    }

    /// Fetch every tier concurrently and concatenate in tier order.
    pub async fn fetch_all(&self) -> Aggregate {
        let listings = join_all(Tier::ALL.into_iter().map(|tier| self.fetch_tier(tier))).await;

        let mut aggregate = Aggregate {
            models: Vec::with_capacity(listings.iter().map(|l| l.models.len()).sum()),
            unavailable_tiers: Vec::new(),
        };
        for listing in listings {
            if listing.is_unavailable() {
                tracing::warn!(tier = %listing.plan, "tier dropped from aggregate");
                aggregate.unavailable_tiers.push(listing.plan);
            }
            aggregate.models.extend(listing.models);
        }
        aggregate
    }

    async fn try_fetch_plan(&self, plan: &str) -> Result<Vec<ModelRecord>, ProxyError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("plan", plan)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed: DisplayModelsResponse =
            serde_json::from_slice(&body).map_err(|e| ProxyError::Upstream {
                status: status.as_u16(),
                message: format!("malformed display models body: {e}"),
            })?;
        Ok(parsed
            .models
            .into_iter()
            .map(|raw| ModelRecord::annotate(raw, plan))
            .collect())
    }
}
