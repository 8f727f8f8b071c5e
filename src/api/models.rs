use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::catalog::{ModelFilter, ModelRecord, Tier};
use crate::error::ProxyError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ModelsQuery {
    pub tier: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<ModelRecord>,
    count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unavailable_tiers: Vec<String>,
}

/// `GET /models?tier=&category=`.
///
/// An explicit tier fetches only that tier; otherwise all tiers are merged.
pub async fn list_handler(State(state): State<Arc<AppState>>, uri: &Uri) -> Response {
    let query = match Query::<ModelsQuery>::try_from_uri(uri) {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return ProxyError::InvalidRequest(rejection.body_text()).into_response();
        }
    };
    let filter = ModelFilter::new(query.tier, query.category);

    let (models, unavailable_tiers) = match filter.tier.as_deref() {
        Some(plan) => {
            let listing = match plan.parse::<Tier>() {
                Ok(tier) => state.directory.fetch_tier(tier).await,
                Err(()) => {
                    tracing::debug!(tier = plan, "forwarding unrecognised tier upstream");
                    state.directory.fetch_plan(plan).await
                }
            };
            let unavailable = if listing.is_unavailable() {
                vec![listing.plan]
            } else {
                Vec::new()
            };
            (listing.models, unavailable)
        }
        None => {
            let aggregate = state.directory.fetch_all().await;
            (aggregate.models, aggregate.unavailable_tiers)
        }
    };

    let models = filter.apply(models);
    Json(ModelsResponse {
        count: models.len(),
        models,
        unavailable_tiers,
    })
    .into_response()
}

/// `GET /models/{model_name}`: first match on `base_model` or `name` across all tiers.
pub async fn detail_handler(State(state): State<Arc<AppState>>, model_name: &str) -> Response {
    let aggregate = state.directory.fetch_all().await;
    match aggregate
        .models
        .into_iter()
        .find(|record| record.is_named(model_name))
    {
        Some(record) => Json(record).into_response(),
        None => ProxyError::NotFound("Model not found".to_string()).into_response(),
    }
}
