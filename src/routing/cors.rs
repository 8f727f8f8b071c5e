use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::auth::X_API_KEY;

/// Build the CORS layer for browser clients. `None` when no origin is configured.
///
/// A `*` entry allows any origin. Other entries that are not valid header
/// values are skipped; config validation rejects them up front.
#[must_use]
pub fn build_cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o.trim()).ok()),
        )
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([X_API_KEY, header::CONTENT_TYPE]),
    )
}
