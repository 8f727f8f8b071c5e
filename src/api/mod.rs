pub mod health;
pub mod models;
pub mod playground;

use axum::body::Body;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::ProxyError;

pub(crate) const JSON_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
pub(crate) const UPLOAD_BODY_LIMIT_BYTES: usize = 25 * 1024 * 1024;

/// Collect a request body, failing with 413 past `limit` and 400 on any other read error.
async fn read_request_body(body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    Limited::new(body, limit)
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ProxyError::PayloadTooLarge(format!(
                    "Request body too large (max {}MiB)",
                    limit / (1024 * 1024)
                ))
            } else {
                ProxyError::InvalidRequest(format!("Failed to read request body: {err}"))
            }
        })
}
