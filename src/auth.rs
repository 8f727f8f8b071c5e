use http::header::HeaderName;

use crate::error::ProxyError;

/// Header carrying the caller's a4f.co API key.
pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

pub const MISSING_KEY_DETAIL: &str = "API key required. Please add your a4f.co API key.";

/// Opaque per-request upstream credential.
///
/// The key is only ever handed to the upstream `Authorization` header;
/// `Debug` is redacted so it cannot leak through tracing fields.
#[derive(Clone)]
pub struct CallerKey(Box<str>);

impl CallerKey {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CallerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CallerKey(<redacted>)")
    }
}

/// Extract the caller's API key from the `x-api-key` header.
///
/// # Errors
///
/// Returns `ProxyError::Unauthorized` when the header is absent, empty or not valid UTF-8.
pub fn extract_caller_key(headers: &http::HeaderMap) -> Result<CallerKey, ProxyError> {
    headers
        .get(X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| CallerKey(key.into()))
        .ok_or_else(|| ProxyError::Unauthorized(MISSING_KEY_DETAIL.to_string()))
}
