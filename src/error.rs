use serde_json::json;

/// Error type shared by the directory, the gateway and the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("API request failed: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("API request failed: {0}")]
    Transport(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    NotFound,
    PayloadTooLarge,
    ServerError,
}

impl ProxyError {
    /// Upstream failures of every kind collapse into `ServerError`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProxyError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            ProxyError::Unauthorized(_) => ErrorCategory::Authentication,
            ProxyError::NotFound(_) => ErrorCategory::NotFound,
            ProxyError::PayloadTooLarge(_) => ErrorCategory::PayloadTooLarge,
            ProxyError::Config(_)
            | ProxyError::Upstream { .. }
            | ProxyError::Transport(_) => ErrorCategory::ServerError,
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::PayloadTooLarge => http::StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as (`status_code`, `{"detail": ...}` body).
#[must_use]
pub fn format_error(err: &ProxyError) -> (http::StatusCode, serde_json::Value) {
    let status = http_status_for_category(err.category());
    (status, json!({ "detail": err.to_string() }))
}

impl axum::response::IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_collapse_to_500() {
        for err in [
            ProxyError::Upstream {
                status: 400,
                message: "bad model".into(),
            },
            ProxyError::Upstream {
                status: 503,
                message: "down".into(),
            },
            ProxyError::Transport("operation timed out".into()),
        ] {
            let (status, _) = format_error(&err);
            assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn unauthorized_detail_is_verbatim() {
        let err = ProxyError::Unauthorized("API key required.".into());
        let (status, body) = format_error(&err);
        assert_eq!(status, http::StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "API key required.");
    }

    #[test]
    fn not_found_maps_to_404() {
        let (status, body) = format_error(&ProxyError::NotFound("Model not found".into()));
        assert_eq!(status, http::StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Model not found");
    }

    #[test]
    fn upstream_detail_carries_message() {
        let err = ProxyError::Upstream {
            status: 502,
            message: "bad gateway".into(),
        };
        let (_, body) = format_error(&err);
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("502"));
        assert!(detail.contains("bad gateway"));
    }
}
