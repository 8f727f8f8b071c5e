use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::{service_fn, Layer, ServiceExt};

use crate::api::{health, models, playground, UPLOAD_BODY_LIMIT_BYTES};
use crate::error::ProxyError;
use crate::state::AppState;

#[derive(Debug, PartialEq, Eq)]
enum RouteMatch<'a> {
    Health,
    ListModels,
    ModelDetail { encoded_name: &'a str },
    PlaygroundText,
    PlaygroundImage,
    PlaygroundTranscribe,
    PlaygroundSpeech,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// When CORS is configured the request first passes through the CORS layer,
/// which answers preflight `OPTIONS` requests itself.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let Some(cors) = state.cors.clone() else {
        return route_request(state, base_path, request).await;
    };
    let service = cors.layer(service_fn(move |request: Request<Body>| {
        route_request(Arc::clone(&state), Arc::clone(&base_path), request)
    }));
    service.oneshot(request).await
}

async fn route_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path(), base_path.as_ref());

    let response = match route {
        RouteMatch::Health => health::health_handler().into_response(),
        RouteMatch::ListModels => models::list_handler(State(state), &parts.uri).await,
        RouteMatch::ModelDetail { encoded_name } => match urlencoding::decode(encoded_name) {
            Ok(name) => models::detail_handler(State(state), &name).await,
            Err(_) => {
                ProxyError::InvalidRequest("model name is not valid UTF-8".to_string())
                    .into_response()
            }
        },
        RouteMatch::PlaygroundText => {
            playground::text_handler(State(state), &parts.headers, body).await
        }
        RouteMatch::PlaygroundImage => {
            playground::image_handler(State(state), &parts.headers, body).await
        }
        RouteMatch::PlaygroundSpeech => {
            playground::speech_handler(State(state), &parts.headers, body).await
        }
        RouteMatch::PlaygroundTranscribe => {
            return dispatch_upload(state, Request::from_parts(parts, body)).await;
        }
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    Ok(response)
}

/// Multipart uploads go through `DefaultBodyLimit` so the extractor accepts
/// audio files larger than its 2MiB default.
async fn dispatch_upload(
    state: Arc<AppState>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let service = DefaultBodyLimit::max(UPLOAD_BODY_LIMIT_BYTES).layer(service_fn(
        move |request: Request<Body>| {
            let state = Arc::clone(&state);
            async move {
                Ok::<_, Infallible>(playground::transcribe_handler(State(state), request).await)
            }
        },
    ));
    service.oneshot(request).await
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

fn expect_method<'a>(method: &Method, expected: &Method, route: RouteMatch<'a>) -> RouteMatch<'a> {
    if method == expected {
        route
    } else {
        RouteMatch::MethodNotAllowed
    }
}

fn match_route<'a>(method: &Method, path: &'a str, base_path: &str) -> RouteMatch<'a> {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    match path {
        "/" => expect_method(method, &Method::GET, RouteMatch::Health),
        "/models" => expect_method(method, &Method::GET, RouteMatch::ListModels),
        "/playground/text" => expect_method(method, &Method::POST, RouteMatch::PlaygroundText),
        "/playground/image" => expect_method(method, &Method::POST, RouteMatch::PlaygroundImage),
        "/playground/audio/transcribe" => {
            expect_method(method, &Method::POST, RouteMatch::PlaygroundTranscribe)
        }
        "/playground/audio/generate" => {
            expect_method(method, &Method::POST, RouteMatch::PlaygroundSpeech)
        }
        _ => match path.strip_prefix("/models/") {
            Some("") | None => RouteMatch::NotFound,
            Some(encoded_name) => {
                expect_method(method, &Method::GET, RouteMatch::ModelDetail { encoded_name })
            }
        },
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}
