use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{read_request_body, JSON_BODY_LIMIT_BYTES};
use crate::auth::extract_caller_key;
use crate::error::ProxyError;
use crate::gateway::{
    ChatCompletionRequest, ImageGenerationRequest, SpeechRequest, TranscriptionUpload,
    DEFAULT_TRANSCRIPTION_MODEL,
};
use crate::state::AppState;

async fn read_json_body<T: DeserializeOwned>(body: Body) -> Result<T, ProxyError> {
    let bytes = read_request_body(body, JSON_BODY_LIMIT_BYTES).await?;
    serde_json::from_slice(&bytes).map_err(|e| ProxyError::InvalidRequest(e.to_string()))
}

fn json_response(result: Result<Value, ProxyError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `POST /playground/text`.
pub async fn text_handler(
    State(state): State<Arc<AppState>>,
    headers: &HeaderMap,
    body: Body,
) -> Response {
    let key = match extract_caller_key(headers) {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };
    let request: ChatCompletionRequest = match read_json_body(body).await {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    json_response(state.gateway.chat_completion(&key, &request).await)
}

/// `POST /playground/image`.
pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    headers: &HeaderMap,
    body: Body,
) -> Response {
    let key = match extract_caller_key(headers) {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };
    let request: ImageGenerationRequest = match read_json_body(body).await {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    json_response(state.gateway.image_generation(&key, &request).await)
}

/// `POST /playground/audio/generate`: raw upstream audio as `audio/mpeg`.
pub async fn speech_handler(
    State(state): State<Arc<AppState>>,
    headers: &HeaderMap,
    body: Body,
) -> Response {
    let key = match extract_caller_key(headers) {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };
    let request: SpeechRequest = match read_json_body(body).await {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    match state.gateway.audio_generation(&key, &request).await {
        Ok(audio) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"))],
            Body::from(audio),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TranscribeQuery {
    model: Option<String>,
}

fn multipart_error(err: &MultipartError) -> ProxyError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ProxyError::PayloadTooLarge(err.body_text())
    } else {
        ProxyError::InvalidRequest(err.body_text())
    }
}

/// `POST /playground/audio/transcribe`: multipart `file` plus optional `model`
/// (form field wins over `?model=`).
pub async fn transcribe_handler(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Response {
    let key = match extract_caller_key(request.headers()) {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };
    let query_model = Query::<TranscribeQuery>::try_from_uri(request.uri())
        .map(|Query(q)| q.model)
        .unwrap_or_default();

    let upload = match read_upload(request, query_model).await {
        Ok(upload) => upload,
        Err(err) => return err.into_response(),
    };
    json_response(state.gateway.audio_transcription(&key, upload).await)
}

async fn read_upload(
    request: Request<Body>,
    query_model: Option<String>,
) -> Result<TranscriptionUpload, ProxyError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| ProxyError::InvalidRequest(rejection.body_text()))?;

    let mut model = query_model;
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| multipart_error(&e))?;
                file = Some((file_name, content_type, data));
            }
            Some("model") => {
                let value = field.text().await.map_err(|e| multipart_error(&e))?;
                if !value.trim().is_empty() {
                    model = Some(value);
                }
            }
            _ => {}
        }
    }

    let Some((file_name, content_type, data)) = file else {
        return Err(ProxyError::InvalidRequest(
            "multipart field 'file' is required".to_string(),
        ));
    };
    Ok(TranscriptionUpload {
        model: model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
        file_name,
        content_type,
        data,
    })
}
