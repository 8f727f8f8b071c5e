use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use a4f_proxy::config::{AppConfig, ServerConfig, UpstreamConfig};
use a4f_proxy::routing::dispatch_request;
use a4f_proxy::state::AppState;
use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

const CALLER_KEY: &str = "ddc-a4f-caller";
const AUDIO_BYTES: &[u8] = b"ID3\x03\x00fake-mp3-frames";

fn bearer(headers: &HeaderMap) -> Value {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map_or(Value::Null, |v| Value::String(v.to_string()))
}

async fn echo_json(
    State(hits): State<Arc<AtomicUsize>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({"authorization": bearer(&headers), "received": body}))
}

async fn speech(
    State(hits): State<Arc<AtomicUsize>>,
    Json(body): Json<Value>,
) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    if body["voice"] != "alloy" || body["input"] != "hello" {
        return StatusCode::UNPROCESSABLE_ENTITY.into_response();
    }
    ([(header::CONTENT_TYPE, "audio/mpeg")], AUDIO_BYTES).into_response()
}

async fn transcriptions(
    State(hits): State<Arc<AtomicUsize>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let mut model = Value::Null;
    let mut file_name = Value::Null;
    let mut file_len = 0;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("model") => model = Value::String(field.text().await.unwrap()),
            Some("file") => {
                file_name = field
                    .file_name()
                    .map_or(Value::Null, |n| Value::String(n.to_string()));
                file_len = field.bytes().await.unwrap().len();
            }
            _ => {}
        }
    }
    Json(json!({
        "authorization": bearer(&headers),
        "text": "hello world",
        "model": model,
        "file_name": file_name,
        "file_len": file_len,
    }))
}

async fn spawn_upstream() -> (String, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/v1/chat/completions", post(echo_json))
        .route("/v1/images/generations", post(echo_json))
        .route("/v1/audio/speech", post(speech))
        .route("/v1/audio/transcriptions", post(transcriptions))
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/v1"), hits, server)
}

async fn spawn_failing_upstream() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"message": "model not available on your plan"}})),
            )
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failing upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/v1"), server)
}

fn build_state(api_base: String) -> Arc<AppState> {
    build_state_with_origins(api_base, ServerConfig::default().cors_origins)
}

fn build_state_with_origins(api_base: String, cors_origins: Vec<String>) -> Arc<AppState> {
    let config = AppConfig {
        server: ServerConfig {
            cors_origins,
            ..ServerConfig::default()
        },
        upstream: UpstreamConfig {
            api_base,
            display_base: "http://127.0.0.1:1/api".to_string(),
            ..UpstreamConfig::default()
        },
        features: Default::default(),
    };
    Arc::new(AppState::new(config).expect("state"))
}

fn json_request(uri: &str, key: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder
        .body(Body::from(serde_json::to_vec(body).expect("serialize")))
        .expect("build request")
}

fn multipart_request(uri: &str, key: Option<&str>, model: Option<&str>) -> Request<Body> {
    let boundary = "a4f-test-boundary";
    let mut body = Vec::new();
    if let Some(model) = model {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\n{model}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"clip.mp3\"\r\nContent-Type: audio/mpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(AUDIO_BYTES);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let mut builder = Request::builder().method("POST").uri(uri).header(
        "content-type",
        format!("multipart/form-data; boundary={boundary}"),
    );
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body)).expect("build request")
}

async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    (status, headers, body.to_vec())
}

fn chat_body() -> Value {
    json!({
        "model": "provider-1/gpt-4o-mini",
        "messages": [{"role": "user", "content": "ping"}]
    })
}

#[tokio::test]
async fn test_missing_key_is_rejected_without_upstream_call() {
    let (api_base, hits, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let requests = vec![
        json_request("/playground/text", None, &chat_body()),
        json_request(
            "/playground/image",
            None,
            &json!({"model": "dall-e-3", "prompt": "a lighthouse"}),
        ),
        json_request(
            "/playground/audio/generate",
            None,
            &json!({"model": "tts-1", "input": "hi"}),
        ),
        multipart_request("/playground/audio/transcribe", None, None),
        json_request("/playground/text", Some(""), &chat_body()),
    ];

    for request in requests {
        let (status, _, body) = send(Arc::clone(&state), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            payload["detail"],
            "API key required. Please add your a4f.co API key."
        );
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    server.abort();
}

#[tokio::test]
async fn test_text_forwards_bearer_and_defaults() {
    let (api_base, hits, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let (status, _, body) = send(
        state,
        json_request("/playground/text", Some(CALLER_KEY), &chat_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["authorization"], format!("Bearer {CALLER_KEY}"));
    assert_eq!(payload["received"]["model"], "provider-1/gpt-4o-mini");
    assert_eq!(payload["received"]["messages"][0]["content"], "ping");
    assert_eq!(payload["received"]["temperature"], 0.7);
    assert_eq!(payload["received"]["max_tokens"], 1000);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    server.abort();
}

#[tokio::test]
async fn test_image_forwards_caller_params() {
    let (api_base, _, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let request = json_request(
        "/playground/image",
        Some(CALLER_KEY),
        &json!({"model": "dall-e-3", "prompt": "a lighthouse", "size": "512x512", "n": 2}),
    );
    let (status, _, body) = send(state, request).await;
    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        payload["received"],
        json!({"model": "dall-e-3", "prompt": "a lighthouse", "size": "512x512", "n": 2})
    );

    server.abort();
}

#[tokio::test]
async fn test_speech_returns_raw_audio() {
    let (api_base, _, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let request = json_request(
        "/playground/audio/generate",
        Some(CALLER_KEY),
        &json!({"model": "tts-1", "input": "hello"}),
    );
    let (status, headers, body) = send(state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(body, AUDIO_BYTES);

    server.abort();
}

#[tokio::test]
async fn test_transcription_forwards_multipart() {
    let (api_base, _, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let (status, _, body) = send(
        Arc::clone(&state),
        multipart_request("/playground/audio/transcribe", Some(CALLER_KEY), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["model"], "whisper-1");
    assert_eq!(payload["file_name"], "clip.mp3");
    assert_eq!(payload["file_len"], AUDIO_BYTES.len());
    assert_eq!(payload["authorization"], format!("Bearer {CALLER_KEY}"));

    let (_, _, body) = send(
        Arc::clone(&state),
        multipart_request(
            "/playground/audio/transcribe?model=whisper-large",
            Some(CALLER_KEY),
            None,
        ),
    )
    .await;
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["model"], "whisper-large");

    let (_, _, body) = send(
        state,
        multipart_request(
            "/playground/audio/transcribe?model=whisper-large",
            Some(CALLER_KEY),
            Some("provider-2/whisper-1"),
        ),
    )
    .await;
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["model"], "provider-2/whisper-1");

    server.abort();
}

#[tokio::test]
async fn test_transcription_requires_file() {
    let (api_base, hits, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let request = Request::builder()
        .method("POST")
        .uri("/playground/audio/transcribe")
        .header("x-api-key", CALLER_KEY)
        .header("content-type", "multipart/form-data; boundary=b")
        .body(Body::from(
            "--b\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\nwhisper-1\r\n--b--\r\n",
        ))
        .unwrap();
    let (status, _, _) = send(state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    server.abort();
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (api_base, hits, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let request = json_request(
        "/playground/text",
        Some(CALLER_KEY),
        &json!({"messages": []}),
    );
    let (status, _, _) = send(state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    server.abort();
}

#[tokio::test]
async fn test_upstream_error_collapses_to_500() {
    let (api_base, server) = spawn_failing_upstream().await;
    let state = build_state(api_base);

    let (status, _, body) = send(
        state,
        json_request("/playground/text", Some(CALLER_KEY), &chat_body()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    let detail = payload["detail"].as_str().unwrap();
    assert!(detail.contains("model not available on your plan"));
    assert!(!detail.contains(CALLER_KEY));

    server.abort();
}

#[tokio::test]
async fn test_unreachable_upstream_is_500() {
    let state = build_state("http://127.0.0.1:1/v1".to_string());
    let (status, _, _) = send(
        state,
        json_request("/playground/text", Some(CALLER_KEY), &chat_body()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

fn preflight_request(uri: &str, origin: &str) -> Request<Body> {
    Request::builder()
        .method("OPTIONS")
        .uri(uri)
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-api-key,content-type")
        .body(Body::empty())
        .expect("build request")
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_cors_preflight_allows_api_key_header() {
    let (api_base, hits, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let (status, headers, _) = send(
        state,
        preflight_request("/playground/text", "http://localhost:3000"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        header_str(&headers, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some("*")
    );
    let allowed_headers = header_str(&headers, header::ACCESS_CONTROL_ALLOW_HEADERS)
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed_headers.contains("x-api-key"));
    assert!(allowed_headers.contains("content-type"));
    let allowed_methods = header_str(&headers, header::ACCESS_CONTROL_ALLOW_METHODS).unwrap();
    assert!(allowed_methods.contains("POST"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    server.abort();
}

#[tokio::test]
async fn test_cors_headers_on_forwarded_response() {
    let (api_base, _hits, server) = spawn_upstream().await;
    let state = build_state(api_base);

    let mut request = json_request("/playground/text", Some(CALLER_KEY), &chat_body());
    request.headers_mut().insert(
        header::ORIGIN,
        "http://localhost:3000".parse().unwrap(),
    );
    let (status, headers, _) = send(state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        header_str(&headers, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some("*")
    );

    server.abort();
}

#[tokio::test]
async fn test_cors_origin_list_only_echoes_listed_origins() {
    let state = build_state_with_origins(
        "http://127.0.0.1:1/v1".to_string(),
        vec!["http://localhost:3000".to_string()],
    );

    let (status, headers, _) = send(
        Arc::clone(&state),
        preflight_request("/playground/image", "http://localhost:3000"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        header_str(&headers, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some("http://localhost:3000")
    );

    let (_, headers, _) = send(
        state,
        preflight_request("/playground/image", "http://evil.example"),
    )
    .await;
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_empty_origin_list_disables_cors() {
    let state = build_state_with_origins("http://127.0.0.1:1/v1".to_string(), Vec::new());

    let (status, headers, _) = send(
        state,
        preflight_request("/playground/text", "http://localhost:3000"),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
