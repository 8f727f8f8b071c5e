mod types;

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::auth::CallerKey;
use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::observability::log_gateway_complete;

pub use types::{
    ChatCompletionRequest, ImageGenerationRequest, SpeechRequest, TranscriptionUpload,
    DEFAULT_TRANSCRIPTION_MODEL,
};

/// Upstream operation, used for endpoint selection and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ChatCompletion,
    ImageGeneration,
    AudioTranscription,
    AudioGeneration,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::ChatCompletion => "chat_completion",
            Operation::ImageGeneration => "image_generation",
            Operation::AudioTranscription => "audio_transcription",
            Operation::AudioGeneration => "audio_generation",
        }
    }

    const fn path(self) -> &'static str {
        match self {
            Operation::ChatCompletion => "chat/completions",
            Operation::ImageGeneration => "images/generations",
            Operation::AudioTranscription => "audio/transcriptions",
            Operation::AudioGeneration => "audio/speech",
        }
    }
}

/// Pass-through client for the a4f.co completion endpoints.
///
/// Exactly one upstream call per operation, no retries.
pub struct Gateway {
    client: reqwest::Client,
    api_base: String,
    chat_timeout: Duration,
    image_timeout: Duration,
    transcription_timeout: Duration,
    speech_timeout: Duration,
}

impl Gateway {
    #[must_use]
    pub fn new(client: reqwest::Client, upstream: &UpstreamConfig) -> Self {
        Self {
            client,
            api_base: upstream.api_base.trim_end_matches('/').to_string(),
            chat_timeout: Duration::from_secs(upstream.chat_timeout_secs),
            image_timeout: Duration::from_secs(upstream.image_timeout_secs),
            transcription_timeout: Duration::from_secs(upstream.transcription_timeout_secs),
            speech_timeout: Duration::from_secs(upstream.speech_timeout_secs),
        }
    }

    fn timeout_for(&self, op: Operation) -> Duration {
        match op {
            Operation::ChatCompletion => self.chat_timeout,
            Operation::ImageGeneration => self.image_timeout,
            Operation::AudioTranscription => self.transcription_timeout,
            Operation::AudioGeneration => self.speech_timeout,
        }
    }

    fn request(&self, op: Operation, key: &CallerKey) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}", self.api_base, op.path()))
            .bearer_auth(key.expose())
            .timeout(self.timeout_for(op))
    }

    /// # Errors
    ///
    /// Any transport failure, non-2xx status or non-JSON body.
    pub async fn chat_completion(
        &self,
        key: &CallerKey,
        request: &ChatCompletionRequest,
    ) -> Result<Value, ProxyError> {
        let op = Operation::ChatCompletion;
        let builder = self.request(op, key).json(request);
        self.send_json(op, &request.model, builder).await
    }

    /// # Errors
    ///
    /// Any transport failure, non-2xx status or non-JSON body.
    pub async fn image_generation(
        &self,
        key: &CallerKey,
        request: &ImageGenerationRequest,
    ) -> Result<Value, ProxyError> {
        let op = Operation::ImageGeneration;
        let builder = self.request(op, key).json(request);
        self.send_json(op, &request.model, builder).await
    }

    /// # Errors
    ///
    /// Any transport failure, non-2xx status or non-JSON body.
    pub async fn audio_transcription(
        &self,
        key: &CallerKey,
        upload: TranscriptionUpload,
    ) -> Result<Value, ProxyError> {
        let op = Operation::AudioTranscription;
        let model = upload.model.clone();
        let form = Form::new()
            .part("file", file_part(&upload))
            .text("model", upload.model);
        let builder = self.request(op, key).multipart(form);
        self.send_json(op, &model, builder).await
    }

    /// Returns the raw audio bytes exactly as upstream sent them.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-2xx status.
    pub async fn audio_generation(
        &self,
        key: &CallerKey,
        request: &SpeechRequest,
    ) -> Result<Bytes, ProxyError> {
        let op = Operation::AudioGeneration;
        let builder = self.request(op, key).json(request);
        self.send(op, &request.model, builder).await
    }

    async fn send_json(
        &self,
        op: Operation,
        model: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<Value, ProxyError> {
        let body = self.send(op, model, builder).await?;
        serde_json::from_slice(&body).map_err(|e| {
            let err = ProxyError::Upstream {
                status: 200,
                message: format!("invalid JSON from upstream: {e}"),
            };
            tracing::error!(operation = op.as_str(), model, error = %err, "upstream call failed");
            err
        })
    }

    async fn send(
        &self,
        op: Operation,
        model: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<Bytes, ProxyError> {
        let start = Instant::now();
        let result = Self::execute(builder).await;
        match &result {
            Ok(_) => log_gateway_complete(op.as_str(), model, start),
            Err(err) => {
                tracing::error!(operation = op.as_str(), model, error = %err, "upstream call failed");
            }
        }
        result
    }

    async fn execute(builder: reqwest::RequestBuilder) -> Result<Bytes, ProxyError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}

fn file_part(upload: &TranscriptionUpload) -> Part {
    let file_name = upload
        .file_name
        .clone()
        .unwrap_or_else(|| "audio".to_string());
    let base = || Part::bytes(upload.data.to_vec()).file_name(file_name.clone());
    match upload.content_type.as_deref() {
        // Unparseable content types are dropped rather than failing the upload.
        Some(content_type) => base().mime_str(content_type).unwrap_or_else(|_| base()),
        None => base(),
    }
}
