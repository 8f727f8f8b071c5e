use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_temperature() -> Option<f64> {
    Some(0.7)
}
fn default_max_tokens() -> Option<u32> {
    Some(1000)
}
fn default_size() -> Option<String> {
    Some("1024x1024".to_string())
}
fn default_image_count() -> Option<u32> {
    Some(1)
}
fn default_voice() -> Option<String> {
    Some("alloy".to_string())
}

pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// `POST /playground/text` body; serialized as-is to `chat/completions`.
///
/// An explicit `null` for an optional parameter drops it from the upstream payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Map<String, Value>>,
    #[serde(default = "default_temperature", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default = "default_max_tokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// `POST /playground/image` body; serialized as-is to `images/generations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default = "default_size", skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default = "default_image_count", skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

/// `POST /playground/audio/generate` body; serialized as-is to `audio/speech`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    #[serde(default = "default_voice", skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// An uploaded audio file bound for `audio/transcriptions`.
#[derive(Debug, Clone)]
pub struct TranscriptionUpload {
    pub model: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}
