//! Model directory: tier/category vocabulary, categorization and filtering.

mod directory;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use directory::{Aggregate, ModelDirectory, TierListing};

/// Pricing/access level a model is listed under upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Pro,
    Ultra,
}

impl Tier {
    /// Fetch and concatenation order for the merged directory.
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Basic, Tier::Pro, Tier::Ultra];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Ultra => "ultra",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or(())
    }
}

/// Derived modality label for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    AudioSpeech,
    AudioTranscription,
    ImageEdits,
    ImageGeneration,
    Video,
    Embeddings,
    #[default]
    ChatCompletion,
}

impl Category {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::AudioSpeech => "audio_speech",
            Category::AudioTranscription => "audio_transcription",
            Category::ImageEdits => "image_edits",
            Category::ImageGeneration => "image_generation",
            Category::Video => "video",
            Category::Embeddings => "embeddings",
            Category::ChatCompletion => "chat_completion",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword test applied to the lowercased `type` string.
enum Matcher {
    /// Any keyword is a substring.
    Any(&'static [&'static str]),
    /// `required` is a substring and so is at least one of `any`.
    AllOf {
        required: &'static str,
        any: &'static [&'static str],
    },
}

impl Matcher {
    fn matches(&self, haystack: &str) -> bool {
        match self {
            Matcher::Any(keywords) => keywords.iter().any(|kw| haystack.contains(kw)),
            Matcher::AllOf { required, any } => {
                haystack.contains(required) && any.iter().any(|kw| haystack.contains(kw))
            }
        }
    }
}

/// Ordered categorization rules; the first match wins.
const RULES: &[(Matcher, Category)] = &[
    (Matcher::Any(&["speech", "tts"]), Category::AudioSpeech),
    (
        Matcher::Any(&["transcription", "stt"]),
        Category::AudioTranscription,
    ),
    (Matcher::Any(&["audio"]), Category::AudioSpeech),
    (
        Matcher::AllOf {
            required: "image",
            any: &["edit", "variation"],
        },
        Category::ImageEdits,
    ),
    (
        Matcher::Any(&["image", "generation"]),
        Category::ImageGeneration,
    ),
    (Matcher::Any(&["video"]), Category::Video),
    (Matcher::Any(&["embedding"]), Category::Embeddings),
    (
        Matcher::Any(&["chat", "completion", "text"]),
        Category::ChatCompletion,
    ),
];

/// Map a free-text upstream `type` string to a [`Category`].
///
/// Case-insensitive substring heuristic; total over all inputs, falling back
/// to [`Category::ChatCompletion`].
#[must_use]
pub fn categorize(model_type: &str) -> Category {
    let lowered = model_type.to_lowercase();
    RULES
        .iter()
        .find(|(matcher, _)| matcher.matches(&lowered))
        .map_or(Category::default(), |(_, category)| *category)
}

/// One upstream model object, annotated with `category` and `tier`.
///
/// Fields the proxy does not know about are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRecord(Map<String, Value>);

impl ModelRecord {
    /// Wrap a raw upstream object and inject the derived fields.
    ///
    /// `tier` always overwrites whatever upstream sent.
    #[must_use]
    pub fn annotate(mut raw: Map<String, Value>, plan: &str) -> Self {
        let category = categorize(raw.get("type").and_then(Value::as_str).unwrap_or(""));
        raw.insert(
            "category".to_string(),
            Value::String(category.as_str().to_string()),
        );
        raw.insert("tier".to_string(), Value::String(plan.to_string()));
        Self(raw)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.str_field("category")
    }

    #[must_use]
    pub fn tier(&self) -> Option<&str> {
        self.str_field("tier")
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    #[must_use]
    pub fn base_model(&self) -> Option<&str> {
        self.str_field("base_model")
    }

    /// Exact match against either `base_model` or `name`.
    #[must_use]
    pub fn is_named(&self, model_name: &str) -> bool {
        self.base_model() == Some(model_name) || self.name() == Some(model_name)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Caller-supplied predicates over a model collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelFilter {
    pub tier: Option<String>,
    pub category: Option<String>,
}

impl ModelFilter {
    /// Build a filter from raw query values; empty strings and `category=all`
    /// disable the corresponding predicate.
    #[must_use]
    pub fn new(tier: Option<String>, category: Option<String>) -> Self {
        let tier = tier.filter(|t| !t.is_empty());
        let category = category.filter(|c| !c.is_empty() && c != "all");
        Self { tier, category }
    }

    #[must_use]
    pub fn matches(&self, record: &ModelRecord) -> bool {
        let tier_ok = self
            .tier
            .as_deref()
            .is_none_or(|tier| record.tier() == Some(tier));
        let category_ok = self
            .category
            .as_deref()
            .is_none_or(|category| record.category() == Some(category));
        tier_ok && category_ok
    }

    #[must_use]
    pub fn apply(&self, mut models: Vec<ModelRecord>) -> Vec<ModelRecord> {
        models.retain(|record| self.matches(record));
        models
    }
}
