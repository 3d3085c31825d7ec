use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::HttpError;

/// Configured provider name; each maps to exactly one adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Reference image as supplied by the client
///
/// Classified once at the edge; adapters resolve it to bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputImage {
    /// Remote `http(s)` URL
    Url(String),
    /// `data:<mime>;base64,<payload>` URL
    DataUrl(String),
    /// Bare base64 payload with no MIME information
    Base64(String),
}

impl InputImage {
    /// Classify a client-supplied image string
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_owned())
        } else if raw.starts_with("data:") {
            Self::DataUrl(raw.to_owned())
        } else {
            Self::Base64(raw.to_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::DataUrl(s) | Self::Base64(s) => s,
        }
    }
}

impl Serialize for InputImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InputImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One user submission, immutable once dispatched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Prompt text
    pub prompt: String,
    /// Optional reference image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image: Option<InputImage>,
    /// Providers to fan out to, in display order
    #[serde(default)]
    pub providers: Vec<ProviderId>,
    /// Rewrite the prompt before generating
    #[serde(default)]
    pub enhance: bool,
}

/// Output modalities of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Image only
    Image,
    /// Text, optionally with an image
    TextAndImage,
}

impl Modality {
    /// Whether text from this provider belongs in the turn body
    pub const fn is_text_centric(self) -> bool {
        matches!(self, Self::TextAndImage)
    }
}

/// Pixel dimensions a provider is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

impl Default for OutputSize {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

/// Token accounting reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Usage {
    /// Total tokens, summing the parts when no total was reported
    pub fn total(&self) -> Option<u64> {
        self.total_tokens.or_else(|| match (self.input_tokens, self.output_tokens) {
            (None, None) => None,
            (input, output) => Some(input.unwrap_or(0).saturating_add(output.unwrap_or(0))),
        })
    }
}

/// Whether an adapter invocation produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// HTTP classification of a failed invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureClass {
    pub status: u16,
    pub error_type: String,
    /// Message safe to show a client
    pub message: String,
}

impl FailureClass {
    pub fn of(error: &impl HttpError) -> Self {
        Self {
            status: error.status_code().as_u16(),
            error_type: error.error_type().to_owned(),
            message: error.client_message(),
        }
    }
}

/// Terminal, normalized result of one adapter invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: ProviderId,
    pub kind: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Time from this branch's own dispatch to its settlement
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureClass>,
}

impl ProviderOutcome {
    pub fn success(
        provider: ProviderId,
        image_url: Option<String>,
        text: Option<String>,
        usage: Option<Usage>,
        duration_ms: u64,
    ) -> Self {
        Self {
            provider,
            kind: OutcomeKind::Success,
            image_url,
            text,
            tokens_used: usage.as_ref().and_then(Usage::total),
            usage,
            duration_ms,
            error_message: None,
            failure: None,
        }
    }

    pub fn failure(provider: ProviderId, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            provider,
            kind: OutcomeKind::Failure,
            image_url: None,
            text: None,
            tokens_used: None,
            usage: None,
            duration_ms,
            error_message: Some(message.into()),
            failure: None,
        }
    }

    /// Attach the HTTP classification of the error behind a failure
    #[must_use]
    pub fn classified(mut self, class: FailureClass) -> Self {
        self.failure = Some(class);
        self
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}
