use http::StatusCode;
use mosaic_core::{FailureClass, HttpError, ProviderId, ProviderOutcome};
use mosaic_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FanoutError>;

/// Errors that reject a request or an interaction outright
///
/// Inside a fan-out, provider failures become failed branches and never
/// surface here. Only the single-provider path reports them as
/// [`FanoutError::Generation`].
#[derive(Debug, Error)]
pub enum FanoutError {
    /// Request failed validation before anything was dispatched
    #[error("invalid request: {0}")]
    Validation(String),

    /// A selected provider is not configured
    #[error("unknown provider: {0}")]
    UnknownProvider(ProviderId),

    /// User reached the generation ceiling
    #[error("generation limit reached: you have used all {ceiling} generations")]
    QuotaExceeded { ceiling: u32 },

    /// Conversation does not exist or belongs to someone else
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Turn does not exist in the conversation
    #[error("turn not found: {0}")]
    TurnNotFound(String),

    /// Turn has no branch with this label
    #[error("branch not found: {0}")]
    BranchNotFound(ProviderId),

    /// Interaction needs a branch that resolved with an image
    #[error("branch {0} has no image")]
    NoImage(ProviderId),

    /// The one requested provider failed
    #[error("{provider} failed: {}", class.message)]
    Generation { provider: ProviderId, class: FailureClass },

    /// Generation log could not be read
    #[error("generation log unavailable: {0}")]
    Store(#[from] StoreError),
}

impl FanoutError {
    /// Error for a failed single-provider outcome
    ///
    /// Unclassified failures are reported as a bad gateway.
    pub(crate) fn generation(outcome: ProviderOutcome) -> Self {
        let class = outcome.failure.unwrap_or_else(|| FailureClass {
            status: StatusCode::BAD_GATEWAY.as_u16(),
            error_type: "upstream_error".to_string(),
            message: outcome.error_message.unwrap_or_else(|| "generation failed".to_string()),
        });

        Self::Generation {
            provider: outcome.provider,
            class,
        }
    }
}

impl HttpError for FanoutError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownProvider(_) => StatusCode::BAD_REQUEST,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ConversationNotFound(_) | Self::TurnNotFound(_) | Self::BranchNotFound(_) => StatusCode::NOT_FOUND,
            Self::NoImage(_) => StatusCode::CONFLICT,
            Self::Generation { class, .. } => StatusCode::from_u16(class.status).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Validation(_) | Self::UnknownProvider(_) => "invalid_request_error",
            Self::QuotaExceeded { .. } => "rate_limit_error",
            Self::ConversationNotFound(_) | Self::TurnNotFound(_) | Self::BranchNotFound(_) => "not_found_error",
            Self::NoImage(_) => "conflict_error",
            Self::Generation { class, .. } => &class.error_type,
            Self::Store(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Generation { class, .. } => class.message.clone(),
            Self::Store(_) => "generation history is temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}
