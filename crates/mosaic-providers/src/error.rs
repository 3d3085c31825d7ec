use http::StatusCode;
use mosaic_core::HttpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Failures of a single adapter invocation
///
/// Every variant ends up as the failure text of one branch; none of them
/// affect sibling branches.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider is misconfigured (missing credential, bad model)
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream answered with a non-2xx status
    #[error("provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Upstream could not be reached
    #[error("connection error: {0}")]
    Connection(String),

    /// Upstream answered 2xx with a body we could not read
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Upstream finished without an image or any text
    #[error("provider returned no image and no text")]
    EmptyResult,

    /// Polling ran out of attempts before a terminal state
    #[error("generation timed out after {attempts} polls")]
    Timeout { attempts: u32 },

    /// Upstream job reached a terminal failure state
    #[error("generation failed: {0}")]
    JobFailed(String),

    /// The reference image could not be resolved
    #[error("invalid input image: {0}")]
    InvalidInput(String),
}

impl ProviderError {
    pub(crate) fn connection(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Connection(format!("request timed out: {error}"))
        } else {
            Self::Connection(error.to_string())
        }
    }

    /// Read an error body off a non-2xx response
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .ok()
            .filter(|body| !body.trim().is_empty())
            .unwrap_or_else(|| "no response body".to_string());

        Self::Upstream { status, message }
    }
}

impl HttpError for ProviderError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status: 429, .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { .. }
            | Self::Connection(_)
            | Self::MalformedResponse(_)
            | Self::EmptyResult
            | Self::JobFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Config(_) => "configuration_error",
            Self::InvalidInput(_) => "invalid_request_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Upstream { .. }
            | Self::Connection(_)
            | Self::MalformedResponse(_)
            | Self::EmptyResult
            | Self::JobFailed(_) => "upstream_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Config(_) => "provider is not configured".to_string(),
            _ => self.to_string(),
        }
    }
}
