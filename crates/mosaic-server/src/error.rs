use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use mosaic_core::HttpError;
use serde::Serialize;

/// JSON error body returned by every route
#[derive(Debug, Serialize)]
pub(crate) struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sign_in_url: Option<String>,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, r#type: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            r#type: r#type.to_string(),
            sign_in_url: None,
        }
    }

    /// 401 pointing the caller at the sign-in page
    pub(crate) fn sign_in_required(sign_in_url: String) -> Self {
        Self {
            sign_in_url: Some(sign_in_url),
            ..Self::new(StatusCode::UNAUTHORIZED, "authentication_error", "sign in required")
        }
    }
}

impl<E: HttpError> From<E> for ApiError {
    fn from(error: E) -> Self {
        let status = error.status_code();
        if status.is_server_error() {
            tracing::error!(error = %error, "request failed");
        } else {
            tracing::debug!(error = %error, "request rejected");
        }
        Self::new(status, error.error_type(), error.client_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(&self)).into_response()
    }
}
