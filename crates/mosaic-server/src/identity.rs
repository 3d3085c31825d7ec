use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use mosaic_config::IdentityConfig;
use mosaic_core::UserId;

use crate::error::ApiError;

/// Resolve the current user from the identity proxy header
///
/// Public paths pass through untouched. Any other request without an
/// identity is answered with 401 and a sign-in URL that returns the
/// caller to where they were.
pub async fn identity_middleware(config: IdentityConfig, mut request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if config.public_paths.iter().any(|public| path.starts_with(public.as_str())) {
        return next.run(request).await;
    }

    let user = request
        .headers()
        .get(config.user_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::new);

    let Some(user) = user else {
        let return_to = request
            .uri()
            .path_and_query()
            .map_or_else(|| path.to_string(), ToString::to_string);
        tracing::debug!(path = %path, "anonymous request to protected route");
        return ApiError::sign_in_required(sign_in_url(&config.sign_in_url, &return_to)).into_response();
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

fn sign_in_url(base: &str, return_to: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}redirect_url={encoded}")
}
