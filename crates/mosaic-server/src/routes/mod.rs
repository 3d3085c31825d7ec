mod conversations;
mod generations;
mod providers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use mosaic_fanout::FanoutServer;

/// Every `/v1` route
pub fn router() -> Router<Arc<FanoutServer>> {
    Router::new()
        .route("/v1/providers", get(providers::list))
        .route("/v1/providers/{provider}/generate", post(providers::generate))
        .route("/v1/conversations", post(conversations::create))
        .route("/v1/conversations/{id}", get(conversations::show))
        .route("/v1/conversations/{id}/generations", post(conversations::submit))
        .route(
            "/v1/conversations/{id}/turns/{turn_id}/branches/{label}/vote",
            post(conversations::vote),
        )
        .route(
            "/v1/conversations/{id}/turns/{turn_id}/branches/{label}/reuse",
            post(conversations::reuse),
        )
        .route("/v1/generations", get(generations::history))
}
