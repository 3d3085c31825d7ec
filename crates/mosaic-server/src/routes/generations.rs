use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use mosaic_core::UserId;
use mosaic_fanout::FanoutServer;
use mosaic_store::GenerationRecord;

use crate::error::ApiError;

/// `GET /v1/generations`
pub(super) async fn history(
    State(server): State<Arc<FanoutServer>>,
    Extension(user): Extension<UserId>,
) -> Result<Json<Vec<GenerationRecord>>, ApiError> {
    Ok(Json(server.history(&user).await?))
}
