use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use mosaic_core::{GenerationRequest, InputImage, Modality, OutputSize, ProviderId, Usage, UserId};
use mosaic_fanout::FanoutServer;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Serialize)]
pub(super) struct ProviderInfo {
    id: ProviderId,
    kind: &'static str,
    modality: Modality,
    expected_size: OutputSize,
}

/// `GET /v1/providers`
pub(super) async fn list(State(server): State<Arc<FanoutServer>>) -> Json<Vec<ProviderInfo>> {
    let providers = server
        .registry()
        .iter()
        .map(|adapter| {
            let descriptor = adapter.descriptor();
            ProviderInfo {
                id: adapter.id().clone(),
                kind: descriptor.kind,
                modality: descriptor.modality,
                expected_size: descriptor.expected_size,
            }
        })
        .collect();

    Json(providers)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct GenerateBody {
    prompt: String,
    #[serde(default)]
    image: Option<InputImage>,
    #[serde(default)]
    enhance: bool,
}

#[derive(Serialize)]
pub(super) struct GenerateResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<Usage>,
}

/// `POST /v1/providers/{provider}/generate`
pub(super) async fn generate(
    State(server): State<Arc<FanoutServer>>,
    Extension(user): Extension<UserId>,
    Path(provider): Path<String>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let provider = ProviderId::new(provider);

    let request = GenerationRequest {
        prompt: body.prompt,
        input_image: body.image,
        providers: vec![provider.clone()],
        enhance: body.enhance,
    };

    let outcome = server.generate(&user, &provider, &request).await?;

    Ok(Json(GenerateResponse {
        success: true,
        image: outcome.image_url,
        text: outcome.text,
        tokens: outcome.tokens_used,
        usage: outcome.usage,
    }))
}
