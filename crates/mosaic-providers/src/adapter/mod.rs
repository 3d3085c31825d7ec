pub(crate) mod gemini;
pub(crate) mod images_api;
pub(crate) mod prediction;

use std::sync::Arc;

use async_trait::async_trait;
use mosaic_config::ProviderKind;
use mosaic_core::{FailureClass, InputImage, Modality, OutputSize, ProviderId, ProviderOutcome, Usage};
use mosaic_store::ObjectStore;
use reqwest::Client;
use serde::Serialize;
use tokio::time::Instant;

use crate::{
    enhance::{PromptEnhancer, enhance_or_keep},
    error::{ProviderError, Result},
    input::{ResolvedImage, resolve_input_image},
    output::store_or_inline,
};

/// Static facts about an adapter, known before it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdapterDescriptor {
    pub kind: &'static str,
    pub modality: Modality,
    pub expected_size: OutputSize,
}

impl AdapterDescriptor {
    pub(crate) const fn new(kind: ProviderKind, modality: Modality, expected_size: OutputSize) -> Self {
        Self {
            kind: kind.as_str(),
            modality,
            expected_size,
        }
    }
}

/// What an adapter is asked to generate
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub prompt: String,
    pub image: Option<InputImage>,
    pub enhance: bool,
}

/// Normalized result of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub image_url: Option<String>,
    pub text: Option<String>,
    pub usage: Option<Usage>,
}

impl Generation {
    fn is_empty(&self) -> bool {
        self.image_url.is_none() && self.text.as_deref().is_none_or(|t| t.trim().is_empty())
    }
}

/// Collaborators every adapter needs
#[derive(Clone)]
pub struct AdapterDeps {
    pub client: Client,
    pub storage: Arc<dyn ObjectStore>,
    pub enhancer: Option<Arc<dyn PromptEnhancer>>,
}

impl AdapterDeps {
    pub(crate) async fn prompt(&self, input: &GenerationInput) -> String {
        enhance_or_keep(self.enhancer.as_deref(), &input.prompt, input.enhance).await
    }

    pub(crate) async fn input_image(&self, input: &GenerationInput) -> Result<Option<ResolvedImage>> {
        match input.image {
            Some(ref image) => resolve_input_image(&self.client, image).await.map(Some),
            None => Ok(None),
        }
    }

    /// Upload a base64 payload produced by the upstream
    pub(crate) async fn store_base64(&self, data: &str, mime: &str) -> Result<String> {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid image payload: {e}")))?;

        Ok(store_or_inline(self.storage.as_ref(), bytes, mime).await)
    }
}

/// One provider, normalized to a single call
#[async_trait]
pub trait Adapter: Send + Sync {
    fn id(&self) -> &ProviderId;

    fn descriptor(&self) -> AdapterDescriptor;

    async fn invoke(&self, input: &GenerationInput) -> Result<Generation>;
}

/// Invoke an adapter and fold the result into a [`ProviderOutcome`]
///
/// Timing starts here, so each branch is measured from its own dispatch.
pub async fn run(adapter: &dyn Adapter, input: &GenerationInput) -> ProviderOutcome {
    let provider = adapter.id().clone();
    let started = Instant::now();

    let result = adapter
        .invoke(input)
        .await
        .and_then(|generation| if generation.is_empty() { Err(ProviderError::EmptyResult) } else { Ok(generation) });

    let elapsed = started.elapsed();
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(generation) => {
            tracing::info!(
                provider = %provider,
                duration_ms,
                has_image = generation.image_url.is_some(),
                "provider generation succeeded"
            );
            mosaic_telemetry::metrics::record_branch(provider.as_str(), "success", elapsed);

            ProviderOutcome::success(provider, generation.image_url, generation.text, generation.usage, duration_ms)
        }
        Err(e) => {
            tracing::warn!(provider = %provider, duration_ms, error = %e, "provider generation failed");
            mosaic_telemetry::metrics::record_branch(provider.as_str(), "failure", elapsed);

            ProviderOutcome::failure(provider, e.to_string(), duration_ms).classified(FailureClass::of(&e))
        }
    }
}

pub(crate) fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
