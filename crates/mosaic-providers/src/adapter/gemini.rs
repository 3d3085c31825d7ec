use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use mosaic_config::{ProviderConfig, ProviderKind};
use mosaic_core::{Modality, OutputSize, ProviderId, Usage};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{Adapter, AdapterDeps, AdapterDescriptor, Generation, GenerationInput, trim_base};
use crate::{
    error::{ProviderError, Result},
    stream::{Chunk, StreamAccumulator},
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Streaming text-and-image adapter for the Google Generative Language API
pub struct GeminiAdapter {
    id: ProviderId,
    deps: AdapterDeps,
    api_key: SecretString,
    base_url: String,
    model: String,
    expected_size: OutputSize,
}

impl GeminiAdapter {
    pub fn new(id: ProviderId, config: &ProviderConfig, api_key: SecretString, deps: AdapterDeps) -> Self {
        let base_url = config.base_url.as_ref().map_or(DEFAULT_BASE_URL, url::Url::as_str);
        let expected_size = mosaic_config::parse_size(&config.size)
            .map(|(width, height)| OutputSize { width, height })
            .unwrap_or_default();

        Self {
            id,
            deps,
            api_key,
            base_url: trim_base(base_url),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            expected_size,
        }
    }

    fn stream_url(&self) -> String {
        format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}

impl StreamChunk {
    fn into_chunks(self) -> impl Iterator<Item = Chunk> {
        let parts = self
            .candidates
            .into_iter()
            .flat_map(|candidate| candidate.content.parts)
            .filter_map(|part| match (part.inline_data, part.text) {
                (Some(inline), _) => Some(Chunk::InlineData {
                    mime: inline.mime_type,
                    data: inline.data,
                }),
                (None, Some(text)) => Some(Chunk::Text(text)),
                (None, None) => None,
            });

        let usage = self.usage_metadata.map(|usage| {
            Chunk::Usage(Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            })
        });

        parts.chain(usage)
    }
}

#[async_trait]
impl Adapter for GeminiAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(ProviderKind::Gemini, Modality::TextAndImage, self.expected_size)
    }

    async fn invoke(&self, input: &GenerationInput) -> Result<Generation> {
        let prompt = self.deps.prompt(input).await;
        let image = self.deps.input_image(input).await?;

        let mut parts = vec![Part {
            text: Some(prompt),
            inline_data: None,
        }];
        if let Some(image) = image {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    data: image.to_base64(),
                    mime_type: image.mime,
                }),
            });
        }

        let request = GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: ["TEXT", "IMAGE"],
            },
        };

        let response = self
            .deps
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.id, error = %e, "upstream stream request failed");
                ProviderError::connection(&e)
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        let mut accumulator = StreamAccumulator::default();
        let mut events = std::pin::pin!(response.bytes_stream().eventsource());

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| ProviderError::Connection(format!("stream interrupted: {e}")))?;
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }

            match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => accumulator.extend(chunk.into_chunks()),
                Err(e) => {
                    tracing::debug!(provider = %self.id, error = %e, "skipping unparseable stream chunk");
                }
            }
        }

        let drained = accumulator.finish();
        let image_url = match drained.image {
            Some((mime, data)) => Some(self.deps.store_base64(&data, &mime).await?),
            None => None,
        };

        Ok(Generation {
            image_url,
            text: drained.text,
            usage: drained.usage,
        })
    }
}
