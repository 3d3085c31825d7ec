use async_trait::async_trait;
use mosaic_config::{ProviderConfig, ProviderKind};
use mosaic_core::{Modality, OutputSize, ProviderId, Usage};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{Adapter, AdapterDeps, AdapterDescriptor, Generation, GenerationInput, trim_base};
use crate::{
    error::{ProviderError, Result},
    input::ResolvedImage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "dall-e-3";

/// Single-shot adapter for the `OpenAI` images API
///
/// Prompts go to `/images/generations`; with a reference image the
/// request becomes a multipart `/images/edits` call.
pub struct ImagesApiAdapter {
    id: ProviderId,
    deps: AdapterDeps,
    api_key: SecretString,
    base_url: String,
    model: String,
    size: String,
    expected_size: OutputSize,
}

impl ImagesApiAdapter {
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
            size: config.size.clone(),
            expected_size,
        }
    }

    /// `gpt-image-*` models always answer in base64 and reject `response_format`
    fn response_format(&self) -> Option<&'static str> {
        self.model.starts_with("dall-e").then_some("b64_json")
    }

    async fn generate(&self, prompt: &str) -> Result<reqwest::Response> {
        let request = ImagesRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: &self.size,
            response_format: self.response_format(),
        };

        self.deps
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::connection(&e))
    }

    async fn edit(&self, prompt: &str, image: ResolvedImage) -> Result<reqwest::Response> {
        let file_name = format!("input.{}", image.extension());
        let part = Part::bytes(image.bytes)
            .file_name(file_name)
            .mime_str(&image.mime)
            .map_err(|e| ProviderError::InvalidInput(format!("unsupported image type: {e}")))?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("prompt", prompt.to_string())
            .text("size", self.size.clone())
            .part("image", part);

        if let Some(format) = self.response_format() {
            form = form.text("response_format", format);
        }

        self.deps
            .client
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::connection(&e))
    }
}

#[derive(Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'static str>,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

#[async_trait]
impl Adapter for ImagesApiAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(ProviderKind::ImagesApi, Modality::Image, self.expected_size)
    }

    async fn invoke(&self, input: &GenerationInput) -> Result<Generation> {
        let prompt = self.deps.prompt(input).await;
        let image = self.deps.input_image(input).await?;

        tracing::debug!(
            provider = %self.id,
            model = %self.model,
            edit = image.is_some(),
            "sending image generation request"
        );

        let response = match image {
            Some(image) => self.edit(&prompt, image).await?,
            None => self.generate(&prompt).await?,
        };

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        let body: ImagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let first = body.data.into_iter().next().ok_or(ProviderError::EmptyResult)?;
        let image_url = match (first.b64_json, first.url) {
            (Some(data), _) => self.deps.store_base64(&data, "image/png").await?,
            (None, Some(url)) => url,
            (None, None) => return Err(ProviderError::EmptyResult),
        };

        Ok(Generation {
            image_url: Some(image_url),
            text: None,
            usage: body.usage,
        })
    }
}
