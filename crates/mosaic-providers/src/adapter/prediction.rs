use async_trait::async_trait;
use mosaic_config::{ProviderConfig, ProviderKind};
use mosaic_core::{Modality, OutputSize, ProviderId};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Adapter, AdapterDeps, AdapterDescriptor, Generation, GenerationInput, trim_base};
use crate::{
    error::{ProviderError, Result},
    poll::{PollPolicy, PollStatus, poll_until},
};

const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Submit-then-poll adapter for Replicate-style prediction APIs
///
/// A model given as `owner/name:version` is submitted by version, a bare
/// `owner/name` through the model's own predictions endpoint.
pub struct PredictionAdapter {
    id: ProviderId,
    deps: AdapterDeps,
    api_key: SecretString,
    base_url: String,
    model: String,
    policy: PollPolicy,
    expected_size: OutputSize,
}

impl PredictionAdapter {
    pub fn new(
        id: ProviderId,
        config: &ProviderConfig,
        api_key: SecretString,
        policy: PollPolicy,
        deps: AdapterDeps,
    ) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| ProviderError::Config(format!("prediction provider '{id}' requires a model")))?;
        let base_url = config.base_url.as_ref().map_or(DEFAULT_BASE_URL, url::Url::as_str);
        let expected_size = mosaic_config::parse_size(&config.size)
            .map(|(width, height)| OutputSize { width, height })
            .unwrap_or_default();

        Ok(Self {
            id,
            deps,
            api_key,
            base_url: trim_base(base_url),
            model,
            policy,
            expected_size,
        })
    }

    fn submit_url(&self) -> (String, Option<&str>) {
        match self.model.split_once(':') {
            Some((_, version)) => (format!("{}/predictions", self.base_url), Some(version)),
            None => (format!("{}/models/{}/predictions", self.base_url, self.model), None),
        }
    }

    async fn submit(&self, input: PredictionInput<'_>) -> Result<Prediction> {
        let (url, version) = self.submit_url();
        let request = PredictionRequest { version, input };

        let response = self
            .deps
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::connection(&e))?;

        read_prediction(response).await
    }

    async fn check(&self, prediction_id: &str) -> Result<PollStatus<Option<String>>> {
        let response = self
            .deps
            .client
            .get(format!("{}/predictions/{prediction_id}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::connection(&e))?;

        read_prediction(response).await?.status()
    }
}

async fn read_prediction(response: reqwest::Response) -> Result<Prediction> {
    if !response.status().is_success() {
        return Err(ProviderError::from_response(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

#[derive(Serialize)]
struct PredictionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: PredictionInput<'a>,
}

#[derive(Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<String>,
}

#[derive(Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl Prediction {
    /// Map the job state onto a poll step; `Done` carries the first output URL
    fn status(self) -> Result<PollStatus<Option<String>>> {
        match self.status.as_str() {
            "succeeded" => Ok(PollStatus::Done(self.output.as_ref().and_then(first_output))),
            "failed" => Err(ProviderError::JobFailed(
                self.error
                    .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_owned))
                    .unwrap_or_else(|| "prediction failed".to_string()),
            )),
            "canceled" => Err(ProviderError::JobFailed("prediction was canceled".to_string())),
            _ => Ok(PollStatus::Pending),
        }
    }
}

fn first_output(output: &Value) -> Option<String> {
    match output {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items.iter().find_map(|item| item.as_str().map(str::to_owned)),
        _ => None,
    }
}

fn aspect_ratio(size: OutputSize) -> Option<String> {
    fn gcd(a: u32, b: u32) -> u32 {
        if b == 0 { a } else { gcd(b, a % b) }
    }

    let divisor = gcd(size.width, size.height);
    (divisor > 0).then(|| format!("{}:{}", size.width / divisor, size.height / divisor))
}

#[async_trait]
impl Adapter for PredictionAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(ProviderKind::Prediction, Modality::Image, self.expected_size)
    }

    async fn invoke(&self, input: &GenerationInput) -> Result<Generation> {
        let prompt = self.deps.prompt(input).await;
        let image = self.deps.input_image(input).await?;

        let prediction = self
            .submit(PredictionInput {
                prompt: &prompt,
                image: image.map(|image| image.to_data_url()),
                aspect_ratio: aspect_ratio(self.expected_size),
            })
            .await?;

        let prediction_id = prediction.id.clone();
        tracing::debug!(provider = %self.id, prediction_id = %prediction_id, "prediction submitted");

        let output = match prediction.status()? {
            PollStatus::Done(output) => output,
            PollStatus::Pending => {
                let prediction_id = prediction_id.as_str();
                poll_until(self.policy, move |_| self.check(prediction_id)).await?
            }
        };

        let image_url = output.ok_or(ProviderError::EmptyResult)?;

        Ok(Generation {
            image_url: Some(image_url),
            text: None,
            usage: None,
        })
    }
}
