use async_trait::async_trait;
use mosaic_config::EnhancerConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Rewrites a prompt before generation
#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    async fn enhance(&self, prompt: &str) -> Result<String>;
}

/// Enhance `prompt` when asked to, keeping the original on any failure
pub async fn enhance_or_keep(enhancer: Option<&dyn PromptEnhancer>, prompt: &str, requested: bool) -> String {
    let Some(enhancer) = enhancer.filter(|_| requested && !prompt.trim().is_empty()) else {
        return prompt.to_string();
    };

    match enhancer.enhance(prompt).await {
        Ok(rewritten) if !rewritten.trim().is_empty() => rewritten,
        Ok(_) => prompt.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "prompt enhancement failed, keeping original prompt");
            prompt.to_string()
        }
    }
}

/// Enhancer backed by an OpenAI-compatible chat completion endpoint
pub struct ChatPromptEnhancer {
    client: Client,
    api_key: SecretString,
    url: String,
    model: String,
    instruction: String,
}

impl ChatPromptEnhancer {
    pub fn new(client: Client, config: &EnhancerConfig) -> Self {
        let base_url = config
            .base_url
            .as_ref()
            .map_or(DEFAULT_BASE_URL, url::Url::as_str)
            .trim_end_matches('/');

        Self {
            client,
            api_key: config.api_key.clone(),
            url: format!("{base_url}/chat/completions"),
            model: config.model.clone(),
            instruction: config.instruction.clone(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[async_trait]
impl PromptEnhancer for ChatPromptEnhancer {
    async fn enhance(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.instruction,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::connection(&e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or(ProviderError::EmptyResult)
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    use super::*;

    struct Failing;

    #[async_trait]
    impl PromptEnhancer for Failing {
        async fn enhance(&self, _prompt: &str) -> Result<String> {
            Err(ProviderError::Connection("refused".into()))
        }
    }

    struct Shouting;

    #[async_trait]
    impl PromptEnhancer for Shouting {
        async fn enhance(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_uppercase())
        }
    }

    #[tokio::test]
    async fn failure_keeps_original_prompt() {
        let prompt = enhance_or_keep(Some(&Failing), "a red bicycle", true).await;
        assert_eq!(prompt, "a red bicycle");
    }

    #[tokio::test]
    async fn skipped_unless_requested() {
        assert_eq!(enhance_or_keep(Some(&Shouting), "a red bicycle", false).await, "a red bicycle");
        assert_eq!(enhance_or_keep(None, "a red bicycle", true).await, "a red bicycle");
        assert_eq!(enhance_or_keep(Some(&Shouting), "a red bicycle", true).await, "A RED BICYCLE");
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{address}/v1")
    }

    fn config(base_url: &str) -> EnhancerConfig {
        toml::from_str(&format!("api_key = \"sk-test\"\nbase_url = \"{base_url}\"")).unwrap()
    }

    #[tokio::test]
    async fn chat_enhancer_reads_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["messages"][1]["content"], "cat");
                Json(json!({ "choices": [{ "message": { "content": "  a fluffy ginger cat  " } }] }))
            }),
        );
        let enhancer = ChatPromptEnhancer::new(Client::new(), &config(&serve(app).await));

        assert_eq!(enhancer.enhance("cat").await.unwrap(), "a fluffy ginger cat");
    }

    #[tokio::test]
    async fn chat_enhancer_surfaces_upstream_status() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let enhancer = ChatPromptEnhancer::new(Client::new(), &config(&serve(app).await));

        let error = enhancer.enhance("cat").await.unwrap_err();
        assert!(matches!(error, ProviderError::Upstream { status: 401, .. }));
    }
}
