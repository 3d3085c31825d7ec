use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Prompt enhancement via an OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnhancerConfig {
    /// API key for the rewrite model
    pub api_key: SecretString,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Rewrite model
    #[serde(default = "default_model")]
    pub model: String,
    /// Instruction given to the rewrite model
    #[serde(default = "default_instruction")]
    pub instruction: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_instruction() -> String {
    "Rewrite the user's image prompt to be vivid and specific. \
     Keep the subject and intent. Reply with the rewritten prompt only."
        .to_string()
}
