use std::sync::Arc;

use indexmap::IndexMap;
use mosaic_config::{Config, ProviderConfig, ProviderKind};
use mosaic_core::ProviderId;
use mosaic_store::ObjectStore;
use secrecy::SecretString;

use crate::{
    adapter::{Adapter, AdapterDeps, gemini::GeminiAdapter, images_api::ImagesApiAdapter, prediction::PredictionAdapter},
    enhance::{ChatPromptEnhancer, PromptEnhancer},
    error::{ProviderError, Result},
    http_client::http_client,
    poll::PollPolicy,
};

/// Configured adapters, in configuration order
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: IndexMap<ProviderId, Arc<dyn Adapter>>,
}

impl ProviderRegistry {
    /// Build a registry from ready-made adapters
    pub fn from_adapters(adapters: impl IntoIterator<Item = Arc<dyn Adapter>>) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.id().clone(), adapter))
                .collect(),
        }
    }

    pub fn get(&self, id: &ProviderId) -> Option<&Arc<dyn Adapter>> {
        self.adapters.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Adapter>> {
        self.adapters.values()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Look up every selected provider, failing on the first unknown id
    pub fn select(&self, ids: &[ProviderId]) -> std::result::Result<Vec<Arc<dyn Adapter>>, ProviderId> {
        ids.iter()
            .map(|id| self.adapters.get(id).cloned().ok_or_else(|| id.clone()))
            .collect()
    }
}

/// Builds a [`ProviderRegistry`] from configuration
pub struct RegistryBuilder<'a> {
    config: &'a Config,
    storage: Arc<dyn ObjectStore>,
}

impl<'a> RegistryBuilder<'a> {
    pub fn new(config: &'a Config, storage: Arc<dyn ObjectStore>) -> Self {
        Self { config, storage }
    }

    pub fn build(self) -> Result<ProviderRegistry> {
        let client = http_client();

        let enhancer = self.config.enhancer.as_ref().map(|enhancer| {
            tracing::debug!(model = %enhancer.model, "prompt enhancement enabled");
            Arc::new(ChatPromptEnhancer::new(client.clone(), enhancer)) as Arc<dyn PromptEnhancer>
        });

        let deps = AdapterDeps {
            client,
            storage: self.storage,
            enhancer,
        };

        let mut adapters: IndexMap<ProviderId, Arc<dyn Adapter>> = IndexMap::new();

        for (name, provider_config) in &self.config.providers {
            tracing::debug!(provider = %name, kind = provider_config.kind.as_str(), "initializing provider");

            let id = ProviderId::new(name.clone());
            let api_key = resolve_api_key(name, provider_config)?;

            let adapter: Arc<dyn Adapter> = match provider_config.kind {
                ProviderKind::ImagesApi => Arc::new(ImagesApiAdapter::new(id.clone(), provider_config, api_key, deps.clone())),
                ProviderKind::Prediction => {
                    let policy = PollPolicy::from_config(&provider_config.poll)
                        .map_err(|e| ProviderError::Config(format!("provider '{name}': {e}")))?;
                    Arc::new(PredictionAdapter::new(
                        id.clone(),
                        provider_config,
                        api_key,
                        policy,
                        deps.clone(),
                    )?)
                }
                ProviderKind::Gemini => Arc::new(GeminiAdapter::new(id.clone(), provider_config, api_key, deps.clone())),
            };

            adapters.insert(id, adapter);
        }

        tracing::debug!("provider registry initialized with {} provider(s)", adapters.len());

        Ok(ProviderRegistry { adapters })
    }
}

fn resolve_api_key(name: &str, config: &ProviderConfig) -> Result<SecretString> {
    config
        .api_key
        .clone()
        .ok_or_else(|| ProviderError::Config(format!("API key required for provider '{name}'")))
}
