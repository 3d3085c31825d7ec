use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use mosaic_config::HttpStorageConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{Result, StoreError};

/// Durable blob storage that hands back a public URL
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return the URL it is served from
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Object store speaking plain HTTP `PUT`
pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<SecretString>,
    public_base_url: String,
}

impl HttpObjectStore {
    /// Create a store from configuration
    pub fn new(config: &HttpStorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build storage client: {e}")))?;

        let endpoint = config.endpoint.as_str().trim_end_matches('/');
        let public_base_url = config.public_base_url.as_ref().map_or_else(
            || format!("{endpoint}/{}", config.bucket),
            |url| url.as_str().trim_end_matches('/').to_owned(),
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            public_base_url,
        })
    }

    fn upload_url(&self, key: &str) -> String {
        format!("{}/{}/{key}", self.endpoint.as_str().trim_end_matches('/'), self.bucket)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let size = bytes.len();
        let mut request = self
            .client
            .put(self.upload_url(key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Upload {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(key, size, "stored object");

        Ok(format!("{}/{key}", self.public_base_url))
    }
}

/// Store that keeps nothing and returns the object as a `data:` URL
///
/// The URL is self-contained, so it renders in a browser and resolves
/// again when a client feeds it back as an input image.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineObjectStore;

#[async_trait]
impl ObjectStore for InlineObjectStore {
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        tracing::trace!(key, size = bytes.len(), "inlining object");
        Ok(format!("data:{content_type};base64,{}", STANDARD.encode(bytes)))
    }
}
