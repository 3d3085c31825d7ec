use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Where generated images are uploaded
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Return images inline as `data:` URLs without uploading
    #[default]
    #[serde(alias = "memory")]
    Inline,
    /// Upload to an HTTP object store
    Http(HttpStorageConfig),
}

/// HTTP object store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpStorageConfig {
    /// Upload endpoint; objects are PUT to `{endpoint}/{bucket}/{key}`
    pub endpoint: Url,
    /// Bucket name
    pub bucket: String,
    /// Bearer token for uploads
    #[serde(default)]
    pub token: Option<SecretString>,
    /// Public base URL objects are served from; defaults to `{endpoint}/{bucket}`
    #[serde(default)]
    pub public_base_url: Option<Url>,
}
