use base64::{Engine, engine::general_purpose::STANDARD};
use mosaic_core::InputImage;
use reqwest::Client;

use crate::error::{ProviderError, Result};

const DEFAULT_MIME: &str = "image/png";

/// Reference image decoded to raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ResolvedImage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }

    /// File extension matching the MIME type
    pub fn extension(&self) -> &'static str {
        extension_for(&self.mime)
    }
}

pub(crate) fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Resolve a client-supplied image into bytes and a MIME type
///
/// Remote URLs are fetched and take their type from `content-type`, data
/// URLs carry their own type, bare base64 is assumed to be PNG.
pub async fn resolve_input_image(client: &Client, image: &InputImage) -> Result<ResolvedImage> {
    match image {
        InputImage::Url(url) => fetch(client, url).await,
        InputImage::DataUrl(url) => decode_data_url(url),
        InputImage::Base64(payload) => Ok(ResolvedImage {
            bytes: decode(payload)?,
            mime: DEFAULT_MIME.to_string(),
        }),
    }
}

async fn fetch(client: &Client, url: &str) -> Result<ResolvedImage> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::InvalidInput(format!("failed to fetch {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(ProviderError::InvalidInput(format!(
            "fetching {url} returned {}",
            response.status()
        )));
    }

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::InvalidInput(format!("failed to read {url}: {e}")))?;

    Ok(ResolvedImage {
        bytes: bytes.to_vec(),
        mime,
    })
}

fn decode_data_url(url: &str) -> Result<ResolvedImage> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ProviderError::InvalidInput("not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ProviderError::InvalidInput("data URL has no payload".to_string()))?;

    let Some(mime) = header.strip_suffix(";base64") else {
        return Err(ProviderError::InvalidInput("data URL is not base64 encoded".to_string()));
    };
    let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };

    Ok(ResolvedImage {
        bytes: decode(payload)?,
        mime: mime.to_string(),
    })
}

fn decode(payload: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ProviderError::InvalidInput(format!("invalid base64: {e}")))
}
