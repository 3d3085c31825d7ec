use base64::{Engine, engine::general_purpose::STANDARD};
use mosaic_store::ObjectStore;

use crate::input::extension_for;

/// Upload generated bytes, falling back to an inline `data:` URL
///
/// Storage failures never fail the generation.
pub async fn store_or_inline(storage: &dyn ObjectStore, bytes: Vec<u8>, mime: &str) -> String {
    let key = format!("generations/{}.{}", uuid::Uuid::new_v4(), extension_for(mime));

    match storage.store(&key, bytes.clone(), mime).await {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "image upload failed, returning inline data URL");
            format!("data:{mime};base64,{}", STANDARD.encode(&bytes))
        }
    }
}
