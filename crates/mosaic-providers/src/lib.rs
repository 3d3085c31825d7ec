//! Provider adapters
//!
//! Each adapter turns one upstream protocol (single request, submit and
//! poll, or a token stream) into the same [`Generation`] shape. Nothing
//! outside this crate looks at provider wire formats.

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod adapter;
mod enhance;
mod error;
mod http_client;
mod input;
mod output;
mod poll;
mod registry;
mod stream;

pub use adapter::{
    Adapter, AdapterDeps, AdapterDescriptor, Generation, GenerationInput, gemini::GeminiAdapter,
    images_api::ImagesApiAdapter, prediction::PredictionAdapter, run,
};
pub use enhance::{ChatPromptEnhancer, PromptEnhancer, enhance_or_keep};
pub use error::{ProviderError, Result};
pub use http_client::http_client;
pub use input::{ResolvedImage, resolve_input_image};
pub use output::store_or_inline;
pub use poll::{PollPolicy, PollStatus, poll_until};
pub use registry::{ProviderRegistry, RegistryBuilder};
pub use stream::{Chunk, Drained, StreamAccumulator};
