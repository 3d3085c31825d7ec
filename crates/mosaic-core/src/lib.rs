#![allow(clippy::must_use_candidate)]

mod context;
mod error;
mod generation;

pub use context::UserId;
pub use error::HttpError;
pub use generation::{
    FailureClass, GenerationRequest, InputImage, Modality, OutcomeKind, OutputSize, ProviderId, ProviderOutcome, Usage,
};
