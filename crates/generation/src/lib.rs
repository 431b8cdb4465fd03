//! Generative-media access for the campaign pipeline.
//!
//! - [`client`]: backend seam, retry policy and the [`GenerationClient`]
//! - [`http`]: prediction-API backend over HTTP
//! - [`generator`]: prompt construction and per-combination content rendering

pub mod client;
pub mod generator;
pub mod http;

pub use client::{
    Artifact, GenerationBackend, GenerationClient, GenerationError, GenerationParams, ModelKind,
    RetryPolicy,
};
pub use generator::{build_prompt, ContentGenerator, GenerationOutcome};
pub use http::HttpGenerationBackend;
