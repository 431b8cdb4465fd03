//! Generative-media client with bounded exponential-backoff retry.
//!
//! [`GenerationClient`] knows nothing about products or templates. It turns a
//! prompt plus frame shape into a backend request, runs it under a
//! [`RetryPolicy`] and reports either an [`Artifact`] or the last error seen.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campaign_core::config::{GenerationClientConfig, ModelCatalog};
use campaign_core::types::AspectRatio;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("No output from generation backend")]
    NoOutput,

    #[error("Generation backend error: {0}")]
    Backend(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generation backend not configured: {0}")]
    NotConfigured(String),

    #[error("Max retries exceeded")]
    RetriesExhausted,
}

/// The remote call the client retries. Returns the raw model output, or
/// `None` when the call completed without producing anything.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn run(&self, model_id: &str, input: &Value) -> Result<Option<Value>, GenerationError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Which model family a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    VideoGeneration,
    ImageToVideo,
    Tts,
    ImageUpscale,
    BackgroundRemoval,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::VideoGeneration => "video_generation",
            ModelKind::ImageToVideo => "image_to_video",
            ModelKind::Tts => "tts",
            ModelKind::ImageUpscale => "image_upscale",
            ModelKind::BackgroundRemoval => "background_removal",
        }
    }

    pub fn model_id<'a>(&self, catalog: &'a ModelCatalog) -> &'a str {
        match self {
            ModelKind::VideoGeneration => &catalog.video_generation,
            ModelKind::ImageToVideo => &catalog.image_to_video,
            ModelKind::Tts => &catalog.tts,
            ModelKind::ImageUpscale => &catalog.image_upscale,
            ModelKind::BackgroundRemoval => &catalog.background_removal,
        }
    }
}

/// Retry budget: `max_retries` total attempts, waiting
/// `base_delay × 2^attempt` after each failed one.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }

    /// Wait after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

/// Per-request overrides for the diffusion parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub num_inference_steps: Option<u32>,
    pub guidance_scale: Option<f64>,
    pub seed: Option<u64>,
}

/// Body sent to the video model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoInput {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub duration: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub seed: Option<u64>,
}

/// Body sent to the speech model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpeechInput {
    pub text: String,
    pub language: String,
    pub speaker_name: String,
}

/// A successfully generated artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub locator: String,
    pub processing_time: Duration,
    pub model_id: String,
    pub attempts: u32,
}

/// Pixel size rendered for an aspect ratio. Ratios without a dedicated size
/// fall back to 16:9.
pub fn dimensions(aspect_ratio: AspectRatio) -> (u32, u32) {
    match aspect_ratio {
        AspectRatio::Vertical => (540, 960),
        AspectRatio::Landscape => (1280, 720),
        AspectRatio::Square => (1080, 1080),
        AspectRatio::Portrait => (1280, 720),
    }
}

/// Reduce raw model output to an artifact locator. List outputs yield their
/// first element; null, empty strings and empty lists yield nothing.
pub fn normalize_output(output: Value) -> Option<String> {
    match output {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Array(items) => items.into_iter().next().and_then(normalize_output),
        Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
    models: ModelCatalog,
    num_inference_steps: u32,
    guidance_scale: f64,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, policy: RetryPolicy) -> Self {
        let defaults = GenerationClientConfig::default();
        Self {
            backend,
            policy,
            models: defaults.models,
            num_inference_steps: defaults.num_inference_steps,
            guidance_scale: defaults.guidance_scale,
        }
    }

    pub fn from_config(backend: Arc<dyn GenerationBackend>, config: &GenerationClientConfig) -> Self {
        Self {
            backend,
            policy: RetryPolicy::from_config(config),
            models: config.models.clone(),
            num_inference_steps: config.num_inference_steps,
            guidance_scale: config.guidance_scale,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    pub fn video_input(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        duration: u32,
        params: &GenerationParams,
    ) -> VideoInput {
        let (width, height) = dimensions(aspect_ratio);
        VideoInput {
            prompt: prompt.to_string(),
            width,
            height,
            duration,
            num_inference_steps: params.num_inference_steps.unwrap_or(self.num_inference_steps),
            guidance_scale: params.guidance_scale.unwrap_or(self.guidance_scale),
            seed: params.seed,
        }
    }

    /// Render a video from a text prompt.
    pub async fn generate(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        duration: u32,
        params: &GenerationParams,
    ) -> Result<Artifact, GenerationError> {
        let input = self.video_input(prompt, aspect_ratio, duration, params);
        let input = serde_json::to_value(&input).map_err(|e| GenerationError::Backend(e.to_string()))?;
        self.execute_with_retry(ModelKind::VideoGeneration, input).await
    }

    /// Synthesize narration audio.
    pub async fn generate_speech(
        &self,
        text: &str,
        language: &str,
        speaker_gender: &str,
    ) -> Result<Artifact, GenerationError> {
        let speaker = match speaker_gender {
            "male" => "male",
            "female" => "female",
            _ => "neutral",
        };
        let input = SpeechInput {
            text: text.to_string(),
            language: language.to_string(),
            speaker_name: speaker.to_string(),
        };
        let input = serde_json::to_value(&input).map_err(|e| GenerationError::Backend(e.to_string()))?;
        self.execute_with_retry(ModelKind::Tts, input).await
    }

    async fn execute_with_retry(
        &self,
        kind: ModelKind,
        input: Value,
    ) -> Result<Artifact, GenerationError> {
        let model_id = kind.model_id(&self.models).to_string();
        let started = Instant::now();
        let mut last_error = GenerationError::RetriesExhausted;

        for attempt in 0..self.policy.max_retries {
            metrics::counter!("generation.attempts", "model" => kind.as_str()).increment(1);
            debug!(model = %model_id, attempt, "Calling generation backend");

            let result = match self.backend.run(&model_id, &input).await {
                Ok(Some(output)) => normalize_output(output).ok_or(GenerationError::NoOutput),
                Ok(None) => Err(GenerationError::NoOutput),
                Err(e) => Err(e),
            };

            match result {
                Ok(locator) => {
                    let processing_time = started.elapsed();
                    metrics::histogram!("generation.latency_ms", "model" => kind.as_str())
                        .record(processing_time.as_millis() as f64);
                    info!(
                        model = %model_id,
                        attempts = attempt + 1,
                        elapsed_ms = processing_time.as_millis() as u64,
                        "Generation succeeded"
                    );
                    return Ok(Artifact {
                        locator,
                        processing_time,
                        model_id,
                        attempts: attempt + 1,
                    });
                }
                Err(e) => {
                    warn!(model = %model_id, attempt, error = %e, "Generation attempt failed");
                    last_error = e;
                    if attempt + 1 < self.policy.max_retries {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        metrics::counter!("generation.failures", "model" => kind.as_str()).increment(1);
        Err(last_error)
    }
}
