use serde::Deserialize;
use std::collections::BTreeMap;

use crate::channels::ChannelSpec;

/// Root pipeline configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CAMPAIGN_PIPELINE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub generation: GenerationClientConfig,
    #[serde(default)]
    pub qa: QaConfig,
    #[serde(default = "default_channels")]
    pub channels: BTreeMap<String, ChannelSpec>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Remote generative-media endpoint and retry policy.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationClientConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff wait. `None` leaves the backoff uncapped.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_num_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    #[serde(default)]
    pub models: ModelCatalog,
}

/// Model identifiers per generation kind.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelCatalog {
    #[serde(default = "default_video_model")]
    pub video_generation: String,
    #[serde(default = "default_image_to_video_model")]
    pub image_to_video: String,
    #[serde(default = "default_tts_model")]
    pub tts: String,
    #[serde(default = "default_upscale_model")]
    pub image_upscale: String,
    #[serde(default = "default_background_removal_model")]
    pub background_removal: String,
}

/// Thresholds and toggles for the automated quality gate.
#[derive(Debug, Clone, Deserialize)]
pub struct QaConfig {
    #[serde(default = "default_auto_approve_threshold")]
    pub auto_approve_threshold: f64,
    #[serde(default = "default_human_review_threshold")]
    pub human_review_threshold: f64,
    #[serde(default = "default_color_match_threshold")]
    pub color_match_threshold: f64,
    #[serde(default = "default_true")]
    pub logo_visibility_required: bool,
    #[serde(default = "default_true")]
    pub typo_check: bool,
    #[serde(default = "default_true")]
    pub product_info_check: bool,
    #[serde(default = "default_true")]
    pub cta_visibility_check: bool,
    #[serde(default = "default_min_resolution")]
    pub min_resolution: String,
    /// Duration ceiling for platforms that do not declare one.
    #[serde(default = "default_max_duration_secs")]
    pub default_max_duration_secs: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_generation_concurrency")]
    pub generation_concurrency: usize,
    #[serde(default = "default_distribution_concurrency")]
    pub distribution_concurrency: usize,
    /// QA target when a batch names no channels.
    #[serde(default = "default_channel")]
    pub default_channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_host")]
    pub host: String,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_api_base_url() -> String {
    "https://api.replicate.com/v1".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    2000
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_num_inference_steps() -> u32 {
    20
}
fn default_guidance_scale() -> f64 {
    7.5
}
fn default_video_model() -> String {
    "runwayml/gen-3-lite:b09e6e42b92a6dfe3f134e37341f93eafdd62e76".to_string()
}
fn default_image_to_video_model() -> String {
    "stability-ai/stable-video-diffusion".to_string()
}
fn default_tts_model() -> String {
    "coqui/xtts-v2:ff8b6f76baf30e0e0f51fd5d9d5b6bcbe63f4eca80fa97b4e68b0e4d7f0d3e5f".to_string()
}
fn default_upscale_model() -> String {
    "stability-ai/real-esrgan".to_string()
}
fn default_background_removal_model() -> String {
    "zsxkzsx/transparent-background".to_string()
}
fn default_auto_approve_threshold() -> f64 {
    95.0
}
fn default_human_review_threshold() -> f64 {
    80.0
}
fn default_color_match_threshold() -> f64 {
    0.85
}
fn default_true() -> bool {
    true
}
fn default_min_resolution() -> String {
    "1080p".to_string()
}
fn default_max_duration_secs() -> u32 {
    90
}
fn default_generation_concurrency() -> usize {
    4
}
fn default_distribution_concurrency() -> usize {
    4
}
fn default_channel() -> String {
    "instagram_reels".to_string()
}
fn default_metrics_host() -> String {
    "0.0.0.0".to_string()
}
fn default_metrics_port() -> u16 {
    9091
}

/// The built-in channel registry.
pub fn default_channels() -> BTreeMap<String, ChannelSpec> {
    let mut channels = BTreeMap::new();
    channels.insert(
        "instagram_reels".to_string(),
        ChannelSpec::new("instagram")
            .with_max_duration(90)
            .with_aspect_ratio("9:16"),
    );
    channels.insert(
        "tiktok".to_string(),
        ChannelSpec::new("tiktok")
            .with_max_duration(60)
            .with_aspect_ratio("9:16"),
    );
    channels.insert(
        "youtube_shorts".to_string(),
        ChannelSpec::new("youtube")
            .with_max_duration(60)
            .with_aspect_ratio("9:16"),
    );
    channels.insert(
        "ctv".to_string(),
        ChannelSpec::new("ctv")
            .with_aspect_ratio("16:9")
            .with_quality("4k"),
    );
    channels.insert(
        "dooh".to_string(),
        ChannelSpec {
            brightness: Some("high".to_string()),
            ..ChannelSpec::new("dooh").with_aspect_ratio("16:9|1:1")
        },
    );
    channels
}

impl Default for GenerationClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_token: None,
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: None,
            request_timeout_secs: default_request_timeout_secs(),
            num_inference_steps: default_num_inference_steps(),
            guidance_scale: default_guidance_scale(),
            models: ModelCatalog::default(),
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            video_generation: default_video_model(),
            image_to_video: default_image_to_video_model(),
            tts: default_tts_model(),
            image_upscale: default_upscale_model(),
            background_removal: default_background_removal_model(),
        }
    }
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            auto_approve_threshold: default_auto_approve_threshold(),
            human_review_threshold: default_human_review_threshold(),
            color_match_threshold: default_color_match_threshold(),
            logo_visibility_required: true,
            typo_check: true,
            product_info_check: true,
            cta_visibility_check: true,
            min_resolution: default_min_resolution(),
            default_max_duration_secs: default_max_duration_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation_concurrency: default_generation_concurrency(),
            distribution_concurrency: default_distribution_concurrency(),
            default_channel: default_channel(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_metrics_host(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generation: GenerationClientConfig::default(),
            qa: QaConfig::default(),
            channels: default_channels(),
            pipeline: PipelineConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file and environment variables.
    /// Environment variables take precedence over the file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_PIPELINE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_published_thresholds() {
        let config = AppConfig::default();
        assert_eq!(config.qa.auto_approve_threshold, 95.0);
        assert_eq!(config.qa.human_review_threshold, 80.0);
        assert_eq!(config.qa.color_match_threshold, 0.85);
        assert_eq!(config.generation.max_retries, 3);
        assert_eq!(config.generation.base_delay_ms, 2000);
        assert!(config.generation.max_delay_ms.is_none());
        assert_eq!(config.pipeline.default_channel, "instagram_reels");
    }

    #[test]
    fn test_default_channel_registry() {
        let channels = default_channels();
        assert_eq!(channels.len(), 5);
        assert_eq!(channels["tiktok"].max_duration_secs, Some(60));
        assert_eq!(channels["dooh"].aspect_ratio.as_deref(), Some("16:9|1:1"));
        assert_eq!(channels["ctv"].quality.as_deref(), Some("4k"));
        assert!(channels["ctv"].max_duration_secs.is_none());
        assert!(channels.values().all(|c| c.enabled));
    }

    #[test]
    fn test_load_without_sources_falls_back_to_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.channels.len(), 5);
        assert_eq!(config.pipeline.generation_concurrency, 4);
    }

    #[test]
    fn test_demo_config_covers_demo_request_channels() {
        let demos = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos");
        let config = AppConfig::load(Some(&format!("{}/pipeline.toml", demos))).unwrap();
        let request: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(format!("{}/batch_request.json", demos)).unwrap(),
        )
        .unwrap();

        let targets = request["generation_config"]["target_channels"]
            .as_array()
            .unwrap();
        assert!(!targets.is_empty());
        for target in targets {
            let name = target.as_str().unwrap();
            let spec = config.channels.get(name);
            assert!(spec.is_some_and(|c| c.enabled), "{} not configured", name);
        }
    }
}
