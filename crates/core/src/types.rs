//! Input domain: products, brand guidelines, templates and the generation
//! configuration that together describe one batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::channels::{SchedulingConfig, SchedulingMode};

// ─── Products ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Electronics,
    Fashion,
    HomeGarden,
    Beauty,
    FoodBeverage,
    Sports,
    Toys,
    Automotive,
    Other,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Electronics => "electronics",
            ProductCategory::Fashion => "fashion",
            ProductCategory::HomeGarden => "home_garden",
            ProductCategory::Beauty => "beauty",
            ProductCategory::FoodBeverage => "food_beverage",
            ProductCategory::Sports => "sports",
            ProductCategory::Toys => "toys",
            ProductCategory::Automotive => "automotive",
            ProductCategory::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(default = "Uuid::new_v4")]
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub category: ProductCategory,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ProductCategory,
        price: f64,
    ) -> Self {
        Self {
            product_id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            image_urls: Vec::new(),
            category,
            price,
            currency: default_currency(),
            attributes: serde_json::Map::new(),
            sku: None,
            brand: None,
            tags: Vec::new(),
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandGuidelines {
    pub brand_name: String,
    #[serde(default)]
    pub brand_colors: Vec<String>,
    #[serde(default)]
    pub fonts: Vec<String>,
    #[serde(default)]
    pub tone_of_voice: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
}

/// All input material for one campaign run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBundle {
    pub customer_id: String,
    pub campaign_id: String,
    pub products: Vec<Product>,
    pub brand_guidelines: BrandGuidelines,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

// ─── Templates ──────────────────────────────────────────────────────────────

/// Supported output frame shapes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    Portrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 4] = [
        AspectRatio::Vertical,
        AspectRatio::Landscape,
        AspectRatio::Square,
        AspectRatio::Portrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Vertical => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "4:5",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| format!("Invalid aspect ratio: {}", s))
    }
}

/// Creative archetype of a template. Each maps to a fixed style clause in the
/// generation prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    ProductAd,
    BrandStory,
    Testimonial,
    Tutorial,
    Unboxing,
    Comparison,
    Lifestyle,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::ProductAd => "product_ad",
            TemplateType::BrandStory => "brand_story",
            TemplateType::Testimonial => "testimonial",
            TemplateType::Tutorial => "tutorial",
            TemplateType::Unboxing => "unboxing",
            TemplateType::Comparison => "comparison",
            TemplateType::Lifestyle => "lifestyle",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_aspect_ratios")]
    pub aspect_ratios: Vec<AspectRatio>,
    #[serde(default = "default_durations")]
    pub duration_seconds: Vec<u32>,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default)]
    pub transitions: Vec<String>,
    #[serde(default)]
    pub effects: Vec<String>,
}

fn default_aspect_ratios() -> Vec<AspectRatio> {
    vec![AspectRatio::Vertical]
}
fn default_durations() -> Vec<u32> {
    vec![15]
}
fn default_resolution() -> String {
    "1080p".to_string()
}
fn default_frame_rate() -> u32 {
    30
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            aspect_ratios: default_aspect_ratios(),
            duration_seconds: default_durations(),
            resolution: default_resolution(),
            frame_rate: default_frame_rate(),
            transitions: Vec::new(),
            effects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub voiceover_enabled: bool,
    #[serde(default = "default_music_enabled")]
    pub music_enabled: bool,
    #[serde(default)]
    pub music_genre: Option<String>,
    #[serde(default = "default_voiceover_gender")]
    pub voiceover_gender: String,
}

fn default_music_enabled() -> bool {
    true
}
fn default_voiceover_gender() -> String {
    "neutral".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            voiceover_enabled: false,
            music_enabled: default_music_enabled(),
            music_genre: None,
            voiceover_gender: default_voiceover_gender(),
        }
    }
}

/// On-screen copy. `headline_template` may contain `{{product_name}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextOverlay {
    #[serde(default = "default_headline_template")]
    pub headline_template: String,
    #[serde(default)]
    pub subheadline_template: Option<String>,
    #[serde(default = "default_cta_text")]
    pub cta_text: Option<String>,
    #[serde(default = "default_text_position")]
    pub text_position: String,
}

fn default_headline_template() -> String {
    "{{product_name}}".to_string()
}
fn default_cta_text() -> Option<String> {
    Some("Shop Now!".to_string())
}
fn default_text_position() -> String {
    "bottom".to_string()
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            headline_template: default_headline_template(),
            subheadline_template: None,
            cta_text: default_cta_text(),
            text_position: default_text_position(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    #[serde(default = "Uuid::new_v4")]
    pub template_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    #[serde(default)]
    pub visual_config: VisualConfig,
    #[serde(default)]
    pub audio_config: AudioConfig,
    #[serde(default)]
    pub text_overlay: TextOverlay,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Template {
    pub fn new(name: impl Into<String>, template_type: TemplateType) -> Self {
        Self {
            template_id: Uuid::new_v4(),
            name: name.into(),
            template_type,
            visual_config: VisualConfig::default(),
            audio_config: AudioConfig::default(),
            text_overlay: TextOverlay::default(),
            description: None,
            tags: Vec::new(),
        }
    }

    /// Number of (aspect ratio, duration) variants rendered per product.
    pub fn variants_per_product(&self) -> usize {
        self.visual_config.aspect_ratios.len() * self.visual_config.duration_seconds.len()
    }
}

// ─── Generation config ──────────────────────────────────────────────────────

/// Immutable per-batch settings: where approved content goes and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_target_channels")]
    pub target_channels: Vec<String>,
    #[serde(default)]
    pub scheduling_mode: SchedulingMode,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

fn default_batch_size() -> u32 {
    10
}
fn default_target_channels() -> Vec<String> {
    vec![
        "instagram_reels".to_string(),
        "tiktok".to_string(),
        "youtube_shorts".to_string(),
    ]
}
fn default_codec() -> String {
    "h264".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            target_channels: default_target_channels(),
            scheduling_mode: SchedulingMode::Immediate,
            scheduled_time: None,
            resolution: default_resolution(),
            codec: default_codec(),
            frame_rate: default_frame_rate(),
        }
    }
}

impl GenerationConfig {
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn scheduling(&self) -> SchedulingConfig {
        SchedulingConfig {
            mode: self.scheduling_mode,
            scheduled_time: self.scheduled_time,
            ..SchedulingConfig::default()
        }
    }
}
