//! Turns a (product, template, aspect ratio, duration) combination into a
//! generated [`Content`] item.
//!
//! The generator never returns an error: every failure is recorded on the
//! content itself (`FAILED` plus `error_message`) so the caller can keep
//! going with the rest of the batch.

use std::sync::Arc;

use campaign_core::content::{signals, Content, ContentStatus};
use campaign_core::types::{AspectRatio, Product, Template, TemplateType};
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{GenerationClient, GenerationParams};

const PRODUCT_NAME_PLACEHOLDER: &str = "{{product_name}}";

/// Result of one generation attempt.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub content: Content,
    pub success: bool,
}

impl GenerationOutcome {
    fn succeeded(content: Content) -> Self {
        Self {
            content,
            success: true,
        }
    }

    fn failed(mut content: Content, message: String) -> Self {
        if content.fail(message.clone()).is_err() {
            content.error_message = Some(message);
        }
        Self {
            content,
            success: false,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.content.error_message.as_deref()
    }
}

/// Fixed style clause appended for each template archetype.
pub fn style_clause(template_type: TemplateType) -> &'static str {
    match template_type {
        TemplateType::ProductAd => "Clean, modern product showcase with dynamic camera movements.",
        TemplateType::BrandStory => "Emotional storytelling with brand values.",
        TemplateType::Testimonial => "Authentic customer testimonial style.",
        TemplateType::Tutorial => "Step-by-step demonstration.",
        TemplateType::Unboxing => "Exciting unboxing experience.",
        TemplateType::Comparison => "Side-by-side product comparison.",
        TemplateType::Lifestyle => "Lifestyle context showing product in use.",
    }
}

/// Deterministic text prompt for a product rendered with a template.
pub fn build_prompt(product: &Product, template: &Template) -> String {
    let headline = template
        .text_overlay
        .headline_template
        .replace(PRODUCT_NAME_PLACEHOLDER, &product.name);

    let mut parts = vec![
        format!("Professional video advertisement for {}.", product.name),
        format!("Product description: {}.", product.description),
        format!("Category: {}.", product.category.as_str()),
        format!("Headline: {}.", headline),
    ];

    if let Some(brand) = product.brand.as_deref().filter(|b| !b.is_empty()) {
        parts.push(format!("Brand: {}.", brand));
    }
    if let Some(cta) = template.text_overlay.cta_text.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("Call to action: {}.", cta));
    }
    parts.push(style_clause(template.template_type).to_string());

    parts.join(" ")
}

#[derive(Clone)]
pub struct ContentGenerator {
    client: Arc<GenerationClient>,
    params: GenerationParams,
}

impl ContentGenerator {
    pub fn new(client: Arc<GenerationClient>) -> Self {
        Self {
            client,
            params: GenerationParams::default(),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// A `PENDING` content item for one combination, not yet rendered.
    pub fn prepare(
        &self,
        batch_id: Uuid,
        product: &Product,
        template: &Template,
        aspect_ratio: AspectRatio,
        duration: u32,
    ) -> Content {
        Content::new(
            batch_id,
            product.product_id,
            template.template_id,
            aspect_ratio,
            duration,
        )
    }

    /// Render a prepared content item: `PENDING → GENERATING → GENERATED`, or
    /// `FAILED` carrying the last backend error.
    pub async fn generate(
        &self,
        mut content: Content,
        product: &Product,
        template: &Template,
    ) -> GenerationOutcome {
        if let Err(e) = content.transition(ContentStatus::Generating) {
            return GenerationOutcome::failed(content, e.to_string());
        }

        let prompt = build_prompt(product, template);
        let result = self
            .client
            .generate(
                &prompt,
                content.aspect_ratio,
                content.duration_seconds,
                &self.params,
            )
            .await;

        match result {
            Ok(artifact) => {
                content.video_url = Some(artifact.locator);
                content.set_metadata(
                    signals::PROCESSING_TIME,
                    artifact.processing_time.as_secs_f64(),
                );
                content.set_metadata(signals::MODEL_USED, artifact.model_id);
                content.set_metadata(
                    signals::RESOLUTION,
                    template.visual_config.resolution.clone(),
                );
                if let Err(e) = content.transition(ContentStatus::Generated) {
                    return GenerationOutcome::failed(content, e.to_string());
                }
                metrics::counter!("content.generated").increment(1);
                info!(
                    content_id = %content.content_id,
                    product = %product.name,
                    aspect_ratio = %content.aspect_ratio,
                    duration = content.duration_seconds,
                    "Content generated"
                );
                GenerationOutcome::succeeded(content)
            }
            Err(e) => {
                metrics::counter!("content.generation_failed").increment(1);
                warn!(
                    content_id = %content.content_id,
                    product = %product.name,
                    error = %e,
                    "Content generation failed"
                );
                GenerationOutcome::failed(content, e.to_string())
            }
        }
    }

    /// Prepare and render in one step.
    pub async fn generate_for_product(
        &self,
        batch_id: Uuid,
        product: &Product,
        template: &Template,
        aspect_ratio: AspectRatio,
        duration: u32,
    ) -> GenerationOutcome {
        let content = self.prepare(batch_id, product, template, aspect_ratio, duration);
        self.generate(content, product, template).await
    }
}
