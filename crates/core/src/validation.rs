//! Input validation applied before a batch is accepted.

use crate::error::{CampaignError, CampaignResult};
use crate::types::{AssetBundle, Product, Template};

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 200;
const MAX_DURATION_SECS: u32 = 180;

/// Collect every problem with a product. An empty vector means valid.
pub fn product_errors(product: &Product) -> Vec<String> {
    let mut errors = Vec::new();
    let name_len = product.name.trim().chars().count();

    if name_len == 0 {
        errors.push("Product name is required".to_string());
    } else if name_len < MIN_NAME_LEN {
        errors.push(format!(
            "Product name must be at least {} characters",
            MIN_NAME_LEN
        ));
    } else if name_len > MAX_NAME_LEN {
        errors.push(format!(
            "Product name must be less than {} characters",
            MAX_NAME_LEN
        ));
    }

    if product.description.trim().is_empty() {
        errors.push("Product description is required".to_string());
    }

    if !product.price.is_finite() || product.price < 0.0 {
        errors.push("Price must be non-negative".to_string());
    }

    for url in &product.image_urls {
        if !is_web_url(url) {
            errors.push(format!("Invalid image URL: {}", url));
        }
    }

    errors
}

/// Collect every problem with a template. An empty vector means valid.
pub fn template_errors(template: &Template) -> Vec<String> {
    let mut errors = Vec::new();

    if template.name.trim().is_empty() {
        errors.push("Template name is required".to_string());
    }

    let visual = &template.visual_config;
    if visual.aspect_ratios.is_empty() {
        errors.push("Template must declare at least one aspect ratio".to_string());
    }
    if visual.duration_seconds.is_empty() {
        errors.push("Template must declare at least one duration".to_string());
    }
    if visual
        .duration_seconds
        .iter()
        .any(|d| *d < 1 || *d > MAX_DURATION_SECS)
    {
        errors.push(format!(
            "Duration must be between 1 and {} seconds",
            MAX_DURATION_SECS
        ));
    }

    errors
}

/// Validate a whole batch request, reporting every problem at once.
pub fn validate_batch_inputs(bundle: &AssetBundle, template: &Template) -> CampaignResult<()> {
    let mut errors = Vec::new();

    if bundle.customer_id.trim().is_empty() {
        errors.push("Customer id is required".to_string());
    }
    if bundle.campaign_id.trim().is_empty() {
        errors.push("Campaign id is required".to_string());
    }
    if bundle.products.is_empty() {
        errors.push("At least one product is required".to_string());
    }

    for product in &bundle.products {
        errors.extend(
            product_errors(product)
                .into_iter()
                .map(|e| format!("{} ({})", e, product.product_id)),
        );
    }
    errors.extend(template_errors(template));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CampaignError::Validation(errors))
    }
}

fn is_web_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}
