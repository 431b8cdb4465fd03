//! Upstream analysis seam. The pipeline does not inspect media itself; an
//! analyzer supplies quality signals that are merged into content metadata
//! before the QA gate runs.

use async_trait::async_trait;
use campaign_core::content::Content;
use serde_json::{Map, Value};

#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Signals keyed by the names in `campaign_core::content::signals`.
    async fn analyze(&self, content: &Content) -> anyhow::Result<Map<String, Value>>;
}

/// Supplies no signals; QA falls back to its defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalyzer;

#[async_trait]
impl ContentAnalyzer for NoopAnalyzer {
    async fn analyze(&self, _content: &Content) -> anyhow::Result<Map<String, Value>> {
        Ok(Map::new())
    }
}
