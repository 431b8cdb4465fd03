//! In-process repository backed by concurrent maps.

use std::sync::Arc;

use campaign_core::batch::Batch;
use campaign_core::channels::DistributionReport;
use campaign_core::content::Content;
use campaign_core::error::CampaignResult;
use campaign_core::repository::PipelineRepository;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryRepository {
    batches: Arc<DashMap<Uuid, Batch>>,
    contents: Arc<DashMap<Uuid, Content>>,
    /// Content ids per batch, in first-save order.
    batch_contents: Arc<DashMap<Uuid, Vec<Uuid>>>,
    reports: Arc<DashMap<Uuid, Vec<DistributionReport>>>,
}

impl std::fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("batches", &self.batches.len())
            .field("contents", &self.contents.len())
            .finish()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PipelineRepository for InMemoryRepository {
    fn save_batch(&self, batch: &Batch) -> CampaignResult<()> {
        self.batches.insert(batch.batch_id, batch.clone());
        Ok(())
    }

    fn get_batch(&self, batch_id: &Uuid) -> CampaignResult<Option<Batch>> {
        Ok(self.batches.get(batch_id).map(|b| b.clone()))
    }

    fn save_content(&self, content: &Content) -> CampaignResult<()> {
        let is_new = self
            .contents
            .insert(content.content_id, content.clone())
            .is_none();
        if is_new {
            self.batch_contents
                .entry(content.batch_id)
                .or_default()
                .push(content.content_id);
        }
        Ok(())
    }

    fn get_content(&self, content_id: &Uuid) -> CampaignResult<Option<Content>> {
        Ok(self.contents.get(content_id).map(|c| c.clone()))
    }

    fn list_contents(&self, batch_id: &Uuid) -> CampaignResult<Vec<Content>> {
        let ids = self
            .batch_contents
            .get(batch_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.contents.get(id).map(|c| c.clone()))
            .collect())
    }

    fn save_distribution_report(&self, report: &DistributionReport) -> CampaignResult<()> {
        self.reports
            .entry(report.content_id)
            .or_default()
            .push(report.clone());
        Ok(())
    }

    fn distribution_reports(&self, content_id: &Uuid) -> CampaignResult<Vec<DistributionReport>> {
        Ok(self
            .reports
            .get(content_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }
}
