//! Storage seam for batches, content and distribution reports.
//!
//! The orchestrator writes through this trait after every state change so
//! that readers polling a batch see live progress.

use uuid::Uuid;

use crate::batch::Batch;
use crate::channels::DistributionReport;
use crate::content::Content;
use crate::error::CampaignResult;

pub trait PipelineRepository: Send + Sync {
    fn save_batch(&self, batch: &Batch) -> CampaignResult<()>;

    fn get_batch(&self, batch_id: &Uuid) -> CampaignResult<Option<Batch>>;

    fn save_content(&self, content: &Content) -> CampaignResult<()>;

    fn get_content(&self, content_id: &Uuid) -> CampaignResult<Option<Content>>;

    /// Contents of a batch in creation order.
    fn list_contents(&self, batch_id: &Uuid) -> CampaignResult<Vec<Content>>;

    fn save_distribution_report(&self, report: &DistributionReport) -> CampaignResult<()>;

    fn distribution_reports(&self, content_id: &Uuid) -> CampaignResult<Vec<DistributionReport>>;
}
