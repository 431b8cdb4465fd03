use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};
use crate::types::{AssetBundle, GenerationConfig, Template};

/// Lifecycle of a batch. Linear, with `Failed` reachable from every
/// in-progress state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Pending,
    GenerationInProgress,
    QaInProgress,
    DistributionInProgress,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "PENDING",
            BatchStatus::GenerationInProgress => "GENERATION_IN_PROGRESS",
            BatchStatus::QaInProgress => "QA_IN_PROGRESS",
            BatchStatus::DistributionInProgress => "DISTRIBUTION_IN_PROGRESS",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        }
    }

    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        use BatchStatus::*;
        match self {
            Pending => next == GenerationInProgress,
            GenerationInProgress => matches!(next, QaInProgress | Failed),
            QaInProgress => matches!(next, DistributionInProgress | Failed),
            DistributionInProgress => matches!(next, Completed | Failed),
            Completed | Failed => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end-to-end generation / QA / distribution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: Uuid,
    pub customer_id: String,
    pub campaign_id: String,
    pub asset_bundle: AssetBundle,
    pub template: Template,
    pub generation_config: GenerationConfig,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_items: u32,
    pub processed_items: u32,
    pub failed_items: u32,
    pub error_message: Option<String>,
}

impl Batch {
    pub fn new(
        asset_bundle: AssetBundle,
        template: Template,
        generation_config: GenerationConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            batch_id: Uuid::new_v4(),
            customer_id: asset_bundle.customer_id.clone(),
            campaign_id: asset_bundle.campaign_id.clone(),
            asset_bundle,
            template,
            generation_config,
            status: BatchStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            total_items: 0,
            processed_items: 0,
            failed_items: 0,
            error_message: None,
        }
    }

    /// `|products| × |aspect_ratios| × |durations|`.
    /// Fails when the count does not fit in a `u32`.
    pub fn planned_items(&self) -> CampaignResult<u32> {
        let visual = &self.template.visual_config;
        self.asset_bundle
            .products
            .len()
            .checked_mul(visual.aspect_ratios.len())
            .and_then(|n| n.checked_mul(visual.duration_seconds.len()))
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                CampaignError::Validation(vec![format!(
                    "Batch plans more than {} items",
                    u32::MAX
                )])
            })
    }

    /// Fix `total_items` from the Cartesian product. Only allowed before any
    /// item has been processed.
    pub fn plan(&mut self) -> CampaignResult<u32> {
        if self.status != BatchStatus::Pending || self.processed_items > 0 {
            return Err(CampaignError::InvalidTransition {
                entity: "batch",
                from: self.status.to_string(),
                to: "planned".to_string(),
            });
        }
        self.total_items = self.planned_items()?;
        Ok(self.total_items)
    }

    pub fn transition(&mut self, to: BatchStatus) -> CampaignResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(CampaignError::InvalidTransition {
                entity: "batch",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        if to == BatchStatus::Completed {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Move to `Failed` and record the message verbatim.
    pub fn fail(&mut self, message: impl Into<String>) -> CampaignResult<()> {
        self.transition(BatchStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn increment_processed(&mut self, success: bool) {
        self.processed_items += 1;
        if !success {
            self.failed_items += 1;
        }
        self.updated_at = Utc::now();
    }

    /// Percentage of planned items that reached a terminal generation state.
    pub fn calculate_progress(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        (self.processed_items as f64 / self.total_items as f64) * 100.0
    }
}
