use std::fmt;

use campaign_core::error::CampaignError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generation,
    Qa,
    Distribution,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Generation => "generation",
            Stage::Qa => "qa",
            Stage::Distribution => "distribution",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that aborts the whole batch. Its display text becomes the
/// batch's `error_message`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("{stage} stage failed: {message}")]
    Stage { stage: Stage, message: String },

    #[error("workflow cancelled")]
    Cancelled,
}

impl WorkflowError {
    pub fn stage(stage: Stage, err: impl fmt::Display) -> Self {
        WorkflowError::Stage {
            stage,
            message: err.to_string(),
        }
    }

    /// Adapter for `map_err` on stage-internal results.
    pub fn at(stage: Stage) -> impl Fn(CampaignError) -> Self {
        move |e| match e {
            CampaignError::Cancelled => WorkflowError::Cancelled,
            other => WorkflowError::stage(stage, other),
        }
    }
}
