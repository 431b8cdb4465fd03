//! Shared model for the campaign content pipeline: batches, generated
//! content, QA reports, distribution results, configuration and errors.

pub mod batch;
pub mod channels;
pub mod config;
pub mod content;
pub mod error;
pub mod event_bus;
pub mod repository;
pub mod types;
pub mod validation;

pub use batch::{Batch, BatchStatus};
pub use config::AppConfig;
pub use content::{Content, ContentStatus, QaAction, QaReport};
pub use error::{CampaignError, CampaignResult};
pub use repository::PipelineRepository;
