use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Distribution error: {0}")]
    Distribution(String),

    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("batch {0} is already running")]
    AlreadyRunning(String),

    #[error("Workflow cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CampaignError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
