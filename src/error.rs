use crate::model::error::ModelError;
use crate::pipeline::error::PipelineError;
use crate::storage::error::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AqicastError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Failed to load configuration")]
    Config(#[from] config::ConfigError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
