use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(i64),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Image '{name}' already exists for workflow {workflow_id}")]
    ImageExists { workflow_id: i64, name: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
