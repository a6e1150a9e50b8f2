//! Error types for the exchange pipeline.

use flowport_store::StoreError;
use thiserror::Error;

/// Errors raised while parsing, verifying, importing or exporting an
/// exchange document. Messages are suitable for showing to users as-is.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The document is not well-formed JSON.
    #[error("Document is not valid JSON: {0}")]
    DocumentSyntax(String),

    /// `version` or `workflows` is missing from the document root.
    #[error("Document is missing the 'version' or 'workflows' property")]
    MissingRootProperty,

    /// A root property has the wrong shape.
    #[error("Invalid '{property}' property: {reason}")]
    InvalidRootProperty {
        property: &'static str,
        reason: String,
    },

    /// The document's schema version is not accepted.
    #[error("Unsupported document version: {0}")]
    InvalidVersion(String),

    #[error("Workflow {index} is missing the '{field}' field")]
    MissingWorkflowField { index: usize, field: &'static str },

    #[error("Workflow {index} has an invalid '{field}' field: {reason}")]
    InvalidWorkflowField {
        index: usize,
        field: &'static str,
        reason: String,
    },

    /// Workflows reference images but the document has no images section.
    #[error("Workflows reference images but the document contains no images")]
    MissingImagesSection,

    /// A declared image hash is not a 64-character hex digest.
    #[error("Invalid image hash: {0}")]
    InvalidImageHash(String),

    /// An image data-URI could not be decoded or has a rejected media type.
    #[error("Malformed image data: {0}")]
    MalformedImageData(String),

    #[error("Image hash mismatch: expected {expected}, computed {actual}")]
    ImageHashMismatch { expected: String, actual: String },

    /// A referenced image has no data in the document.
    #[error("Missing data for image {0}")]
    MissingImageData(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
