//! Shared types for the flowport workflow exchange pipeline.

pub mod image;
pub mod progress;
pub mod workflow;

pub use image::{HASH_LENGTH, ImageBlob, ImageReference, content_hash, is_content_hash};
pub use progress::{ProgressData, ProgressKind};
pub use workflow::{StoredWorkflow, WorkflowId, WorkflowRecord};
