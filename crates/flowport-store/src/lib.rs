//! Workflow and image storage for flowport.
//!
//! The import pipeline talks to two independent collaborators: a workflow
//! store that assigns ids to imported workflows, and an image store that
//! keeps content-addressed image blobs referenced by name from workflows.
//! Both are traits so the pipeline can run against SQLite in the CLI and
//! against in-memory mocks (with failure injection) in tests.

pub mod error;
pub mod storage;
pub mod store;

pub use error::{Result, StoreError};
pub use storage::{ImageStore, MockImageStore, MockWorkflowStore, WorkflowStore};
pub use store::SqliteStore;
