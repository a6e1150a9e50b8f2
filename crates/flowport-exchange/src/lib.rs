//! Import and export of workflow exchange documents.
//!
//! An exchange document is a JSON container with a schema `version`, a list
//! of `workflows`, and an optional `images` map from content hash to
//! base64 data-URI. Importing runs in two phases:
//!
//! 1. **Parse**: a [`BatchParser`] (whole document in memory) or a
//!    [`StreamingParser`] (incremental, never holding the full tree) validates
//!    the document and verifies every referenced image against its hash,
//!    producing an [`ImportResult`].
//! 2. **Import**: the [`Importer`] writes workflows and images to the stores
//!    in document order. If any write fails, everything created by the job is
//!    rolled back.
//!
//! [`ImportJob`] ties the phases together and reports progress through a
//! [`ProgressTracker`]; [`ImportService`] runs jobs and tracks their progress;
//! [`ExportService`] produces documents from stored workflows.

pub mod batch;
pub mod document;
pub mod error;
pub mod export;
pub mod importer;
pub mod job;
pub mod progress;
pub mod service;
pub mod state;
pub mod stream;
pub mod verifier;

pub use batch::BatchParser;
pub use document::ImportPolicy;
pub use error::{ExchangeError, Result};
pub use export::{ExchangeDocument, ExportService};
pub use importer::Importer;
pub use job::{ImportJob, ImportPipeline, ImportSummary, ImportTask, JobHandle, JobState};
pub use progress::{ProgressBus, ProgressEvent, ProgressTracker};
pub use service::ImportService;
pub use state::{ImportResult, ParsingState};
pub use stream::{PathSegment, StreamingParser, Tokenizer, ValueEvent};
pub use verifier::{ImageVerifier, check_hash_format, to_data_uri};
