//! Import jobs: one document, one parse, one import.

use std::sync::Arc;
use std::time::Instant;

use flowport_config::{ConfigError, ImportConfig};
use flowport_store::{ImageStore, WorkflowStore};
use flowport_types::{ProgressData, WorkflowId};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::AsyncRead;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::Result;
use crate::batch::BatchParser;
use crate::document::ImportPolicy;
use crate::importer::Importer;
use crate::progress::{ProgressBus, ProgressTracker};
use crate::stream::StreamingParser;
use crate::verifier::ImageVerifier;

/// The input of an import job.
pub enum ImportTask {
    /// A complete document held in memory.
    FromText(String),
    /// A document read incrementally.
    FromStream(Box<dyn AsyncRead + Send + Unpin>),
}

impl ImportTask {
    pub fn from_text(document: impl Into<String>) -> Self {
        Self::FromText(document.into())
    }

    pub fn from_stream(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::FromStream(Box::new(reader))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::FromText(_) => "text",
            Self::FromStream(_) => "stream",
        }
    }
}

impl std::fmt::Debug for ImportTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromText(text) => f
                .debug_struct("FromText")
                .field("len", &text.len())
                .finish(),
            Self::FromStream(_) => f.debug_struct("FromStream").finish_non_exhaustive(),
        }
    }
}

/// Lifecycle of a job. `Finished` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Parsing,
    Importing,
    Finished,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Outcome of a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub job_id: Uuid,
    /// Schema version of the imported document.
    pub version: i64,
    /// Ids assigned by the workflow store, in document order.
    pub workflow_ids: Vec<WorkflowId>,
    /// Image references stored.
    pub images_stored: usize,
    pub duration_ms: u64,
}

/// Observes a job while it runs.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: Uuid,
    state: Arc<Mutex<JobState>>,
    progress: ProgressTracker,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    pub fn progress(&self) -> ProgressData {
        self.progress.snapshot()
    }
}

/// Parsers, importer and progress bus shared by all jobs.
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    batch: BatchParser,
    stream: StreamingParser,
    importer: Importer,
    bus: ProgressBus,
}

impl ImportPipeline {
    pub fn new(
        config: &ImportConfig,
        workflows: Arc<dyn WorkflowStore>,
        images: Arc<dyn ImageStore>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let verifier = ImageVerifier::from_config(config)?;
        Ok(Self {
            batch: BatchParser::new(ImportPolicy::from(config), verifier.clone()),
            stream: StreamingParser::from_config(config, verifier),
            importer: Importer::new(workflows, images),
            bus: ProgressBus::new(config.progress_channel_capacity),
        })
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    /// Create a job for `task`.
    pub fn job(&self, task: ImportTask) -> ImportJob {
        let id = Uuid::new_v4();
        ImportJob {
            id,
            task,
            state: Arc::new(Mutex::new(JobState::Idle)),
            progress: ProgressTracker::new(id, self.bus.clone()),
            pipeline: self.clone(),
        }
    }
}

/// A single import. Consumed by [`ImportJob::start`].
#[derive(Debug)]
pub struct ImportJob {
    id: Uuid,
    task: ImportTask,
    state: Arc<Mutex<JobState>>,
    progress: ProgressTracker,
    pipeline: ImportPipeline,
}

impl ImportJob {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            state: self.state.clone(),
            progress: self.progress.clone(),
        }
    }

    /// Parse the task's document and import it.
    ///
    /// A parse failure cancels the progress and leaves the stores untouched.
    /// An import failure cancels the progress and rolls back every workflow
    /// created so far before the error is returned.
    pub async fn start(self) -> Result<ImportSummary> {
        let Self {
            id,
            task,
            state,
            progress,
            pipeline,
        } = self;
        let started = Instant::now();
        let set_state = |next: JobState| {
            debug!(job_id = %id, state = ?next, "Job state changed");
            *state.lock() = next;
        };

        info!(job_id = %id, source = task.kind(), "Starting import job");
        set_state(JobState::Parsing);
        let parsed = match task {
            ImportTask::FromText(document) => pipeline.batch.parse(&document, &progress).await,
            ImportTask::FromStream(reader) => pipeline.stream.parse(reader, &progress).await,
        };
        let result = match parsed {
            Ok(result) => result,
            Err(e) => {
                error!(job_id = %id, error = %e, "Import failed while parsing");
                progress.cancel(e.to_string());
                set_state(JobState::Failed);
                return Err(e);
            }
        };

        set_state(JobState::Importing);
        let mut committed = Vec::new();
        match pipeline
            .importer
            .import_all(&result, &progress, &mut committed)
            .await
        {
            Ok(images_stored) => {
                progress.finish();
                set_state(JobState::Finished);
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    job_id = %id,
                    workflows = committed.len(),
                    images_stored,
                    duration_ms,
                    "Import finished"
                );
                Ok(ImportSummary {
                    job_id: id,
                    version: result.version,
                    workflow_ids: committed,
                    images_stored,
                    duration_ms,
                })
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Import failed, rolling back");
                progress.cancel(e.to_string());
                pipeline.importer.rollback(&committed).await;
                set_state(JobState::Failed);
                Err(e)
            }
        }
    }
}
