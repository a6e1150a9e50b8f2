//! Registry of running import jobs.

use std::sync::Arc;

use flowport_config::{ConfigError, ImportConfig};
use flowport_store::{ImageStore, WorkflowStore};
use flowport_types::ProgressData;
use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tracing::debug;

use crate::Result;
use crate::job::{ImportPipeline, ImportSummary, ImportTask, JobHandle};
use crate::progress::ProgressEvent;

/// Starts import jobs and reports the progress of every current job.
///
/// Jobs stay registered after they end so their final progress can still be
/// read. Once every registered job has finished with all units accounted
/// for, the registry is cleared.
#[derive(Debug)]
pub struct ImportService {
    pipeline: ImportPipeline,
    jobs: Mutex<Vec<JobHandle>>,
}

impl ImportService {
    pub fn new(
        config: &ImportConfig,
        workflows: Arc<dyn WorkflowStore>,
        images: Arc<dyn ImageStore>,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self::with_pipeline(ImportPipeline::new(
            config, workflows, images,
        )?))
    }

    pub fn with_pipeline(pipeline: ImportPipeline) -> Self {
        Self {
            pipeline,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Import a document held in memory.
    pub async fn import_json_string(&self, document: impl Into<String>) -> Result<ImportSummary> {
        self.run(ImportTask::from_text(document)).await
    }

    /// Import a document read incrementally from `reader`.
    pub async fn import_json_stream(
        &self,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Result<ImportSummary> {
        self.run(ImportTask::from_stream(reader)).await
    }

    /// Progress of every registered job, in start order.
    pub fn progress(&self) -> Vec<ProgressData> {
        self.jobs.lock().iter().map(JobHandle::progress).collect()
    }

    pub fn jobs(&self) -> Vec<JobHandle> {
        self.jobs.lock().clone()
    }

    /// Receive progress events of all jobs started after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.pipeline.bus().subscribe()
    }

    async fn run(&self, task: ImportTask) -> Result<ImportSummary> {
        let job = self.pipeline.job(task);
        self.jobs.lock().push(job.handle());

        let outcome = job.start().await;
        self.clear_if_complete();
        outcome
    }

    fn clear_if_complete(&self) {
        let mut jobs = self.jobs.lock();
        if jobs.iter().all(|job| job.progress().is_complete()) {
            debug!(jobs = jobs.len(), "All import jobs complete, clearing registry");
            jobs.clear();
        }
    }
}
