//! Committing parsed documents to the stores, and undoing it.

use std::sync::Arc;

use flowport_store::{ImageStore, WorkflowStore};
use flowport_types::WorkflowId;
use tracing::{debug, error, info};

use crate::progress::ProgressTracker;
use crate::state::ImportResult;
use crate::{ExchangeError, Result};

/// Writes workflows and their images into the stores, in document order.
///
/// The stores have no shared transaction, so every created workflow id is
/// recorded in the caller's `committed` list; [`Importer::rollback`] uses it
/// to remove everything again.
#[derive(Clone)]
pub struct Importer {
    workflows: Arc<dyn WorkflowStore>,
    images: Arc<dyn ImageStore>,
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer").finish_non_exhaustive()
    }
}

impl Importer {
    pub fn new(workflows: Arc<dyn WorkflowStore>, images: Arc<dyn ImageStore>) -> Self {
        Self { workflows, images }
    }

    /// Import every workflow of `result`. Returns the number of image
    /// references stored.
    ///
    /// Stops at the first failure without cleaning up; ids created so far are
    /// left in `committed`.
    pub async fn import_all(
        &self,
        result: &ImportResult,
        progress: &ProgressTracker,
        committed: &mut Vec<WorkflowId>,
    ) -> Result<usize> {
        let mut stored = 0;
        for record in &result.workflows {
            let id = self
                .workflows
                .create(&record.name, &record.workspace_xml, record.uuid.as_deref())
                .await?;
            committed.push(id);
            debug!(id, source_id = record.id, name = %record.name, "Created workflow");

            for (name, hash) in record.images.iter().flatten() {
                let blob = result
                    .image(hash)
                    .ok_or_else(|| ExchangeError::MissingImageData(hash.clone()))?;
                self.images.store(id, name, blob, true).await?;
                stored += 1;
                progress.step();
            }
            progress.step();
        }
        Ok(stored)
    }

    /// Delete every committed workflow, then every committed workflow's
    /// images. All ids are attempted; failures are logged and never returned.
    pub async fn rollback(&self, committed: &[WorkflowId]) {
        if committed.is_empty() {
            return;
        }

        let mut failures = 0;
        for &id in committed {
            if let Err(e) = self.workflows.delete_by_id(id).await {
                failures += 1;
                error!(workflow_id = id, error = %e, "Rollback failed to delete workflow");
            }
        }
        for &id in committed {
            if let Err(e) = self.images.remove_workflow_images(id).await {
                failures += 1;
                error!(workflow_id = id, error = %e, "Rollback failed to remove workflow images");
            }
        }

        info!(
            workflows = committed.len(),
            failures, "Rolled back partial import"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressBus;
    use flowport_store::{MockImageStore, MockWorkflowStore};
    use flowport_types::{ImageBlob, WorkflowRecord};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn result_with(n: usize, blob: &ImageBlob) -> ImportResult {
        let workflows = (0..n)
            .map(|i| {
                WorkflowRecord::new(i as i64, format!("W{i}"), "<xml/>").with_image("pic", blob.hash())
            })
            .collect();
        ImportResult {
            version: 3,
            workflows,
            images: BTreeMap::from([(blob.hash().to_string(), blob.clone())]),
        }
    }

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Uuid::new_v4(), ProgressBus::new(16))
    }

    #[tokio::test]
    async fn test_import_steps_per_reference_and_workflow() {
        let workflows = Arc::new(MockWorkflowStore::new());
        let images = Arc::new(MockImageStore::new());
        let importer = Importer::new(workflows.clone(), images.clone());
        let blob = ImageBlob::new("image/png", vec![1]);

        let progress = tracker();
        progress.add_total(4);
        let mut committed = Vec::new();
        let stored = importer
            .import_all(&result_with(2, &blob), &progress, &mut committed)
            .await
            .unwrap();

        assert_eq!(stored, 2);
        assert_eq!(committed.len(), 2);
        assert_eq!(progress.snapshot().events_count, 4);
        assert_eq!(images.blob_count(), 1);
        assert_eq!(workflows.len(), 2);
    }

    #[tokio::test]
    async fn test_rollback_after_partial_import() {
        let workflows = Arc::new(MockWorkflowStore::new().fail_create_on(3));
        let images = Arc::new(MockImageStore::new());
        let importer = Importer::new(workflows.clone(), images.clone());
        let blob = ImageBlob::new("image/png", vec![1]);

        let mut committed = Vec::new();
        let err = importer
            .import_all(&result_with(4, &blob), &tracker(), &mut committed)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Store(_)));
        assert_eq!(committed.len(), 2);

        importer.rollback(&committed).await;
        assert!(workflows.is_empty());
        assert_eq!(images.blob_count(), 0);
        for id in committed {
            assert_eq!(images.reference_count(id), 0);
        }
    }

    #[tokio::test]
    async fn test_rollback_continues_after_failures() {
        let workflows = Arc::new(MockWorkflowStore::new().fail_deletes());
        let images = Arc::new(MockImageStore::new());
        let importer = Importer::new(workflows.clone(), images.clone());
        let blob = ImageBlob::new("image/png", vec![1]);

        let mut committed = Vec::new();
        importer
            .import_all(&result_with(2, &blob), &tracker(), &mut committed)
            .await
            .unwrap();

        importer.rollback(&committed).await;
        // Deletes failed, image removal still ran for every id.
        assert_eq!(workflows.len(), 2);
        assert_eq!(images.blob_count(), 0);
    }
}
