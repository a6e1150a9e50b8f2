//! Storage abstraction traits for workflows and images.
//!
//! # Architecture
//!
//! ```text
//! WorkflowStore (trait)       - Workflow create/delete/read
//!     └── SqliteStore         - Default SQLite implementation
//!     └── MockWorkflowStore   - In-memory mock for testing
//!
//! ImageStore (trait)          - Named, content-addressed workflow images
//!     └── SqliteStore         - Default SQLite implementation
//!     └── MockImageStore      - In-memory mock for testing
//! ```

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use flowport_types::{ImageBlob, ImageReference, StoredWorkflow, WorkflowId};
use parking_lot::Mutex;

use crate::{Result, StoreError};

/// Trait for workflow persistence.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Create a new workflow and return its store-assigned id.
    async fn create(
        &self,
        name: &str,
        workspace_xml: &str,
        uuid: Option<&str>,
    ) -> Result<WorkflowId>;

    /// Delete a workflow by id.
    async fn delete_by_id(&self, id: WorkflowId) -> Result<()>;

    /// Get a workflow by id.
    async fn get(&self, id: WorkflowId) -> Result<StoredWorkflow>;

    /// List all workflows, oldest first.
    async fn list(&self) -> Result<Vec<StoredWorkflow>>;
}

/// Trait for workflow image persistence.
///
/// Images are stored once per content hash and referenced by name from each
/// workflow that uses them.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `blob` under `name` for a workflow.
    ///
    /// With `overwrite = false` an existing reference with the same name is an
    /// error; with `overwrite = true` it is replaced.
    async fn store(
        &self,
        workflow_id: WorkflowId,
        name: &str,
        blob: &ImageBlob,
        overwrite: bool,
    ) -> Result<()>;

    /// Remove every image reference of a workflow. Blobs no longer referenced
    /// by any workflow are dropped.
    async fn remove_workflow_images(&self, workflow_id: WorkflowId) -> Result<()>;

    /// List the image references of a workflow, ordered by name.
    async fn workflow_images(&self, workflow_id: WorkflowId) -> Result<Vec<ImageReference>>;

    /// Load an image blob by content hash.
    async fn load(&self, hash: &str) -> Result<ImageBlob>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Mocks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MockWorkflowState {
    workflows: BTreeMap<WorkflowId, StoredWorkflow>,
    next_id: WorkflowId,
    create_calls: usize,
    fail_create_on: Option<usize>,
    fail_deletes: bool,
}

/// In-memory mock implementation of [`WorkflowStore`].
///
/// `fail_create_on(n)` makes the n-th call to `create` (1-based) fail, and
/// `fail_deletes()` makes every delete fail, which lets tests drive the
/// rollback path.
#[derive(Debug, Default)]
pub struct MockWorkflowStore {
    state: Mutex<MockWorkflowState>,
}

impl MockWorkflowStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the n-th `create` call (1-based).
    pub fn fail_create_on(self, n: usize) -> Self {
        self.state.lock().fail_create_on = Some(n);
        self
    }

    /// Fail every `delete_by_id` call.
    pub fn fail_deletes(self) -> Self {
        self.state.lock().fail_deletes = true;
        self
    }

    /// Number of workflows currently stored.
    pub fn len(&self) -> usize {
        self.state.lock().workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: WorkflowId) -> bool {
        self.state.lock().workflows.contains_key(&id)
    }

    /// Snapshot of the stored workflows, in id order.
    pub fn workflows(&self) -> Vec<StoredWorkflow> {
        self.state.lock().workflows.values().cloned().collect()
    }
}

#[async_trait]
impl WorkflowStore for MockWorkflowStore {
    async fn create(
        &self,
        name: &str,
        workspace_xml: &str,
        uuid: Option<&str>,
    ) -> Result<WorkflowId> {
        let mut state = self.state.lock();
        state.create_calls += 1;
        if state.fail_create_on == Some(state.create_calls) {
            return Err(StoreError::Unavailable(format!(
                "injected failure on create #{}",
                state.create_calls
            )));
        }

        state.next_id += 1;
        let id = state.next_id;
        state.workflows.insert(
            id,
            StoredWorkflow {
                id,
                name: name.to_string(),
                workspace_xml: workspace_xml.to_string(),
                uuid: uuid.map(String::from),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn delete_by_id(&self, id: WorkflowId) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_deletes {
            return Err(StoreError::Unavailable(format!(
                "injected failure on delete of {id}"
            )));
        }
        state
            .workflows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::WorkflowNotFound(id))
    }

    async fn get(&self, id: WorkflowId) -> Result<StoredWorkflow> {
        self.state
            .lock()
            .workflows
            .get(&id)
            .cloned()
            .ok_or(StoreError::WorkflowNotFound(id))
    }

    async fn list(&self) -> Result<Vec<StoredWorkflow>> {
        Ok(self.workflows())
    }
}

#[derive(Debug, Default)]
struct MockImageState {
    references: HashMap<WorkflowId, BTreeMap<String, String>>,
    blobs: HashMap<String, ImageBlob>,
    store_calls: usize,
    fail_store_on: Option<usize>,
}

impl MockImageState {
    fn collect_unreferenced(&mut self) {
        let references = &self.references;
        self.blobs
            .retain(|hash, _| references.values().any(|refs| refs.values().any(|h| h == hash)));
    }
}

/// In-memory mock implementation of [`ImageStore`].
#[derive(Debug, Default)]
pub struct MockImageStore {
    state: Mutex<MockImageState>,
}

impl MockImageStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the n-th `store` call (1-based).
    pub fn fail_store_on(self, n: usize) -> Self {
        self.state.lock().fail_store_on = Some(n);
        self
    }

    /// Number of distinct blobs held.
    pub fn blob_count(&self) -> usize {
        self.state.lock().blobs.len()
    }

    /// Number of image references held for a workflow.
    pub fn reference_count(&self, workflow_id: WorkflowId) -> usize {
        self.state
            .lock()
            .references
            .get(&workflow_id)
            .map_or(0, BTreeMap::len)
    }

    /// Total number of `store` calls seen, including failed ones.
    pub fn store_calls(&self) -> usize {
        self.state.lock().store_calls
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn store(
        &self,
        workflow_id: WorkflowId,
        name: &str,
        blob: &ImageBlob,
        overwrite: bool,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.store_calls += 1;
        if state.fail_store_on == Some(state.store_calls) {
            return Err(StoreError::Unavailable(format!(
                "injected failure on image store #{}",
                state.store_calls
            )));
        }

        let refs = state.references.entry(workflow_id).or_default();
        if !overwrite && refs.contains_key(name) {
            return Err(StoreError::ImageExists {
                workflow_id,
                name: name.to_string(),
            });
        }
        refs.insert(name.to_string(), blob.hash().to_string());
        state
            .blobs
            .entry(blob.hash().to_string())
            .or_insert_with(|| blob.clone());
        state.collect_unreferenced();
        Ok(())
    }

    async fn remove_workflow_images(&self, workflow_id: WorkflowId) -> Result<()> {
        let mut state = self.state.lock();
        state.references.remove(&workflow_id);
        state.collect_unreferenced();
        Ok(())
    }

    async fn workflow_images(&self, workflow_id: WorkflowId) -> Result<Vec<ImageReference>> {
        Ok(self
            .state
            .lock()
            .references
            .get(&workflow_id)
            .map(|refs| {
                refs.iter()
                    .map(|(name, hash)| ImageReference {
                        workflow_id,
                        name: name.clone(),
                        hash: hash.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn load(&self, hash: &str) -> Result<ImageBlob> {
        self.state
            .lock()
            .blobs
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::ImageNotFound(hash.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_workflow_store_crud() {
        let store = MockWorkflowStore::new();

        let a = store.create("A", "<xml/>", Some("u-a")).await.unwrap();
        let b = store.create("B", "<xml/>", None).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);

        let fetched = store.get(a).await.unwrap();
        assert_eq!(fetched.name, "A");
        assert_eq!(fetched.uuid.as_deref(), Some("u-a"));

        store.delete_by_id(a).await.unwrap();
        assert!(!store.contains(a));
        assert!(matches!(
            store.delete_by_id(a).await,
            Err(StoreError::WorkflowNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_workflow_store_injected_failure() {
        let store = MockWorkflowStore::new().fail_create_on(2);
        store.create("A", "<xml/>", None).await.unwrap();
        assert!(matches!(
            store.create("B", "<xml/>", None).await,
            Err(StoreError::Unavailable(_))
        ));
        store.create("C", "<xml/>", None).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_image_store_shares_blobs() {
        let store = MockImageStore::new();
        let blob = ImageBlob::new("image/png", vec![1, 2, 3]);

        store.store(1, "a", &blob, true).await.unwrap();
        store.store(2, "b", &blob, true).await.unwrap();
        assert_eq!(store.blob_count(), 1);

        store.remove_workflow_images(1).await.unwrap();
        assert_eq!(store.blob_count(), 1);
        assert_eq!(store.reference_count(1), 0);

        store.remove_workflow_images(2).await.unwrap();
        assert_eq!(store.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_image_store_overwrite() {
        let store = MockImageStore::new();
        let first = ImageBlob::new("image/png", vec![1]);
        let second = ImageBlob::new("image/png", vec![2]);

        store.store(1, "pic", &first, false).await.unwrap();
        assert!(matches!(
            store.store(1, "pic", &second, false).await,
            Err(StoreError::ImageExists { .. })
        ));

        store.store(1, "pic", &second, true).await.unwrap();
        let refs = store.workflow_images(1).await.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].hash, second.hash());
        // The replaced blob is no longer referenced.
        assert_eq!(store.blob_count(), 1);
        assert!(store.load(first.hash()).await.is_err());
    }
}
