//! Serializing stored workflows into exchange documents.

use std::collections::BTreeMap;
use std::sync::Arc;

use flowport_config::DEFAULT_SCHEMA_VERSION;
use flowport_store::{ImageStore, WorkflowStore};
use flowport_types::{WorkflowId, WorkflowRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Result;
use crate::verifier::to_data_uri;

/// An exchange document as written by the exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeDocument {
    pub version: i64,
    pub workflows: Vec<WorkflowRecord>,
    /// Content hash → data-URI.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

/// Builds exchange documents from the stores.
#[derive(Clone)]
pub struct ExportService {
    workflows: Arc<dyn WorkflowStore>,
    images: Arc<dyn ImageStore>,
    version: i64,
}

impl std::fmt::Debug for ExportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportService")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl ExportService {
    pub fn new(workflows: Arc<dyn WorkflowStore>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            workflows,
            images,
            version: DEFAULT_SCHEMA_VERSION,
        }
    }

    /// Schema version written into documents.
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Export the given workflows, in the given order.
    ///
    /// Each image blob is embedded once, however many workflows reference it.
    pub async fn export(&self, ids: &[WorkflowId]) -> Result<ExchangeDocument> {
        let mut workflows = Vec::with_capacity(ids.len());
        let mut images = BTreeMap::new();

        for &id in ids {
            let stored = self.workflows.get(id).await?;
            let references = self.images.workflow_images(id).await?;

            let mut record = WorkflowRecord {
                id: stored.id,
                name: stored.name,
                workspace_xml: stored.workspace_xml,
                uuid: stored.uuid,
                images: None,
            };
            for reference in references {
                if !images.contains_key(&reference.hash) {
                    let blob = self.images.load(&reference.hash).await?;
                    images.insert(reference.hash.clone(), to_data_uri(&blob));
                }
                record = record.with_image(reference.name, reference.hash);
            }
            workflows.push(record);
        }

        info!(
            workflows = workflows.len(),
            images = images.len(),
            "Exported workflows"
        );
        Ok(ExchangeDocument {
            version: self.version,
            workflows,
            images,
        })
    }

    /// Export every stored workflow.
    pub async fn export_all(&self) -> Result<ExchangeDocument> {
        let ids: Vec<WorkflowId> = self.workflows.list().await?.iter().map(|w| w.id).collect();
        self.export(&ids).await
    }

    /// Export the given workflows as pretty-printed JSON.
    pub async fn export_json(&self, ids: &[WorkflowId]) -> Result<String> {
        let document = self.export(ids).await?;
        Ok(serde_json::to_string_pretty(&document)?)
    }
}
