//! Parsing state shared by the batch and streaming parsers, and the
//! validated result it produces.

use std::collections::{BTreeMap, BTreeSet};

use flowport_types::{ImageBlob, WorkflowRecord};
use tracing::warn;

use crate::document::WORKFLOWS;
use crate::{ExchangeError, Result};

/// Mutable accumulator filled by a parser.
///
/// Created once per job and consumed by [`ParsingState::finalize`].
#[derive(Debug, Default)]
pub struct ParsingState {
    pub has_version_property: bool,
    pub has_workflows_property: bool,
    /// Some workflow declares an `images` key.
    pub requires_images: bool,
    /// The document has a root `images` section.
    pub contains_images: bool,
    pub version: Option<i64>,
    workflows: Vec<WorkflowRecord>,
    /// Content hash → decoded image. Keys always equal `blob.hash()`.
    image_files: BTreeMap<String, ImageBlob>,
}

impl ParsingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflows(&self) -> &[WorkflowRecord] {
        &self.workflows
    }

    /// Store the workflow found at `index` of the `workflows` array.
    ///
    /// Entries must arrive in array order.
    pub fn push_workflow(&mut self, index: usize, record: WorkflowRecord) -> Result<()> {
        if index != self.workflows.len() {
            return Err(ExchangeError::InvalidRootProperty {
                property: WORKFLOWS,
                reason: format!(
                    "entry {index} arrived out of order, expected entry {}",
                    self.workflows.len()
                ),
            });
        }
        if record.images.is_some() {
            self.requires_images = true;
        }
        self.workflows.push(record);
        Ok(())
    }

    /// Insert a decoded image. Returns `false` if an image with the same hash
    /// was already present, in which case the state is unchanged.
    pub fn insert_image(&mut self, blob: ImageBlob) -> bool {
        if self.image_files.contains_key(blob.hash()) {
            return false;
        }
        self.image_files.insert(blob.hash().to_string(), blob);
        true
    }

    pub fn has_image(&self, hash: &str) -> bool {
        self.image_files.contains_key(hash)
    }

    pub fn image_count(&self) -> usize {
        self.image_files.len()
    }

    /// Distinct hashes referenced by the workflows seen so far.
    pub fn referenced_hashes(&self) -> BTreeSet<String> {
        self.workflows
            .iter()
            .flat_map(WorkflowRecord::image_hashes)
            .map(str::to_string)
            .collect()
    }

    /// Fail if `version` or `workflows` has not been seen.
    pub fn check_root_properties(&self) -> Result<()> {
        if !self.has_version_property || !self.has_workflows_property {
            return Err(ExchangeError::MissingRootProperty);
        }
        Ok(())
    }

    /// Fail if workflows reference images but no images section exists.
    pub fn check_images_section(&self) -> Result<()> {
        if self.requires_images && !self.contains_images {
            return Err(ExchangeError::MissingImagesSection);
        }
        Ok(())
    }

    /// Run the final integrity checks and build the result.
    ///
    /// Every referenced hash must have been decoded. Decoded images that no
    /// workflow references are dropped.
    pub fn finalize(mut self) -> Result<ImportResult> {
        self.check_root_properties()?;
        self.check_images_section()?;

        let referenced = self.referenced_hashes();
        if let Some(missing) = referenced.iter().find(|hash| !self.has_image(hash)) {
            return Err(ExchangeError::MissingImageData(missing.clone()));
        }

        let before = self.image_files.len();
        self.image_files.retain(|hash, _| referenced.contains(hash));
        let pruned = before - self.image_files.len();
        if pruned > 0 {
            warn!(pruned, "Dropping images not referenced by any workflow");
        }

        Ok(ImportResult {
            version: self.version.ok_or(ExchangeError::MissingRootProperty)?,
            workflows: self.workflows,
            images: self.image_files,
        })
    }
}

/// A fully validated exchange document, ready to be imported.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub version: i64,
    pub workflows: Vec<WorkflowRecord>,
    /// Content hash → image, only images referenced by some workflow.
    pub images: BTreeMap<String, ImageBlob>,
}

impl ImportResult {
    pub fn image(&self, hash: &str) -> Option<&ImageBlob> {
        self.images.get(hash)
    }

    /// Total number of workflow → image references.
    pub fn image_reference_count(&self) -> usize {
        self.workflows.iter().map(WorkflowRecord::image_count).sum()
    }
}
