//! Workflow records as carried by exchange documents and as persisted by stores.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned workflow identifier.
pub type WorkflowId = i64;

/// A workflow definition as it appears in an exchange document.
///
/// `id` is the identifier the workflow had in the exporting system; it is
/// carried for reference only; stores assign their own ids on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub id: i64,
    pub name: String,
    pub workspace_xml: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Image name → content hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<BTreeMap<String, String>>,
}

impl WorkflowRecord {
    /// Create a record without uuid or images.
    pub fn new(id: i64, name: impl Into<String>, workspace_xml: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            workspace_xml: workspace_xml.into(),
            uuid: None,
            images: None,
        }
    }

    /// Set the uuid.
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Add an image reference.
    pub fn with_image(mut self, name: impl Into<String>, hash: impl Into<String>) -> Self {
        self.images
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), hash.into());
        self
    }

    /// Hashes of every image this workflow references (may repeat).
    pub fn image_hashes(&self) -> impl Iterator<Item = &str> {
        self.images
            .iter()
            .flat_map(|images| images.values().map(String::as_str))
    }

    /// Number of image references declared by this workflow.
    pub fn image_count(&self) -> usize {
        self.images.as_ref().map_or(0, BTreeMap::len)
    }
}

/// A workflow persisted in a workflow store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub id: WorkflowId,
    pub name: String,
    pub workspace_xml: String,
    pub uuid: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = WorkflowRecord::new(7, "Morning", "<xml/>").with_uuid("u-1");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["workspaceXml"], "<xml/>");
        assert_eq!(json["uuid"], "u-1");
        assert!(json.get("images").is_none());
    }

    #[test]
    fn test_image_hashes_repeat_per_reference() {
        let record = WorkflowRecord::new(1, "A", "<xml/>")
            .with_image("a", "h1")
            .with_image("b", "h1");
        assert_eq!(record.image_count(), 2);
        assert_eq!(record.image_hashes().collect::<Vec<_>>(), vec!["h1", "h1"]);
    }
}
