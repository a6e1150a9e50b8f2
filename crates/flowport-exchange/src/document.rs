//! Validation of exchange document fragments shared by both parsers.
//!
//! Each helper checks one structurally significant value (the `version`
//! property, a workflow entry, a workflow's image map) and converts it into
//! its typed form.

use std::collections::BTreeMap;

use flowport_config::ImportConfig;
use flowport_types::WorkflowRecord;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::verifier::check_hash_format;
use crate::{ExchangeError, Result};

pub(crate) const VERSION: &str = "version";
pub(crate) const WORKFLOWS: &str = "workflows";
pub(crate) const IMAGES: &str = "images";

/// Schema policy applied to incoming documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportPolicy {
    /// Highest schema version understood.
    pub schema_version: i64,
    /// Reject older versions and workflows without uuid.
    pub study_mode: bool,
}

impl From<&ImportConfig> for ImportPolicy {
    fn from(config: &ImportConfig) -> Self {
        Self {
            schema_version: config.schema_version,
            study_mode: config.study_mode,
        }
    }
}

impl Default for ImportPolicy {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl ImportPolicy {
    /// Validate the `version` property.
    pub fn check_version(&self, value: &Value) -> Result<i64> {
        let version = value
            .as_i64()
            .ok_or_else(|| ExchangeError::InvalidVersion(format!("{value} is not an integer")))?;

        if version > self.schema_version {
            return Err(ExchangeError::InvalidVersion(format!(
                "{version} is newer than the supported version {}",
                self.schema_version
            )));
        }
        if version < self.schema_version {
            if self.study_mode {
                return Err(ExchangeError::InvalidVersion(format!(
                    "{version} is older than {} and study mode is enabled",
                    self.schema_version
                )));
            }
            warn!(
                version,
                current = self.schema_version,
                "Document version is older than the current version; data might be incompatible"
            );
        }
        Ok(version)
    }

    /// Validate one entry of the `workflows` array.
    pub fn parse_workflow(&self, index: usize, value: Value) -> Result<WorkflowRecord> {
        let Value::Object(mut fields) = value else {
            return Err(ExchangeError::InvalidRootProperty {
                property: WORKFLOWS,
                reason: format!("entry {index} is not an object"),
            });
        };

        let id = match take(&mut fields, "id") {
            None => return Err(missing(index, "id")),
            Some(value) => value.as_i64().ok_or_else(|| {
                invalid(index, "id", format!("{value} is not an integer"))
            })?,
        };
        let name = take_string(&mut fields, index, "name")?.ok_or_else(|| missing(index, "name"))?;
        let workspace_xml = take_string(&mut fields, index, "workspaceXml")?
            .ok_or_else(|| missing(index, "workspaceXml"))?;

        if !fields.contains_key("uuid") {
            if self.study_mode {
                return Err(missing(index, "uuid"));
            }
            warn!(index, name = %name, "Workflow has no uuid");
        }
        let uuid = take_string(&mut fields, index, "uuid")?;

        let images = match take(&mut fields, IMAGES) {
            None => None,
            Some(value) => Some(parse_image_map(index, &value)?),
        };

        debug!(index, id, name = %name, "Parsed workflow entry");
        Ok(WorkflowRecord {
            id,
            name,
            workspace_xml,
            uuid,
            images,
        })
    }
}

/// Whether a workflow entry carries an `images` key. A `null` value counts:
/// such an entry references no image but still expects an images section.
pub fn declares_images(entry: &Value) -> bool {
    entry
        .as_object()
        .is_some_and(|fields| fields.contains_key(IMAGES))
}

/// Validate a workflow's `images` map (image name → content hash).
pub fn parse_image_map(index: usize, value: &Value) -> Result<BTreeMap<String, String>> {
    let Value::Object(entries) = value else {
        return Err(invalid(index, IMAGES, "not an object".to_string()));
    };
    entries
        .iter()
        .map(|(name, hash)| {
            let hash = hash
                .as_str()
                .ok_or_else(|| ExchangeError::InvalidImageHash(hash.to_string()))?;
            check_hash_format(hash)?;
            Ok((name.clone(), hash.to_string()))
        })
        .collect()
}

/// Remove `key`, treating `null` like an absent key.
fn take(fields: &mut Map<String, Value>, key: &str) -> Option<Value> {
    fields.remove(key).filter(|v| !v.is_null())
}

fn take_string(
    fields: &mut Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Option<String>> {
    match take(fields, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(invalid(index, field, format!("{other} is not a string"))),
    }
}

fn missing(index: usize, field: &'static str) -> ExchangeError {
    ExchangeError::MissingWorkflowField { index, field }
}

fn invalid(index: usize, field: &'static str, reason: String) -> ExchangeError {
    ExchangeError::InvalidWorkflowField {
        index,
        field,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowport_types::content_hash;
    use serde_json::json;

    fn strict() -> ImportPolicy {
        ImportPolicy {
            schema_version: 3,
            study_mode: true,
        }
    }

    #[test]
    fn test_version_rules() {
        let policy = ImportPolicy::default();
        assert_eq!(policy.check_version(&json!(3)).unwrap(), 3);
        assert_eq!(policy.check_version(&json!(1)).unwrap(), 1);
        assert!(matches!(
            policy.check_version(&json!(4)),
            Err(ExchangeError::InvalidVersion(_))
        ));
        assert!(matches!(
            policy.check_version(&json!("3")),
            Err(ExchangeError::InvalidVersion(_))
        ));
        assert!(matches!(
            strict().check_version(&json!(2)),
            Err(ExchangeError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_parse_complete_workflow() {
        let hash = content_hash(b"img");
        let record = ImportPolicy::default()
            .parse_workflow(
                0,
                json!({
                    "id": 12,
                    "name": "Morning",
                    "workspaceXml": "<xml/>",
                    "uuid": "u-1",
                    "images": { "sun": hash }
                }),
            )
            .unwrap();

        assert_eq!(record.id, 12);
        assert_eq!(record.uuid.as_deref(), Some("u-1"));
        assert_eq!(record.images.unwrap()["sun"], hash);
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let policy = ImportPolicy::default();
        let err = policy.parse_workflow(2, json!({"name": "x"})).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::MissingWorkflowField { index: 2, field: "id" }
        ));

        let err = policy
            .parse_workflow(0, json!({"id": 1, "name": "x"}))
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::MissingWorkflowField { field: "workspaceXml", .. }
        ));
    }

    #[test]
    fn test_uuid_required_in_study_mode() {
        let entry = json!({"id": 1, "name": "x", "workspaceXml": ""});
        assert!(ImportPolicy::default().parse_workflow(0, entry.clone()).is_ok());
        assert!(matches!(
            strict().parse_workflow(0, entry),
            Err(ExchangeError::MissingWorkflowField { field: "uuid", .. })
        ));
    }

    #[test]
    fn test_wrong_field_types() {
        let policy = ImportPolicy::default();
        assert!(matches!(
            policy.parse_workflow(0, json!({"id": "1", "name": "x", "workspaceXml": ""})),
            Err(ExchangeError::InvalidWorkflowField { field: "id", .. })
        ));
        assert!(matches!(
            policy.parse_workflow(0, json!({"id": 1, "name": 5, "workspaceXml": ""})),
            Err(ExchangeError::InvalidWorkflowField { field: "name", .. })
        ));
        assert!(matches!(
            policy.parse_workflow(0, json!([1, 2])),
            Err(ExchangeError::InvalidRootProperty { .. })
        ));
    }

    #[test]
    fn test_image_map_hash_checks() {
        assert!(matches!(
            parse_image_map(0, &json!({"a": "short"})),
            Err(ExchangeError::InvalidImageHash(_))
        ));
        assert!(matches!(
            parse_image_map(0, &json!({"a": 5})),
            Err(ExchangeError::InvalidImageHash(_))
        ));
        assert!(matches!(
            parse_image_map(0, &json!(["a"])),
            Err(ExchangeError::InvalidWorkflowField { field: "images", .. })
        ));
    }

    #[test]
    fn test_null_images_declares_without_references() {
        let entry = json!({"id": 1, "name": "x", "workspaceXml": "", "uuid": "u", "images": null});
        assert!(declares_images(&entry));
        let record = ImportPolicy::default().parse_workflow(0, entry).unwrap();
        assert!(record.images.is_none());

        assert!(!declares_images(&json!({"id": 1})));
        assert!(!declares_images(&json!([1])));
    }
}
