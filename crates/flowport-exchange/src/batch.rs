//! Parser for fully materialized documents.

use serde_json::Value;
use tracing::debug;

use crate::document::{IMAGES, ImportPolicy, VERSION, WORKFLOWS, declares_images};
use crate::progress::ProgressTracker;
use crate::state::{ImportResult, ParsingState};
use crate::verifier::ImageVerifier;
use crate::{ExchangeError, Result};

/// Parses a whole document at once, then walks it to validate and verify.
///
/// Fails on the first problem found. The total number of progress units is
/// known after the structural checks and is added to the tracker up front.
#[derive(Debug, Clone)]
pub struct BatchParser {
    policy: ImportPolicy,
    verifier: ImageVerifier,
}

impl BatchParser {
    pub fn new(policy: ImportPolicy, verifier: ImageVerifier) -> Self {
        Self { policy, verifier }
    }

    pub async fn parse(&self, document: &str, progress: &ProgressTracker) -> Result<ImportResult> {
        let root: Value = serde_json::from_str(document)
            .map_err(|e| ExchangeError::DocumentSyntax(e.to_string()))?;
        let Value::Object(mut root) = root else {
            return Err(ExchangeError::MissingRootProperty);
        };

        let mut state = ParsingState::new();
        let version = root.remove(VERSION);
        let workflows = root.remove(WORKFLOWS);
        let images = root.remove(IMAGES);
        state.has_version_property = version.is_some();
        state.has_workflows_property = workflows.is_some();
        state.contains_images = images.is_some();
        state.check_root_properties()?;

        let mut images = match images {
            None => serde_json::Map::new(),
            Some(Value::Object(images)) => images,
            Some(_) => {
                return Err(ExchangeError::InvalidRootProperty {
                    property: IMAGES,
                    reason: "not an object".to_string(),
                });
            }
        };
        if let Some(version) = &version {
            state.version = Some(self.policy.check_version(version)?);
        }

        let Some(Value::Array(entries)) = workflows else {
            return Err(ExchangeError::InvalidRootProperty {
                property: WORKFLOWS,
                reason: "not an array".to_string(),
            });
        };
        for (index, entry) in entries.into_iter().enumerate() {
            let declared = declares_images(&entry);
            let record = self.policy.parse_workflow(index, entry)?;
            state.push_workflow(index, record)?;
            state.requires_images |= declared;
        }
        state.check_images_section()?;

        let referenced = state.referenced_hashes();
        let references: usize = state.workflows().iter().map(|w| w.image_count()).sum();
        progress.add_total((state.workflows().len() + references + referenced.len()) as u64);

        // Entries nobody references are never looked at.
        for hash in referenced {
            if state.has_image(&hash) {
                continue;
            }
            let uri = match images.remove(&hash) {
                Some(Value::String(uri)) => uri,
                Some(_) => {
                    return Err(ExchangeError::MalformedImageData(format!(
                        "data for image {hash} is not a string"
                    )));
                }
                None => return Err(ExchangeError::MissingImageData(hash)),
            };
            let blob = self.verifier.decode_and_verify_async(uri, hash).await?;
            state.insert_image(blob);
            progress.step();
        }

        debug!(
            workflows = state.workflows().len(),
            images = state.image_count(),
            "Parsed document"
        );
        state.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressBus;
    use flowport_config::DEFAULT_IMAGE_MEDIA_TYPE;
    use flowport_types::content_hash;
    use serde_json::json;
    use uuid::Uuid;

    fn parser() -> BatchParser {
        BatchParser::new(
            ImportPolicy::default(),
            ImageVerifier::new(DEFAULT_IMAGE_MEDIA_TYPE).unwrap(),
        )
    }

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Uuid::new_v4(), ProgressBus::new(16))
    }

    #[tokio::test]
    async fn test_single_workflow_without_images() {
        let progress = tracker();
        let result = parser()
            .parse(
                r#"{"version": 3, "workflows": [{"id": 1, "name": "A", "workspaceXml": "<xml/>", "uuid": "u"}]}"#,
                &progress,
            )
            .await
            .unwrap();

        assert_eq!(result.version, 3);
        assert_eq!(result.workflows.len(), 1);
        assert!(result.images.is_empty());
        assert_eq!(progress.snapshot().events_total, 1);
        assert_eq!(progress.snapshot().events_count, 0);
    }

    #[tokio::test]
    async fn test_shared_hash_decoded_once() {
        let hash = content_hash(&[1, 2, 3]);
        let document = json!({
            "version": 3,
            "workflows": [
                {"id": 1, "name": "A", "workspaceXml": "", "uuid": "a", "images": {"x": hash}},
                {"id": 2, "name": "B", "workspaceXml": "", "uuid": "b", "images": {"y": hash}}
            ],
            "images": {
                (hash.clone()): "data:image/png;base64,AQID",
                (content_hash(b"orphan")): "data:image/png;base64,AQID"
            }
        });

        let progress = tracker();
        let result = parser().parse(&document.to_string(), &progress).await.unwrap();

        assert_eq!(result.images.len(), 1);
        let snapshot = progress.snapshot();
        // 2 workflows + 2 references + 1 distinct image
        assert_eq!(snapshot.events_total, 5);
        assert_eq!(snapshot.events_count, 1);
    }

    #[tokio::test]
    async fn test_structural_errors() {
        let cases = [
            ("not json", "DocumentSyntax"),
            (r#"{"workflows": []}"#, "MissingRootProperty"),
            (r#"[1]"#, "MissingRootProperty"),
            (r#"{"version": 3, "workflows": [], "images": []}"#, "InvalidRootProperty"),
            (r#"{"version": 9, "workflows": []}"#, "InvalidVersion"),
            (r#"{"version": 3, "workflows": {}}"#, "InvalidRootProperty"),
        ];
        for (document, expected) in cases {
            let err = parser().parse(document, &tracker()).await.unwrap_err();
            assert!(format!("{err:?}").starts_with(expected), "{document}: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_images_section() {
        let document = json!({
            "version": 3,
            "workflows": [{"id": 1, "name": "A", "workspaceXml": "", "images": {"x": content_hash(b"x")}}]
        });
        let err = parser()
            .parse(&document.to_string(), &tracker())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MissingImagesSection));
    }

    #[tokio::test]
    async fn test_hash_mismatch() {
        let declared = content_hash(b"something else");
        let document = json!({
            "version": 3,
            "workflows": [{"id": 1, "name": "A", "workspaceXml": "", "images": {"x": declared}}],
            "images": {(declared.clone()): "data:image/png;base64,AQID"}
        });
        let err = parser()
            .parse(&document.to_string(), &tracker())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ImageHashMismatch { .. }));
    }

    #[tokio::test]
    async fn test_missing_image_data() {
        let document = json!({
            "version": 3,
            "workflows": [{"id": 1, "name": "A", "workspaceXml": "", "images": {"x": content_hash(b"x")}}],
            "images": {}
        });
        let err = parser()
            .parse(&document.to_string(), &tracker())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MissingImageData(_)));
    }

    #[tokio::test]
    async fn test_unreferenced_image_keys_ignored() {
        let document = json!({
            "version": 3,
            "workflows": [{"id": 1, "name": "A", "workspaceXml": "", "uuid": "a"}],
            "images": {"H1": "data:image/png;base64,AA=="}
        });
        let result = parser().parse(&document.to_string(), &tracker()).await.unwrap();
        assert_eq!(result.workflows.len(), 1);
        assert!(result.images.is_empty());
    }

    #[tokio::test]
    async fn test_null_images_needs_section() {
        let workflow = json!({"id": 1, "name": "A", "workspaceXml": "", "uuid": "a", "images": null});
        let document = json!({"version": 3, "workflows": [workflow.clone()]});
        let err = parser()
            .parse(&document.to_string(), &tracker())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MissingImagesSection));

        let document = json!({"version": 3, "workflows": [workflow], "images": {}});
        let result = parser().parse(&document.to_string(), &tracker()).await.unwrap();
        assert_eq!(result.workflows[0].images, None);
    }
}
