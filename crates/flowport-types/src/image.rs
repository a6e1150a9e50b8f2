//! Content-addressed image blobs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::WorkflowId;

/// Length of a hex-encoded SHA-256 content hash.
pub const HASH_LENGTH: usize = 64;

/// Compute the content hash (lowercase hex SHA-256) of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Whether `value` has the shape of a content hash: 64 lowercase hex digits.
pub fn is_content_hash(value: &str) -> bool {
    value.len() == HASH_LENGTH && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Binary image payload together with its media type.
///
/// The hash is computed on construction and cannot be changed afterwards, so
/// `blob.hash() == content_hash(blob.data())` always holds.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    hash: String,
    media_type: String,
    data: Vec<u8>,
}

impl ImageBlob {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            hash: content_hash(&data),
            media_type: media_type.into(),
            data,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBlob")
            .field("hash", &self.hash)
            .field("media_type", &self.media_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A named reference from a workflow to a stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub hash: String,
}
