//! Data-URI decoding and content-hash verification of embedded images.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use flowport_config::{ConfigError, ImportConfig};
use flowport_types::{ImageBlob, is_content_hash};
use regex::Regex;

use crate::{ExchangeError, Result};

/// Standard alphabet, padding optional.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// `data:<media-type>[;charset=...][;base64],<payload>`
const DATA_URI_PATTERN: &str = r"(?is)^data:([\w/+.-]+)(;charset=[\w-]+)?(;base64)?,(.*)$";

/// Check the shape of an image hash referenced by a workflow.
pub fn check_hash_format(hash: &str) -> Result<()> {
    if !is_content_hash(hash) {
        return Err(ExchangeError::InvalidImageHash(hash.to_string()));
    }
    Ok(())
}

/// Encode a blob as a base64 data-URI.
pub fn to_data_uri(blob: &ImageBlob) -> String {
    format!(
        "data:{};base64,{}",
        blob.media_type(),
        base64::engine::general_purpose::STANDARD.encode(blob.data())
    )
}

/// Decodes image data-URIs and checks them against their declared hash.
///
/// Holds the media-type pattern images must match. Verification is pure: it
/// never touches parsing state or stores.
#[derive(Debug, Clone)]
pub struct ImageVerifier {
    data_uri: Regex,
    media_type: Regex,
}

impl ImageVerifier {
    /// Build a verifier accepting media types that match `pattern`.
    pub fn new(pattern: &str) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            data_uri: compile("data_uri", DATA_URI_PATTERN)?,
            media_type: compile("import.image_media_type", pattern)?,
        })
    }

    pub fn from_config(config: &ImportConfig) -> std::result::Result<Self, ConfigError> {
        Self::new(&config.image_media_type)
    }

    /// Decode a data-URI into a blob without checking its hash.
    pub fn decode(&self, data_uri: &str) -> Result<ImageBlob> {
        let caps = self.data_uri.captures(data_uri).ok_or_else(|| {
            ExchangeError::MalformedImageData("not a data URI".to_string())
        })?;

        let media_type = caps[1].to_ascii_lowercase();
        if !self.media_type.is_match(&media_type) {
            return Err(ExchangeError::MalformedImageData(format!(
                "media type '{media_type}' is not accepted"
            )));
        }
        if caps.get(3).is_none() {
            return Err(ExchangeError::MalformedImageData(
                "only base64 encoded data URIs are supported".to_string(),
            ));
        }

        let payload: Vec<u8> = caps[4]
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let data = FORGIVING
            .decode(&payload)
            .map_err(|e| ExchangeError::MalformedImageData(e.to_string()))?;

        Ok(ImageBlob::new(media_type, data))
    }

    /// Decode a data-URI and assert its content hash equals `expected_hash`
    /// exactly. Any other key, including an upper-case spelling of the right
    /// digest, is a mismatch.
    pub fn decode_and_verify(&self, data_uri: &str, expected_hash: &str) -> Result<ImageBlob> {
        let blob = self.decode(data_uri)?;
        if blob.hash() != expected_hash {
            return Err(ExchangeError::ImageHashMismatch {
                expected: expected_hash.to_string(),
                actual: blob.hash().to_string(),
            });
        }
        Ok(blob)
    }

    /// [`decode_and_verify`](Self::decode_and_verify) on the blocking pool.
    pub async fn decode_and_verify_async(
        &self,
        data_uri: String,
        expected_hash: String,
    ) -> Result<ImageBlob> {
        let verifier = self.clone();
        tokio::task::spawn_blocking(move || verifier.decode_and_verify(&data_uri, &expected_hash))
            .await?
    }
}

fn compile(field: &str, pattern: &str) -> std::result::Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowport_config::DEFAULT_IMAGE_MEDIA_TYPE;
    use flowport_types::content_hash;

    fn verifier() -> ImageVerifier {
        ImageVerifier::new(DEFAULT_IMAGE_MEDIA_TYPE).unwrap()
    }

    const PNG_URI: &str = "data:image/png;base64,AQID";

    #[test]
    fn test_decode_valid_uri() {
        let blob = verifier().decode_and_verify(PNG_URI, &content_hash(&[1, 2, 3])).unwrap();
        assert_eq!(blob.data(), &[1, 2, 3]);
        assert_eq!(blob.media_type(), "image/png");
    }

    #[test]
    fn test_forgiving_base64() {
        let blob = verifier()
            .decode("DATA:image/svg+xml;charset=utf-8;base64,AQ\n ID\r\nBA")
            .unwrap();
        assert_eq!(blob.data(), &[1, 2, 3, 4]);
        assert_eq!(blob.media_type(), "image/svg+xml");
    }

    #[test]
    fn test_rejects_other_media_types() {
        let err = verifier().decode("data:text/plain;base64,AQID").unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedImageData(_)));
    }

    #[test]
    fn test_rejects_non_base64_payload() {
        assert!(matches!(
            verifier().decode("data:image/png,AQID"),
            Err(ExchangeError::MalformedImageData(_))
        ));
        assert!(matches!(
            verifier().decode("data:image/png;base64,@@@"),
            Err(ExchangeError::MalformedImageData(_))
        ));
        assert!(matches!(
            verifier().decode("http://example.com/a.png"),
            Err(ExchangeError::MalformedImageData(_))
        ));
    }

    #[test]
    fn test_hash_mismatch() {
        let err = verifier()
            .decode_and_verify(PNG_URI, &content_hash(b"other"))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ImageHashMismatch { .. }));
    }

    #[test]
    fn test_hash_comparison_is_exact() {
        let upper = content_hash(&[1, 2, 3]).to_ascii_uppercase();
        assert!(matches!(
            verifier().decode_and_verify(PNG_URI, &upper),
            Err(ExchangeError::ImageHashMismatch { .. })
        ));
        assert!(matches!(
            verifier().decode_and_verify(PNG_URI, "H1"),
            Err(ExchangeError::ImageHashMismatch { .. })
        ));
    }

    #[test]
    fn test_check_hash_format() {
        assert!(check_hash_format(&content_hash(b"x")).is_ok());
        assert!(matches!(
            check_hash_format(&content_hash(b"x").to_ascii_uppercase()),
            Err(ExchangeError::InvalidImageHash(_))
        ));
        assert!(matches!(
            check_hash_format("abc"),
            Err(ExchangeError::InvalidImageHash(_))
        ));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        assert!(matches!(
            ImageVerifier::new("(unclosed"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_data_uri_roundtrip() {
        let blob = ImageBlob::new("image/gif", vec![0, 255, 7]);
        let decoded = verifier().decode_and_verify(&to_data_uri(&blob), blob.hash()).unwrap();
        assert_eq!(decoded, blob);
    }

    #[tokio::test]
    async fn test_async_variant() {
        let blob = verifier()
            .decode_and_verify_async(PNG_URI.to_string(), content_hash(&[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(blob.len(), 3);
    }
}
