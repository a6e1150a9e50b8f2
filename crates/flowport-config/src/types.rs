//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [import]
//! schema_version = 3
//! study_mode = false
//! image_media_type = '^image/[\w+.-]+$'
//! chunk_size = 65536
//! read_ahead_chunks = 4
//! progress_channel_capacity = 256
//!
//! [storage]
//! database = "/var/lib/flowport/flowport.db"
//!
//! [logging]
//! level = "flowport=debug,info"
//! json_file = true
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Schema version written by the current exporter.
pub const DEFAULT_SCHEMA_VERSION: i64 = 3;

/// Media types accepted for embedded images.
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = r"^image/[\w+.-]+$";

/// Bytes read from a stream per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Chunks read ahead of the parser.
pub const DEFAULT_READ_AHEAD_CHUNKS: usize = 4;

/// Buffered progress events per subscriber before lagging.
pub const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Database filename inside the data directory.
const DATABASE_FILE: &str = "flowport.db";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowportConfig {
    /// Import pipeline policy.
    pub import: Option<ImportConfig>,

    /// Storage backend settings.
    pub storage: Option<StorageConfig>,

    /// CLI logging overrides.
    pub logging: Option<LoggingConfig>,
}

impl FlowportConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        if let Some(import) = &config.import {
            import.validate()?;
        }
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: FlowportConfig) {
        if other.import.is_some() {
            self.import = other.import;
        }

        if other.storage.is_some() {
            self.storage = other.storage;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Effective import policy (defaults when the section is absent).
    pub fn import(&self) -> ImportConfig {
        self.import.clone().unwrap_or_default()
    }

    /// Effective database path.
    ///
    /// Falls back to `<data dir>/flowport/flowport.db`, or `./flowport.db`
    /// when the platform has no data directory.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = self.storage.as_ref().and_then(|s| s.database.clone()) {
            return path;
        }
        dirs::data_dir()
            .map(|d| d.join("flowport").join(DATABASE_FILE))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Import Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Policy and tuning for the import pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Highest document schema version this importer understands.
    pub schema_version: i64,

    /// Study mode rejects older schema versions and workflows without uuid.
    pub study_mode: bool,

    /// Regular expression the media type of every embedded image must match.
    pub image_media_type: String,

    /// Bytes read from a stream per chunk.
    pub chunk_size: usize,

    /// Chunks the reader may fetch ahead of the parser.
    pub read_ahead_chunks: usize,

    /// Capacity of the progress broadcast channel.
    pub progress_channel_capacity: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION,
            study_mode: false,
            image_media_type: DEFAULT_IMAGE_MEDIA_TYPE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_ahead_chunks: DEFAULT_READ_AHEAD_CHUNKS,
            progress_channel_capacity: DEFAULT_PROGRESS_CHANNEL_CAPACITY,
        }
    }
}

impl ImportConfig {
    pub fn with_schema_version(mut self, version: i64) -> Self {
        self.schema_version = version;
        self
    }

    pub fn with_study_mode(mut self, enabled: bool) -> Self {
        self.study_mode = enabled;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Check numeric fields. The media-type pattern is compiled (and
    /// rejected if invalid) by the pipeline that uses it.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("import.chunk_size", self.chunk_size),
            ("import.read_ahead_chunks", self.read_ahead_chunks),
            (
                "import.progress_channel_capacity",
                self.progress_channel_capacity,
            ),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage / Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Storage backend settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database.
    pub database: Option<PathBuf>,
}

/// Logging overrides for the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive for the console layer.
    pub level: Option<String>,

    /// Also write JSON logs to a daily-rolling file in the config directory.
    pub json_file: bool,
}
