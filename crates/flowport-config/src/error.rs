//! Errors raised while loading, validating, or saving configuration.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field holds a value outside its allowed range, or a pattern that
    /// does not compile.
    #[error("{field}: {reason}")]
    InvalidValue { field: String, reason: String },
}
