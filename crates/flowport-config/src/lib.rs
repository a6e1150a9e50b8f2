//! Configuration system for flowport.
//!
//! Provides TOML-based configuration with:
//! - `[import]` policy for the exchange pipeline (schema version, study mode,
//!   accepted image media types, stream chunking)
//! - `[storage]` location of the SQLite database
//! - `[logging]` overrides for the CLI subscriber
//! - Config file layering (XDG user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
