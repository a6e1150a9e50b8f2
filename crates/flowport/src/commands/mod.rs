//! CLI command handlers.

pub mod config;
pub mod export;
pub mod import;
pub mod list;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use flowport_config::{ImportConfig, LoadedConfig};
use flowport_store::SqliteStore;
use tracing::debug;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Explicit user config directory, if given on the command line.
    pub config_dir: Option<PathBuf>,
    /// Database the store commands operate on.
    pub database: PathBuf,
    /// Resolved configuration and the files it came from.
    pub loaded: LoadedConfig,
}

impl Context {
    pub fn import_config(&self) -> ImportConfig {
        self.loaded.config.import()
    }

    /// Open the SQLite store, creating its directory on first use.
    pub fn open_store(&self) -> Result<Arc<SqliteStore>> {
        if let Some(parent) = self.database.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        debug!(path = %self.database.display(), "Opening workflow store");
        let store = SqliteStore::open(&self.database)
            .with_context(|| format!("Failed to open database {}", self.database.display()))?;
        Ok(Arc::new(store))
    }
}
