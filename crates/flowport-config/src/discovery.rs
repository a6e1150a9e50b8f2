//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/flowport/config.toml` (XDG user config)
//! 2. `./flowport.toml` (project-local)
//! 3. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, FlowportConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "flowport.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "flowport";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "FLOWPORT_CONFIG_DIR";

/// One candidate config file and whether it contributed to the result.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub loaded: bool,
}

/// Merged configuration plus the trail of files that produced it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: FlowportConfig,
    /// Candidate files, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Problems that did not stop loading: skipped layers, suspicious values.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter_map(|s| s.loaded.then_some(s.path.as_path()))
            .collect()
    }
}

pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Discover and merge the user and project layers.
///
/// `config_dir` replaces the user config directory, taking precedence over
/// `FLOWPORT_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let user_layer = config_dir
        .map(|dir| dir.join(USER_CONFIG_FILE))
        .or_else(xdg_config_path);
    let project_layer = project_dir
        .unwrap_or_else(|| Path::new("."))
        .join(PROJECT_CONFIG_FILE);

    let mut loaded = LoadedConfig {
        config: FlowportConfig::new(),
        sources: Vec::with_capacity(2),
        warnings: Vec::new(),
    };
    for path in user_layer.into_iter().chain(std::iter::once(project_layer)) {
        let applied = apply_layer(&mut loaded, &path);
        loaded.sources.push(ConfigSource {
            path,
            loaded: applied,
        });
    }

    if let Some(warning) = relative_database_warning(&loaded.config) {
        loaded.warnings.push(warning);
    }
    Ok(loaded)
}

/// Read and validate a single config file.
pub fn load_config_file(path: &Path) -> Result<FlowportConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    FlowportConfig::from_toml(&text)
}

/// Write `config` as TOML, creating missing parent directories.
pub fn save_config(config: &FlowportConfig, path: &Path) -> Result<()> {
    let write_error = |path: &Path, source| ConfigError::WriteFile {
        path: path.to_path_buf(),
        source,
    };
    let text = config.to_toml()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
    }
    std::fs::write(path, text).map_err(|e| write_error(path, e))
}

pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory: `FLOWPORT_CONFIG_DIR` when set, otherwise
/// `<platform config dir>/flowport`.
pub fn xdg_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

/// Merge the file at `path` into `loaded.config`. Missing files are skipped
/// silently; unreadable or invalid ones are skipped with a warning.
fn apply_layer(loaded: &mut LoadedConfig, path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match load_config_file(path) {
        Ok(layer) => {
            loaded.config.merge(layer);
            true
        }
        Err(e) => {
            loaded
                .warnings
                .push(format!("skipped {}: {}", path.display(), e));
            false
        }
    }
}

fn relative_database_warning(config: &FlowportConfig) -> Option<String> {
    let path = config.storage.as_ref()?.database.as_ref()?;
    path.is_relative().then(|| {
        format!(
            "[storage] database path {} is relative and resolves against the working directory",
            path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[import]\nschema_version = 4\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.import().schema_version, 4);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_project_overrides_user_layer() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            user_dir.path().join(USER_CONFIG_FILE),
            "[storage]\ndatabase = \"/data/user.db\"\n\n[import]\nstudy_mode = false\n",
        )
        .unwrap();
        fs::write(
            project_dir.path().join(PROJECT_CONFIG_FILE),
            "[import]\nstudy_mode = true\n",
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        assert!(loaded.config.import().study_mode);
        assert_eq!(loaded.config.database_path(), PathBuf::from("/data/user.db"));
        assert_eq!(loaded.loaded_from().len(), 2);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_broken_layer_becomes_warning() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            project_dir.path().join(PROJECT_CONFIG_FILE),
            "[import]\nread_ahead_chunks = 0\n",
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        assert!(loaded.loaded_from().is_empty());
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("read_ahead_chunks"));
    }

    #[test]
    fn test_relative_database_warns() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            project_dir.path().join(PROJECT_CONFIG_FILE),
            "[storage]\ndatabase = \"local.db\"\n",
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("relative"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = FlowportConfig::new();
        config.import = Some(crate::ImportConfig::default().with_schema_version(7));

        save_config(&config, &path).unwrap();
        let reloaded = load_config_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
