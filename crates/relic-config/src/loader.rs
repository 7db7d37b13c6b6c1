//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.relic/config.toml`
//! 2. Local config: `.relic/config.toml` (in workspace)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::{ConfigOverrides, PartialConfig, RelicConfig};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory name, both global and per-workspace.
const CONFIG_DIR: &str = ".relic";

/// Configuration loader with inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.relic`)
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new loader, detecting the global config directory.
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(CONFIG_DIR));
        Self { global_config_dir }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a workspace.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: defaults → global → local → overrides.
    pub fn load(
        &self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<RelicConfig, ConfigError> {
        let mut config = RelicConfig::default();

        if let Some(global_path) = self.global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                load_partial(&global_path)?.merge_into(&mut config);
            } else {
                trace!("Global config not found at {:?}", global_path);
            }
        }

        let local_path = self.local_config_path(workspace_root);
        if local_path.exists() {
            debug!("Loading local config from {:?}", local_path);
            load_partial(&local_path)?.merge_into(&mut config);
        } else {
            trace!("Local config not found at {:?}", local_path);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Write the given config to the workspace's local config file.
    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &RelicConfig,
    ) -> Result<PathBuf, ConfigError> {
        let local_path = self.local_config_path(workspace_root);
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(parent, e))?;
        }
        let text = toml::to_string_pretty(config)?;
        std::fs::write(&local_path, text).map_err(|e| ConfigError::write(&local_path, e))?;
        Ok(local_path)
    }
}

fn load_partial(path: &Path) -> Result<PartialConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    toml::from_str(&text).map_err(|e| ConfigError::parse(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn load_without_files_yields_defaults() {
        let workspace = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(global.path());

        let config = loader.load(workspace.path(), None).unwrap();
        assert_eq!(config, RelicConfig::default());
    }

    #[test]
    fn local_overrides_global() {
        let workspace = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();

        std::fs::write(
            global.path().join("config.toml"),
            "surgical_update_limit = 9\nmax_file_bytes = 2048\n",
        )
        .unwrap();

        let local_dir = workspace.path().join(".relic");
        std::fs::create_dir_all(&local_dir).unwrap();
        std::fs::write(local_dir.join("config.toml"), "surgical_update_limit = 3\n").unwrap();

        let loader = ConfigLoader::with_global_dir(global.path());
        let config = loader.load(workspace.path(), None).unwrap();

        assert_eq!(config.surgical_update_limit, 3);
        assert_eq!(config.max_file_bytes, 2048);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let workspace = TempDir::new().unwrap();
        let local_dir = workspace.path().join(".relic");
        std::fs::create_dir_all(&local_dir).unwrap();
        std::fs::write(local_dir.join("config.toml"), "not valid = = toml").unwrap();

        let global = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(global.path());
        let err = loader.load(workspace.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn save_local_round_trips() {
        let workspace = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(global.path());

        let mut config = RelicConfig::default();
        config.surgical_update_limit = 7;
        loader.save_local(workspace.path(), &config).unwrap();

        let loaded = loader.load(workspace.path(), None).unwrap();
        assert_eq!(loaded.surgical_update_limit, 7);
    }
}
