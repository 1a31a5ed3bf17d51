use std::env;
use std::path::{Path, PathBuf};

use rollback_store::StoreLayout;
use serde::Deserialize;
use thiserror::Error;

/// Setting this to a truthy value runs the engine without a checkpoint store.
pub const DISABLED_ENV: &str = "ROLLBACK_DISABLED";

const CONFIG_FILE: &str = "config.toml";

// Default value functions for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

fn default_dir() -> String {
    StoreLayout::DEFAULT_DIR_NAME.to_string()
}

/// Project configuration, read from `<project>/.rollback/config.toml`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RollbackConfig {
    pub store: Option<StoreConfig>,
    pub revert: Option<RevertConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Record checkpoints at all. `false` runs with the disabled store.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Project-local directory holding the database and blobs.
    #[serde(default = "default_dir")]
    pub dir: String,
    /// fsync blobs before they are renamed into place.
    #[serde(default = "default_true")]
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_dir(),
            sync_writes: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevertConfig {
    /// Save a copy of each file's current content before rewriting it.
    #[serde(default = "default_true")]
    pub backups: bool,
}

impl Default for RevertConfig {
    fn default() -> Self {
        Self { backups: true }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl RollbackConfig {
    /// Config file location for a project.
    #[must_use]
    pub fn path_for_project(project_root: &Path) -> PathBuf {
        project_root
            .join(StoreLayout::DEFAULT_DIR_NAME)
            .join(CONFIG_FILE)
    }

    /// Load the project's config (defaults if absent) and apply environment overrides.
    pub fn load_for_project(project_root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(&Self::path_for_project(project_root))?.unwrap_or_default();
        if disabled_by_env(env::var(DISABLED_ENV).ok().as_deref()) {
            tracing::info!("{DISABLED_ENV} set; checkpointing disabled");
            config.store.get_or_insert_with(StoreConfig::default).enabled = false;
        }
        Ok(config)
    }

    /// Parse the config at `path`. `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {}: {err}", path.display());
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        Self::parse(&content)
            .map(Some)
            .map_err(|source| {
                tracing::warn!("Failed to parse config at {}: {source}", path.display());
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        self.store.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn backups_enabled(&self) -> bool {
        self.revert.as_ref().is_none_or(|revert| revert.backups)
    }
}

fn disabled_by_env(value: Option<&str>) -> bool {
    value.is_some_and(|raw| {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        )
    })
}
