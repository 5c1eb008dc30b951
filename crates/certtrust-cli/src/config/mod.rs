//! Configuration file and data directory locations.

use anyhow::{Context as _, Result};
use certtrust_core::TrustConfig;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const STORE_FILE: &str = "trust.json";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "certtrust", "certcheck")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Per-user config file path.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Load configuration, falling back to defaults when the file is missing.
pub fn load(path: &Path) -> Result<TrustConfig> {
    TrustConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Where the trusted store lives: the configured path, else the per-user
/// data directory.
pub fn storage_path(config: &TrustConfig) -> Result<PathBuf> {
    match &config.storage_path {
        Some(path) => Ok(path.clone()),
        None => Ok(project_dirs()?.data_dir().join(STORE_FILE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_storage_path_wins() {
        let config = TrustConfig {
            storage_path: Some(PathBuf::from("/tmp/certcheck/store.json")),
            ..TrustConfig::default()
        };
        assert_eq!(
            storage_path(&config).unwrap(),
            PathBuf::from("/tmp/certcheck/store.json")
        );
    }

    #[test]
    fn missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, TrustConfig::default());
    }
}
