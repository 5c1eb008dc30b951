//! Trust engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TrustError};
use crate::store::DEFAULT_STORAGE_KEY;

/// Known root CA store locations across Linux distributions.
pub const CA_STORE_PATHS: &[&str] = &[
    // Arch / Fedora / RHEL bundle
    "/etc/ssl/certs/ca-certificates.crt",
    // Debian / Ubuntu bundle
    "/etc/ssl/certs/ca-bundle.crt",
    // Individual cert directory (Debian/Ubuntu)
    "/etc/ssl/certs",
    // Fedora / RHEL individual certs
    "/etc/pki/tls/certs",
    // SUSE
    "/etc/ssl/ca-bundle.pem",
    // Alpine
    "/etc/ssl/cert.pem",
    // p11-kit trust anchors
    "/etc/ca-certificates/extracted/tls-ca-bundle.pem",
    // macOS / BSD
    "/usr/local/etc/openssl/cert.pem",
];

/// Configuration for a trust engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Key the trusted certificate store is persisted under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Key/value file backing the store (default: embedder decides).
    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    /// Files and directories searched for platform CA roots.
    #[serde(default = "default_ca_paths")]
    pub ca_paths: Vec<PathBuf>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            storage_path: None,
            ca_paths: default_ca_paths(),
        }
    }
}

impl TrustConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| TrustError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TrustError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(TrustError::Config("storage_key must not be empty".into()));
        }
        Ok(())
    }
}

fn default_storage_key() -> String {
    String::from(DEFAULT_STORAGE_KEY)
}

fn default_ca_paths() -> Vec<PathBuf> {
    CA_STORE_PATHS.iter().map(PathBuf::from).collect()
}
