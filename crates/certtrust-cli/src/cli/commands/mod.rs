//! Command implementations.

pub mod check;
pub mod config;
pub mod trust;

use anyhow::Result;
use certtrust::validator::SystemRoots;
use certtrust::{RejectionReceiver, TrustAuthority};
use certtrust_core::{FileKeyValueStore, TrustConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Active configuration
    pub config: TrustConfig,

    /// Where the configuration was (or would be) loaded from
    pub config_path: PathBuf,

    /// Output format
    pub output_format: OutputFormat,

    /// Verbose output
    pub verbose: bool,
}

impl Context {
    /// File holding the trusted store.
    pub fn storage_path(&self) -> Result<PathBuf> {
        crate::config::storage_path(&self.config)
    }

    /// Build the trust authority over the configured store and CA paths.
    pub fn authority(&self) -> Result<(Arc<TrustAuthority>, RejectionReceiver)> {
        let storage_path = self.storage_path()?;
        debug!(path = %storage_path.display(), "using trusted store");

        Ok(TrustAuthority::builder(Arc::new(FileKeyValueStore::new(storage_path)))
            .storage_key(self.config.storage_key.clone())
            .roots(Arc::new(SystemRoots::new(self.config.ca_paths.clone())))
            .build())
    }
}
