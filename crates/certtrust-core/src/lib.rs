//! # certtrust-core
//!
//! Core types for the certtrust certificate-trust engine.
//!
//! - [`Certificate`] / [`CertificateChain`]: parsed X.509 values as presented
//!   by a peer, leaf first
//! - [`CertificateStore`]: user-approved certificates, persisted as one text
//!   blob in a [`KeyValueStore`]
//! - [`CertificateSummary`]: what a trust prompt shows the user
//! - [`TrustError`]: the error taxonomy shared by every certtrust crate

pub mod certificate;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod storage;
pub mod store;
pub mod summary;

pub use certificate::{AltName, Certificate, CertificateChain, KeyAlgorithm};
pub use config::TrustConfig;
pub use error::{Result, TrustError};
pub use fingerprint::Fingerprint;
pub use storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use store::{CertificateStore, TrustedEntry, DEFAULT_STORAGE_KEY};
pub use summary::CertificateSummary;

use serde::{Deserialize, Serialize};

/// Answer to exactly one trust prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustDecision {
    /// Trust the certificate from now on
    Accepted,
    /// Leave it untrusted
    Rejected,
}

/// Outcome of loading the trusted store at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreStatus {
    /// No prior trust data
    Empty,
    /// Prior trust data loaded
    Loaded(usize),
    /// Trust data present but unreadable; custom trust is disabled
    Corrupt(String),
}

impl StoreStatus {
    /// Whether new certificates can be trusted.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        !matches!(self, Self::Corrupt(_))
    }
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Loaded(n) => write!(f, "{n} trusted certificate(s)"),
            Self::Corrupt(reason) => write!(f, "corrupt ({reason})"),
        }
    }
}
