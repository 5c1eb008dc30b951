//! Platform trust: the host's default CA roots.

use certtrust_core::config::CA_STORE_PATHS;
use certtrust_core::{Certificate, CertificateChain, Result, TrustError};
use rustls::crypto::CryptoProvider;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AnchorSet, Rejection, TrustValidator};

/// Where platform CA roots come from.
pub trait RootSource: Send + Sync + std::fmt::Debug {
    /// Load every root certificate. An empty result is an initialization
    /// failure, not an empty trust set.
    fn load_roots(&self) -> Result<Vec<Certificate>>;
}

/// Root certificates from the distribution CA store.
#[derive(Debug, Clone)]
pub struct SystemRoots {
    paths: Vec<PathBuf>,
}

impl SystemRoots {
    /// Search the given bundle files and certificate directories.
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for SystemRoots {
    fn default() -> Self {
        Self::new(CA_STORE_PATHS.iter().copied())
    }
}

impl RootSource for SystemRoots {
    fn load_roots(&self) -> Result<Vec<Certificate>> {
        let mut certs = Vec::new();
        let mut seen_fingerprints = HashSet::new();

        for path in &self.paths {
            if !path.exists() {
                debug!(path = %path.display(), "CA store path not found, skipping");
                continue;
            }

            let found = if path.is_dir() {
                parse_cert_directory(path)
            } else {
                parse_pem_bundle(path)
            };

            match found {
                Ok(found) => {
                    for cert in found {
                        if seen_fingerprints.insert(cert.fingerprint().clone()) {
                            certs.push(cert);
                        }
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read CA store"),
            }
        }

        if certs.is_empty() {
            return Err(TrustError::TrustInit(format!(
                "no CA roots found in {} search path(s)",
                self.paths.len()
            )));
        }

        info!(count = certs.len(), "loaded platform CA roots");
        Ok(certs)
    }
}

/// Parse a PEM bundle file containing multiple certificates.
fn parse_pem_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let content = std::fs::read(path)?;
    let pems = pem::parse_many(&content)
        .map_err(|e| TrustError::TrustInit(format!("{}: {e}", path.display())))?;

    let mut certs = Vec::new();
    for p in pems {
        if p.tag() != "CERTIFICATE" {
            continue;
        }
        match Certificate::from_der(p.into_contents()) {
            Ok(cert) => certs.push(cert),
            Err(e) => debug!(path = %path.display(), error = %e, "skipping cert in bundle"),
        }
    }

    Ok(certs)
}

/// Parse all .pem / .crt / .cer files in a directory.
fn parse_cert_directory(dir: &Path) -> Result<Vec<Certificate>> {
    let mut certs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !matches!(ext, "pem" | "crt" | "cer") {
            continue;
        }
        match parse_pem_bundle(&path) {
            Ok(found) => certs.extend(found),
            Err(e) => debug!(path = %path.display(), error = %e, "skipping cert file"),
        }
    }

    Ok(certs)
}

/// A fixed list of roots, for embedders that ship their own bundle.
#[derive(Debug, Clone, Default)]
pub struct StaticRoots {
    roots: Vec<Certificate>,
}

impl StaticRoots {
    #[must_use]
    pub const fn new(roots: Vec<Certificate>) -> Self {
        Self { roots }
    }
}

impl RootSource for StaticRoots {
    fn load_roots(&self) -> Result<Vec<Certificate>> {
        if self.roots.is_empty() {
            return Err(TrustError::TrustInit("static root list is empty".into()));
        }
        Ok(self.roots.clone())
    }
}

/// Validator backed by the platform's default CA roots.
#[derive(Debug)]
pub struct PlatformValidator {
    anchors: AnchorSet,
}

impl PlatformValidator {
    /// Load roots and build the validator.
    ///
    /// Fails with `TrustInit` when the source is unavailable or none of its
    /// certificates can serve as a trust anchor.
    pub fn from_source(source: &dyn RootSource, provider: Arc<CryptoProvider>) -> Result<Self> {
        let anchors = AnchorSet::new(source.load_roots()?, provider);
        if anchors.is_empty() {
            return Err(TrustError::TrustInit(
                "no usable trust anchors among platform roots".into(),
            ));
        }
        Ok(Self { anchors })
    }

    /// Number of usable roots.
    #[must_use]
    pub fn root_count(&self) -> usize {
        self.anchors.len()
    }
}

impl TrustValidator for PlatformValidator {
    fn name(&self) -> &'static str {
        "platform"
    }

    fn verify_server(
        &self,
        chain: &CertificateChain,
        _auth_type: &str,
    ) -> std::result::Result<(), Rejection> {
        self.anchors
            .verify_server(chain)
            .map_err(|e| Rejection::new(self.name(), e))
    }

    fn verify_client(
        &self,
        chain: &CertificateChain,
        _auth_type: &str,
    ) -> std::result::Result<(), Rejection> {
        self.anchors
            .verify_client(chain)
            .map_err(|e| Rejection::new(self.name(), e))
    }

    fn accepted_issuers(&self) -> Vec<Certificate> {
        self.anchors.issuers().to_vec()
    }
}
