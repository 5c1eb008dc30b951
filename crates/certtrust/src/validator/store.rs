//! Store trust: certificates a user explicitly approved.

use certtrust_core::{Certificate, CertificateChain, CertificateStore, Fingerprint};
use rustls::crypto::CryptoProvider;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::{AnchorSet, Rejection, TrustValidator};

/// Validator backed by a snapshot of the trusted certificate store.
///
/// A leaf that is itself in the store is trusted as is: no path building,
/// no validity period, no basic constraints. Any other chain must lead to a
/// stored certificate acting as a trust anchor, so a stored CA vouches for
/// what it signed.
#[derive(Debug)]
pub struct StoreValidator {
    pinned: HashSet<Fingerprint>,
    anchors: AnchorSet,
}

impl StoreValidator {
    pub fn from_store(store: &CertificateStore, provider: Arc<CryptoProvider>) -> Self {
        Self::from_certificates(store.all(), provider)
    }

    pub fn from_certificates(
        certificates: Vec<Certificate>,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        Self {
            pinned: certificates
                .iter()
                .map(|cert| cert.fingerprint().clone())
                .collect(),
            anchors: AnchorSet::new(certificates, provider),
        }
    }

    /// Number of stored certificates usable as path anchors.
    #[must_use]
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    fn is_pinned(&self, chain: &CertificateChain) -> bool {
        let pinned = self.pinned.contains(chain.leaf().fingerprint());
        if pinned {
            debug!(
                fingerprint = %chain.leaf().fingerprint().short(),
                "leaf is a stored certificate"
            );
        }
        pinned
    }
}

impl TrustValidator for StoreValidator {
    fn name(&self) -> &'static str {
        "store"
    }

    fn verify_server(&self, chain: &CertificateChain, _auth_type: &str) -> Result<(), Rejection> {
        if self.is_pinned(chain) {
            return Ok(());
        }
        self.anchors
            .verify_server(chain)
            .map_err(|e| Rejection::new(self.name(), e))
    }

    fn verify_client(&self, chain: &CertificateChain, _auth_type: &str) -> Result<(), Rejection> {
        if self.is_pinned(chain) {
            return Ok(());
        }
        self.anchors
            .verify_client(chain)
            .map_err(|e| Rejection::new(self.name(), e))
    }

    fn accepted_issuers(&self) -> Vec<Certificate> {
        self.anchors.issuers().to_vec()
    }
}
