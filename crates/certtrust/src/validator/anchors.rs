//! Path validation against a fixed set of trust anchors.

use certtrust_core::{Certificate, CertificateChain};
use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::{ParsedCertificate, WebPkiClientVerifier};
use rustls::RootCertStore;
use std::sync::Arc;
use tracing::debug;

/// Trust anchors plus the rustls machinery to validate paths to them.
///
/// Hostnames are not checked here.
pub(crate) struct AnchorSet {
    roots: Arc<RootCertStore>,
    issuers: Vec<Certificate>,
    provider: Arc<CryptoProvider>,
    client_verifier: Option<Arc<dyn ClientCertVerifier>>,
}

impl AnchorSet {
    /// Build from certificates; those unusable as anchors are skipped.
    pub fn new(certificates: Vec<Certificate>, provider: Arc<CryptoProvider>) -> Self {
        let mut roots = RootCertStore::empty();
        let mut issuers = Vec::with_capacity(certificates.len());

        for cert in certificates {
            match roots.add(CertificateDer::from(cert.der().to_vec())) {
                Ok(()) => issuers.push(cert),
                Err(e) => {
                    debug!(subject = cert.subject(), error = %e, "skipping unusable trust anchor");
                }
            }
        }

        let roots = Arc::new(roots);
        let client_verifier = if roots.is_empty() {
            None
        } else {
            WebPkiClientVerifier::builder_with_provider(roots.clone(), provider.clone())
                .build()
                .map_err(|e| debug!(error = %e, "client verification unavailable"))
                .ok()
        };

        Self {
            roots,
            issuers,
            provider,
            client_verifier,
        }
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn issuers(&self) -> &[Certificate] {
        &self.issuers
    }

    pub fn verify_server(&self, chain: &CertificateChain) -> Result<(), rustls::Error> {
        let end_entity = CertificateDer::from(chain.leaf().der());
        let intermediates = intermediates_der(chain);
        let parsed = ParsedCertificate::try_from(&end_entity)?;

        verify_server_cert_signed_by_trust_anchor(
            &parsed,
            &self.roots,
            &intermediates,
            UnixTime::now(),
            self.provider.signature_verification_algorithms.all,
        )
    }

    pub fn verify_client(&self, chain: &CertificateChain) -> Result<(), rustls::Error> {
        let Some(verifier) = &self.client_verifier else {
            return Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::UnknownIssuer,
            ));
        };

        let end_entity = CertificateDer::from(chain.leaf().der());
        let intermediates = intermediates_der(chain);
        verifier
            .verify_client_cert(&end_entity, &intermediates, UnixTime::now())
            .map(|_| ())
    }
}

fn intermediates_der(chain: &CertificateChain) -> Vec<CertificateDer<'_>> {
    chain
        .intermediates()
        .iter()
        .map(|cert| CertificateDer::from(cert.der()))
        .collect()
}

impl std::fmt::Debug for AnchorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorSet")
            .field("anchors", &self.roots.len())
            .field("client_auth", &self.client_verifier.is_some())
            .finish_non_exhaustive()
    }
}
