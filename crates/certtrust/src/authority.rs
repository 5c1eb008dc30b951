//! The process-wide trust authority.
//!
//! [`TrustAuthority`] owns the current [`ValidatorChain`] and the trusted
//! [`CertificateStore`]. Handshakes read the chain concurrently; trusting a
//! certificate derives a fresh chain from the store and swaps it in. Chains
//! rejected by every validator are reported on an unbounded channel so the
//! [`TrustDecisionCoordinator`](crate::TrustDecisionCoordinator) can ask the
//! user about them.

use certtrust_core::{
    Certificate, CertificateChain, CertificateStore, Fingerprint, KeyValueStore, Result,
    StoreStatus, TrustError, TrustedEntry, DEFAULT_STORAGE_KEY,
};
use parking_lot::{Mutex, RwLock};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::verify_server_name;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::ParsedCertificate;
use rustls::{
    CertificateError, DigitallySignedStruct, DistinguishedName, RootCertStore, SignatureScheme,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chain::ValidatorChain;
use crate::validator::{PlatformValidator, Rejection, RootSource, SystemRoots};

/// Leaves that every validator rejected, in rejection order.
#[derive(Debug)]
pub struct RejectionReceiver(mpsc::UnboundedReceiver<Certificate>);

impl RejectionReceiver {
    /// Wait for the next rejected leaf. `None` once the authority is gone.
    pub async fn recv(&mut self) -> Option<Certificate> {
        self.0.recv().await
    }

    /// Take a rejected leaf if one is queued.
    pub fn try_recv(&mut self) -> Option<Certificate> {
        self.0.try_recv().ok()
    }
}

enum StoreState {
    Ready(CertificateStore),
    Unavailable(String),
}

impl StoreState {
    fn ready(&self) -> Option<&CertificateStore> {
        match self {
            Self::Ready(store) => Some(store),
            Self::Unavailable(_) => None,
        }
    }

    fn ready_mut(&mut self) -> Result<&mut CertificateStore> {
        match self {
            Self::Ready(store) => Ok(store),
            Self::Unavailable(_) => Err(TrustError::StoreUnavailable),
        }
    }

    fn status(&self) -> StoreStatus {
        match self {
            Self::Ready(store) if store.is_empty() => StoreStatus::Empty,
            Self::Ready(store) => StoreStatus::Loaded(store.len()),
            Self::Unavailable(reason) => StoreStatus::Corrupt(reason.clone()),
        }
    }
}

/// Builder for a [`TrustAuthority`].
pub struct TrustAuthorityBuilder {
    storage: Arc<dyn KeyValueStore>,
    storage_key: String,
    roots: Arc<dyn RootSource>,
    provider: Option<Arc<CryptoProvider>>,
}

impl TrustAuthorityBuilder {
    /// Start from the durable storage holding the trusted store.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            roots: Arc::new(SystemRoots::default()),
            provider: None,
        }
    }

    /// Key the store blob lives under
    #[must_use]
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Where platform roots come from (defaults to the system CA store)
    #[must_use]
    pub fn roots(mut self, roots: Arc<dyn RootSource>) -> Self {
        self.roots = roots;
        self
    }

    /// Crypto provider for verification and TLS (defaults to ring)
    #[must_use]
    pub fn provider(mut self, provider: Arc<CryptoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Load the store and platform roots and build the first chain.
    ///
    /// Never fails: a corrupt store disables custom trust and missing platform
    /// roots leave only the store validator. Both are reported through
    /// [`TrustAuthority::store_status`] and the logs.
    #[must_use]
    pub fn build(self) -> (Arc<TrustAuthority>, RejectionReceiver) {
        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()));

        let state = match CertificateStore::load(self.storage.clone(), self.storage_key.clone()) {
            Ok(store) => StoreState::Ready(store),
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "custom certificate trust disabled");
                StoreState::Unavailable(e.to_string())
            }
        };

        let platform = load_platform(self.roots.as_ref(), &provider);
        let chain = ValidatorChain::build(platform, state.ready(), provider.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        let authority = TrustAuthority {
            chain: RwLock::new(Arc::new(chain)),
            store: Mutex::new(state),
            storage: self.storage,
            storage_key: self.storage_key,
            roots: self.roots,
            provider,
            rejections: tx,
        };

        info!(status = %authority.store_status(), "trust authority ready");
        (Arc::new(authority), RejectionReceiver(rx))
    }
}

fn load_platform(
    roots: &dyn RootSource,
    provider: &Arc<CryptoProvider>,
) -> Option<Arc<PlatformValidator>> {
    match PlatformValidator::from_source(roots, provider.clone()) {
        Ok(platform) => Some(Arc::new(platform)),
        Err(e) => {
            warn!(error = %e, "platform trust roots unavailable");
            None
        }
    }
}

/// Composite certificate verifier shared by every TLS connection.
pub struct TrustAuthority {
    chain: RwLock<Arc<ValidatorChain>>,
    store: Mutex<StoreState>,
    storage: Arc<dyn KeyValueStore>,
    storage_key: String,
    roots: Arc<dyn RootSource>,
    provider: Arc<CryptoProvider>,
    rejections: mpsc::UnboundedSender<Certificate>,
}

impl TrustAuthority {
    #[must_use]
    pub fn builder(storage: Arc<dyn KeyValueStore>) -> TrustAuthorityBuilder {
        TrustAuthorityBuilder::new(storage)
    }

    /// Snapshot of the current chain.
    #[must_use]
    pub fn chain(&self) -> Arc<ValidatorChain> {
        self.chain.read().clone()
    }

    #[must_use]
    pub fn crypto_provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// Check a server chain against every trust source.
    ///
    /// On full rejection the leaf is queued for a trust prompt and the last
    /// rejection is returned; the current handshake fails either way.
    pub fn verify_server(&self, chain: &CertificateChain) -> std::result::Result<(), Rejection> {
        let auth_type = chain.leaf().key_algorithm().auth_type();
        let current = self.chain();

        current.verify_server(chain, auth_type).map_err(|rejection| {
            info!(
                subject = chain.leaf().subject(),
                fingerprint = %chain.leaf().fingerprint().short(),
                reason = %rejection,
                "server certificate not trusted"
            );
            if self.rejections.send(chain.leaf().clone()).is_err() {
                debug!("no trust coordinator listening, rejection not forwarded");
            }
            rejection
        })
    }

    /// Check a client chain. Never prompts.
    pub fn verify_client(&self, chain: &CertificateChain) -> std::result::Result<(), Rejection> {
        let auth_type = chain.leaf().key_algorithm().auth_type();
        self.chain().verify_client(chain, auth_type)
    }

    #[must_use]
    pub fn accepted_issuers(&self) -> Vec<Certificate> {
        self.chain().accepted_issuers()
    }

    /// Add a certificate to the store and rebuild the chain.
    ///
    /// On failure the chain is left as it was.
    pub fn trust(&self, certificate: Certificate) -> Result<Fingerprint> {
        let fingerprint = self.store.lock().ready_mut()?.add(certificate)?;
        self.rebuild();
        Ok(fingerprint)
    }

    /// Remove a certificate from the store. Returns whether it was trusted.
    pub fn untrust(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let removed = self.store.lock().ready_mut()?.remove(fingerprint)?;
        if removed {
            self.rebuild();
        }
        Ok(removed)
    }

    /// Forget every trusted certificate.
    pub fn clear_trusted(&self) -> Result<()> {
        self.store.lock().ready_mut()?.clear()?;
        self.rebuild();
        Ok(())
    }

    /// Discard the stored blob, corrupt or not, and start from an empty store.
    pub fn reset_store(&self) -> Result<()> {
        self.storage
            .remove(&self.storage_key)
            .map_err(|e| TrustError::Persistence(e.to_string()))?;
        *self.store.lock() = StoreState::Ready(CertificateStore::empty(
            self.storage.clone(),
            self.storage_key.clone(),
        ));
        warn!(key = %self.storage_key, "trusted certificate store reset");
        self.rebuild();
        Ok(())
    }

    /// Derive a fresh chain from the current store and swap it in.
    ///
    /// Platform roots are reloaded; if that fails the previous platform
    /// validator is kept.
    pub fn rebuild(&self) {
        let loaded = PlatformValidator::from_source(self.roots.as_ref(), self.provider.clone());
        let platform = match loaded {
            Ok(platform) => Some(Arc::new(platform)),
            Err(e) => {
                warn!(error = %e, "platform trust roots unavailable, keeping previous");
                self.chain.read().platform().cloned()
            }
        };

        let state = self.store.lock();
        let chain = ValidatorChain::build(platform, state.ready(), self.provider.clone());
        *self.chain.write() = Arc::new(chain);
        debug!(status = %state.status(), "validator chain rebuilt");
    }

    #[must_use]
    pub fn store_status(&self) -> StoreStatus {
        self.store.lock().status()
    }

    /// Trusted certificates with the time each was trusted.
    #[must_use]
    pub fn trusted_certificates(&self) -> Vec<TrustedEntry> {
        self.store
            .lock()
            .ready()
            .map(|store| store.entries().cloned().collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for TrustAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let validators = self.chain().len();
        let store = self.store_status();
        f.debug_struct("TrustAuthority")
            .field("validators", &validators)
            .field("store", &store)
            .field("storage_key", &self.storage_key)
            .finish_non_exhaustive()
    }
}

fn parse_chain(
    end_entity: &CertificateDer<'_>,
    intermediates: &[CertificateDer<'_>],
) -> std::result::Result<CertificateChain, rustls::Error> {
    CertificateChain::from_der(end_entity, intermediates.iter().map(|c| &c[..])).map_err(|e| {
        debug!(error = %e, "peer certificate could not be parsed");
        rustls::Error::InvalidCertificate(CertificateError::BadEncoding)
    })
}

impl ServerCertVerifier for TrustAuthority {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let chain = parse_chain(end_entity, intermediates)?;
        self.verify_server(&chain)?;

        let parsed = ParsedCertificate::try_from(end_entity)?;
        verify_server_name(&parsed, server_name).map_err(|e| {
            info!(server = ?server_name, error = %e, "trusted certificate does not cover host");
            rustls::Error::InvalidCertificate(CertificateError::NotValidForName)
        })?;

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// Client certificate verification through a [`TrustAuthority`].
///
/// Issuer hints sent to clients are captured when this is created.
#[derive(Debug, Clone)]
pub struct ClientTrust {
    authority: Arc<TrustAuthority>,
    hints: Vec<DistinguishedName>,
    mandatory: bool,
}

impl ClientTrust {
    /// Require every client to present a trusted certificate.
    #[must_use]
    pub fn new(authority: Arc<TrustAuthority>) -> Self {
        let mut roots = RootCertStore::empty();
        for issuer in authority.accepted_issuers() {
            if let Err(e) = roots.add(CertificateDer::from(issuer.der().to_vec())) {
                debug!(subject = issuer.subject(), error = %e, "issuer left out of client hints");
            }
        }

        Self {
            authority,
            hints: roots.subjects(),
            mandatory: true,
        }
    }

    /// Let clients connect without a certificate.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }
}

impl ClientCertVerifier for ClientTrust {
    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &self.hints
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        let chain = parse_chain(end_entity, intermediates)?;
        self.authority.verify_client(&chain)?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.authority.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.authority.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.authority.supported_verify_schemes()
    }
}
