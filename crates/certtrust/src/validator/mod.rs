//! Independent chain validators, one per trust source.

mod anchors;
mod platform;
mod store;

pub use platform::{PlatformValidator, RootSource, StaticRoots, SystemRoots};
pub use store::StoreValidator;

pub(crate) use anchors::AnchorSet;

use certtrust_core::{Certificate, CertificateChain, TrustError};
use std::fmt;

/// A trust source that accepts or rejects certificate chains.
pub trait TrustValidator: Send + Sync + fmt::Debug {
    /// Short name used in logs and rejection reasons.
    fn name(&self) -> &'static str;

    /// Check a chain presented by a server.
    fn verify_server(&self, chain: &CertificateChain, auth_type: &str) -> Result<(), Rejection>;

    /// Check a chain presented by a client.
    fn verify_client(&self, chain: &CertificateChain, auth_type: &str) -> Result<(), Rejection>;

    /// Issuers this validator accepts, advertised for client authentication.
    fn accepted_issuers(&self) -> Vec<Certificate>;
}

/// Why a validator refused a chain.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{validator} trust rejected the chain: {error}")]
pub struct Rejection {
    validator: &'static str,
    #[source]
    error: rustls::Error,
}

impl Rejection {
    pub const fn new(validator: &'static str, error: rustls::Error) -> Self {
        Self { validator, error }
    }

    /// Rejection used when no validator was available to ask.
    #[must_use]
    pub const fn no_validators() -> Self {
        Self::new(
            "composite",
            rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer),
        )
    }

    /// Name of the rejecting validator.
    #[must_use]
    pub const fn validator(&self) -> &'static str {
        self.validator
    }

    /// Underlying TLS error.
    #[must_use]
    pub const fn error(&self) -> &rustls::Error {
        &self.error
    }
}

impl From<Rejection> for rustls::Error {
    fn from(rejection: Rejection) -> Self {
        rejection.error
    }
}

impl From<Rejection> for TrustError {
    fn from(rejection: Rejection) -> Self {
        Self::ValidationRejected(rejection.to_string())
    }
}
