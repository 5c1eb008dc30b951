//! Ordered composition of trust validators.

use certtrust_core::{Certificate, CertificateChain, CertificateStore};
use rustls::crypto::CryptoProvider;
use std::sync::Arc;
use tracing::debug;

use crate::validator::{PlatformValidator, Rejection, StoreValidator, TrustValidator};

/// Validators consulted in order; the first to accept wins.
#[derive(Debug, Clone, Default)]
pub struct ValidatorChain {
    validators: Vec<Arc<dyn TrustValidator>>,
    platform: Option<Arc<PlatformValidator>>,
}

impl ValidatorChain {
    /// A chain over an explicit validator list.
    #[must_use]
    pub fn new(validators: Vec<Arc<dyn TrustValidator>>) -> Self {
        Self {
            validators,
            platform: None,
        }
    }

    /// Platform trust first, then the store when one is usable.
    ///
    /// Depends only on its inputs; the caller swaps the result in.
    #[must_use]
    pub fn build(
        platform: Option<Arc<PlatformValidator>>,
        store: Option<&CertificateStore>,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        let mut validators: Vec<Arc<dyn TrustValidator>> = Vec::with_capacity(2);

        if let Some(platform) = &platform {
            validators.push(platform.clone());
        }
        if let Some(store) = store {
            validators.push(Arc::new(StoreValidator::from_store(store, provider)));
        }

        debug!(validators = validators.len(), "built validator chain");
        Self {
            validators,
            platform,
        }
    }

    /// Accept a server chain if any validator does.
    ///
    /// When all reject, the last rejection is returned.
    pub fn verify_server(
        &self,
        chain: &CertificateChain,
        auth_type: &str,
    ) -> Result<(), Rejection> {
        self.first_accept(|v| v.verify_server(chain, auth_type))
    }

    /// Accept a client chain if any validator does.
    pub fn verify_client(
        &self,
        chain: &CertificateChain,
        auth_type: &str,
    ) -> Result<(), Rejection> {
        self.first_accept(|v| v.verify_client(chain, auth_type))
    }

    fn first_accept(
        &self,
        mut check: impl FnMut(&dyn TrustValidator) -> Result<(), Rejection>,
    ) -> Result<(), Rejection> {
        let mut last = Rejection::no_validators();
        for validator in &self.validators {
            match check(validator.as_ref()) {
                Ok(()) => {
                    debug!(validator = validator.name(), "chain accepted");
                    return Ok(());
                }
                Err(rejection) => {
                    debug!(
                        validator = validator.name(),
                        reason = %rejection.error(),
                        "chain rejected"
                    );
                    last = rejection;
                }
            }
        }
        Err(last)
    }

    /// Every validator's accepted issuers, in validator order.
    #[must_use]
    pub fn accepted_issuers(&self) -> Vec<Certificate> {
        self.validators
            .iter()
            .flat_map(|v| v.accepted_issuers())
            .collect()
    }

    /// The platform validator this chain was built with, if any.
    #[must_use]
    pub fn platform(&self) -> Option<&Arc<PlatformValidator>> {
        self.platform.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
