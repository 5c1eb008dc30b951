//! Composite TLS certificate validation with trust-on-first-use prompts.
//!
//! A [`TrustAuthority`] checks every server chain against the platform CA
//! roots and then against certificates the user has explicitly trusted. When
//! neither accepts, the leaf is handed to the [`TrustDecisionCoordinator`],
//! which asks a [`TrustPrompt`] and remembers a "yes" so the next connection
//! succeeds.
//!
//! ```no_run
//! use certtrust::{SecureTransportFactory, TrustAuthority, TrustDecisionCoordinator};
//! use certtrust_core::FileKeyValueStore;
//! use std::sync::Arc;
//!
//! # async fn demo() -> certtrust::Result<()> {
//! let storage = Arc::new(FileKeyValueStore::new("trust.json"));
//! let (authority, rejections) = TrustAuthority::builder(storage).build();
//!
//! let coordinator = Arc::new(TrustDecisionCoordinator::new(
//!     authority.clone(),
//!     |summary: certtrust_core::CertificateSummary, responder: certtrust::DecisionResponder| {
//!         println!("untrusted certificate for {}", summary.subject);
//!         responder.reject();
//!     },
//! ));
//! tokio::spawn(async move { coordinator.run(rejections).await });
//!
//! let transport = SecureTransportFactory::new(authority).socket_factory()?;
//! let http = transport.http_client()?;
//! # let _ = http;
//! # Ok(())
//! # }
//! ```

mod authority;
mod chain;
mod coordinator;
mod transport;
pub mod validator;

#[cfg(test)]
mod testutil;

pub use authority::{ClientTrust, RejectionReceiver, TrustAuthority, TrustAuthorityBuilder};
pub use chain::ValidatorChain;
pub use coordinator::{
    DecisionResponder, PendingDecision, TrustDecisionCoordinator, TrustEvent, TrustPrompt,
};
pub use transport::{certificate_failure, SecureTransportFactory, TransportFactory};
pub use validator::{PlatformValidator, Rejection, StoreValidator, TrustValidator};

pub use certtrust_core::{Result, StoreStatus, TrustDecision, TrustError};
