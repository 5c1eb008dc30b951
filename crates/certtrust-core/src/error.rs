use thiserror::Error;

/// Result type alias for certtrust operations
pub type Result<T> = std::result::Result<T, TrustError>;

/// Errors that can occur while deciding, storing or applying certificate trust
#[derive(Error, Debug)]
pub enum TrustError {
    /// Stored trust data exists but cannot be decoded
    #[error("trusted certificate store is corrupt: {0}")]
    StoreCorrupt(String),

    /// The platform trust-root source could not be initialized
    #[error("platform trust roots unavailable: {0}")]
    TrustInit(String),

    /// No trust source accepted the presented chain
    #[error("certificate chain rejected: {0}")]
    ValidationRejected(String),

    /// The chain is trusted but does not cover the requested host
    #[error("hostname not verified: {0}")]
    HostnameMismatch(String),

    /// Writing the trusted certificate store to durable storage failed
    #[error("could not persist trusted certificates: {0}")]
    Persistence(String),

    /// A certificate extension needed for the trust prompt is malformed
    #[error("could not summarize certificate: {0}")]
    SummaryExtraction(String),

    /// The TLS or crypto subsystem could not be initialized
    #[error("secure transport unavailable: {0}")]
    TlsInit(String),

    /// Bytes could not be decoded as an X.509 certificate
    #[error("invalid certificate: {0}")]
    CertificateParse(String),

    /// The trusted store failed to load and cannot accept new entries
    #[error("trusting custom certificates is currently unavailable")]
    StoreUnavailable,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrustError {
    /// Returns true if the error concerns the durable trust store
    #[must_use]
    pub const fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::StoreCorrupt(_) | Self::Persistence(_) | Self::StoreUnavailable
        )
    }

    /// Returns true if the presentation layer should tell the user about it.
    ///
    /// Everything else is logged and degrades silently.
    #[must_use]
    pub const fn requires_user_notice(&self) -> bool {
        matches!(
            self,
            Self::StoreCorrupt(_)
                | Self::Persistence(_)
                | Self::StoreUnavailable
                | Self::TlsInit(_)
                | Self::ValidationRejected(_)
                | Self::HostnameMismatch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_classified() {
        assert!(TrustError::StoreCorrupt("bad base64".into()).is_storage_error());
        assert!(TrustError::Persistence("disk full".into()).is_storage_error());
        assert!(TrustError::StoreUnavailable.is_storage_error());
        assert!(!TrustError::TrustInit("no roots".into()).is_storage_error());
    }

    #[test]
    fn summary_failures_stay_silent() {
        assert!(!TrustError::SummaryExtraction("bad SAN".into()).requires_user_notice());
        assert!(!TrustError::TrustInit("no roots".into()).requires_user_notice());
        assert!(TrustError::Persistence("disk full".into()).requires_user_notice());
    }
}
