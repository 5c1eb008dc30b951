//! Human-readable certificate summary shown by the trust prompt.

use serde::{Deserialize, Serialize};

use crate::certificate::Certificate;
use crate::error::Result;

/// What the prompt collaborator shows the user about an untrusted certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSummary {
    /// Issuer display name
    pub issuer: String,
    /// Subject display name
    pub subject: String,
    /// DNS and IP alternative names, one per line, no blank edges
    pub alt_names: String,
}

impl CertificateSummary {
    /// Summarize a certificate.
    ///
    /// Fails with `SummaryExtraction` when the SAN extension is malformed.
    pub fn from_certificate(certificate: &Certificate) -> Result<Self> {
        let alt_names = certificate
            .alt_names()?
            .iter()
            .map(ToString::to_string)
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Self {
            issuer: certificate.issuer().to_string(),
            subject: certificate.subject().to_string(),
            alt_names,
        })
    }

    /// Alternative names as a list.
    pub fn alt_name_lines(&self) -> impl Iterator<Item = &str> {
        self.alt_names.lines()
    }
}
