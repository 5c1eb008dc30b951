//! X.509 certificate values and peer-presented chains.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::public_key::PublicKey;

use crate::error::{Result, TrustError};
use crate::fingerprint::Fingerprint;

/// Public key family of a certificate, used as the authentication-type label
/// handed to validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSA keys
    Rsa,
    /// Elliptic-curve keys (ECDSA)
    Ec,
    /// DSA keys
    Dsa,
    /// Anything else (Ed25519, GOST, ...)
    Unknown,
}

impl KeyAlgorithm {
    /// Label in the form TLS stacks conventionally use for `auth_type`.
    #[must_use]
    pub const fn auth_type(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ec => "EC",
            Self::Dsa => "DSA",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.auth_type())
    }
}

/// A subject alternative name the trust prompt can show.
///
/// Only DNS names (`GeneralName` type 2) and IP addresses (type 7) are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AltName {
    /// dNSName entry
    Dns(String),
    /// iPAddress entry
    Ip(IpAddr),
}

impl fmt::Display for AltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dns(name) => f.write_str(name),
            Self::Ip(ip) => write!(f, "{ip}"),
        }
    }
}

/// An immutable, parsed X.509 certificate.
///
/// Cheap to clone; the DER bytes are shared. Equality is by DER encoding.
#[derive(Clone)]
pub struct Certificate {
    der: Arc<[u8]>,
    fingerprint: Fingerprint,
    issuer: String,
    subject: String,
    signature: Vec<u8>,
    key_algorithm: KeyAlgorithm,
}

impl Certificate {
    /// Parse a single DER-encoded X.509 certificate.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der: Vec<u8> = der.into();
        let (rest, cert) = X509Certificate::from_der(&der)
            .map_err(|e| TrustError::CertificateParse(e.to_string()))?;
        if !rest.is_empty() {
            return Err(TrustError::CertificateParse(format!(
                "{} trailing bytes after certificate",
                rest.len()
            )));
        }

        let issuer = cert.issuer().to_string();
        let subject = cert.subject().to_string();
        let signature = cert.signature_value.data.to_vec();
        let key_algorithm = match cert.public_key().parsed() {
            Ok(PublicKey::RSA(_)) => KeyAlgorithm::Rsa,
            Ok(PublicKey::EC(_)) => KeyAlgorithm::Ec,
            Ok(PublicKey::DSA(_)) => KeyAlgorithm::Dsa,
            _ => KeyAlgorithm::Unknown,
        };

        Ok(Self {
            fingerprint: Fingerprint::of(&der),
            der: der.into(),
            issuer,
            subject,
            signature,
            key_algorithm,
        })
    }

    /// Parse every `CERTIFICATE` block of a PEM document.
    pub fn from_pem(pem_bytes: &[u8]) -> Result<Vec<Self>> {
        let blocks =
            pem::parse_many(pem_bytes).map_err(|e| TrustError::CertificateParse(e.to_string()))?;

        blocks
            .into_iter()
            .filter(|block| block.tag() == "CERTIFICATE")
            .map(|block| Self::from_der(block.into_contents()))
            .collect()
    }

    /// DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// PEM encoding.
    #[must_use]
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.der.to_vec()))
    }

    /// SHA-256 of the DER encoding.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Issuer distinguished name (human-readable)
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Subject distinguished name (human-readable)
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Raw signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    #[must_use]
    pub const fn key_algorithm(&self) -> KeyAlgorithm {
        self.key_algorithm
    }

    /// Whether issuer and subject are the same name.
    #[must_use]
    pub fn is_self_issued(&self) -> bool {
        self.issuer == self.subject
    }

    /// DNS and IP subject alternative names, in certificate order.
    ///
    /// Other SAN kinds are skipped. A certificate without the extension
    /// yields an empty list.
    pub fn alt_names(&self) -> Result<Vec<AltName>> {
        let (_, cert) = X509Certificate::from_der(&self.der)
            .map_err(|e| TrustError::SummaryExtraction(e.to_string()))?;
        let san = cert
            .subject_alternative_name()
            .map_err(|e| TrustError::SummaryExtraction(e.to_string()))?;

        let Some(san) = san else {
            return Ok(Vec::new());
        };

        san.value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(Ok(AltName::Dns((*dns).to_string()))),
                GeneralName::IPAddress(bytes) => Some(ip_from_bytes(bytes).map(AltName::Ip)),
                _ => None,
            })
            .collect()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl std::hash::Hash for Certificate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.der.hash(state);
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("fingerprint", &self.fingerprint.short())
            .finish_non_exhaustive()
    }
}

fn ip_from_bytes(bytes: &[u8]) -> Result<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes
                .try_into()
                .map_err(|_| TrustError::SummaryExtraction("bad IPv4 SAN".into()))?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes
                .try_into()
                .map_err(|_| TrustError::SummaryExtraction("bad IPv6 SAN".into()))?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        n => Err(TrustError::SummaryExtraction(format!(
            "IP address SAN has {n} bytes"
        ))),
    }
}

/// Certificates presented by a peer during one handshake, leaf first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
}

impl CertificateChain {
    /// Build a chain. Fails on an empty list: every handshake presents a leaf.
    pub fn new(certificates: Vec<Certificate>) -> Result<Self> {
        if certificates.is_empty() {
            return Err(TrustError::CertificateParse(
                "peer presented no certificates".into(),
            ));
        }
        Ok(Self { certificates })
    }

    /// Parse a leaf and its intermediates from DER.
    pub fn from_der<'a>(
        leaf: &[u8],
        intermediates: impl IntoIterator<Item = &'a [u8]>,
    ) -> Result<Self> {
        let mut certificates = vec![Certificate::from_der(leaf)?];
        for der in intermediates {
            certificates.push(Certificate::from_der(der)?);
        }
        Self::new(certificates)
    }

    /// The peer's own certificate.
    #[must_use]
    pub fn leaf(&self) -> &Certificate {
        &self.certificates[0]
    }

    /// Everything after the leaf.
    #[must_use]
    pub fn intermediates(&self) -> &[Certificate] {
        &self.certificates[1..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Certificate> {
        self.certificates.iter()
    }
}

impl From<Certificate> for CertificateChain {
    fn from(leaf: Certificate) -> Self {
        Self {
            certificates: vec![leaf],
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::Certificate;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};

    /// Self-signed certificate with the given common name and SANs.
    pub fn self_signed(common_name: &str, sans: Vec<SanType>) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;
        params.subject_alt_names = sans;
        let cert = params.self_signed(&key).unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }

    pub fn dns(name: &str) -> SanType {
        SanType::DnsName(name.try_into().unwrap())
    }
}
