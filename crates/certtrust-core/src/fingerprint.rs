//! SHA-256 certificate fingerprints via `ring::digest`.

use ring::digest::SHA256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrustError;

/// Hex length of a SHA-256 digest.
const FINGERPRINT_HEX_LEN: usize = 64;

/// Stable identifier of a certificate: SHA-256 of its full DER encoding.
///
/// Used as the key of the trusted certificate store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw DER bytes.
    #[must_use]
    pub fn of(der: &[u8]) -> Self {
        Self(sha256_bytes(der))
    }

    /// Lowercase hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex chars, for log lines and tables.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..16]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != ':')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if normalized.len() != FINGERPRINT_HEX_LEN
            || !normalized.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(TrustError::Config(format!(
                "invalid fingerprint '{s}': expected {FINGERPRINT_HEX_LEN} hex characters"
            )));
        }

        Ok(Self(normalized))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = TrustError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// Compute SHA-256 of raw bytes (for certificate DER data).
#[must_use]
pub fn sha256_bytes(data: &[u8]) -> String {
    let digest = ring::digest::digest(&SHA256, data);
    hex::encode(digest.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_bytes() {
        let hash = sha256_bytes(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn fingerprint_is_content_hash() {
        let a = Fingerprint::of(b"certificate one");
        let b = Fingerprint::of(b"certificate two");
        assert_ne!(a, b);
        assert_eq!(a, Fingerprint::of(b"certificate one"));
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 16);
    }

    #[test]
    fn parses_colon_separated_uppercase() {
        let fp = Fingerprint::of(b"hello world");
        let colons: Vec<String> = fp
            .as_str()
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).to_uppercase())
            .collect();

        let parsed: Fingerprint = colons.join(":").parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("abcd".parse::<Fingerprint>().is_err());
        assert!("zz".repeat(32).parse::<Fingerprint>().is_err());
    }
}
