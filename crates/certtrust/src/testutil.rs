use certtrust_core::Certificate;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::crypto::CryptoProvider;
use std::sync::Arc;

pub fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Self-signed end-entity certificate valid for `host`.
pub fn self_signed(host: &str) -> Certificate {
    self_signed_with(host, |_| {})
}

/// Self-signed certificate for `host` carrying `basicConstraints CA:TRUE`,
/// as `openssl req -x509` produces.
pub fn self_signed_ca(host: &str) -> Certificate {
    self_signed_with(host, |params| {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    })
}

/// Self-signed certificate for `host` that expired on 2016-01-01.
pub fn expired_self_signed(host: &str) -> Certificate {
    self_signed_with(host, |params| {
        params.not_before = rcgen::date_time_ymd(2014, 1, 1);
        params.not_after = rcgen::date_time_ymd(2016, 1, 1);
    })
}

fn self_signed_with(host: &str, customize: impl FnOnce(&mut CertificateParams)) -> Certificate {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
    params.distinguished_name = common_name(host);
    customize(&mut params);
    let cert = params.self_signed(&key).unwrap();
    Certificate::from_der(cert.der().to_vec()).unwrap()
}

/// A throwaway certificate authority.
pub struct TestCa {
    key: KeyPair,
    cert: rcgen::Certificate,
    pub certificate: Certificate,
}

impl TestCa {
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name = common_name(name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let cert = params.self_signed(&key).unwrap();
        let certificate = Certificate::from_der(cert.der().to_vec()).unwrap();
        Self {
            key,
            cert,
            certificate,
        }
    }

    /// Leaf for `host` signed by this CA.
    pub fn issue(&self, host: &str) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
        params.distinguished_name = common_name(host);
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }
}

fn common_name(name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name);
    dn
}
