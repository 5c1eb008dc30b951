#![allow(dead_code)]

use certtrust::validator::StaticRoots;
use certtrust::{RejectionReceiver, TrustAuthority};
use certtrust_core::{Certificate, KeyValueStore, MemoryKeyValueStore};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, ServerConnection};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;

pub fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// A certificate together with the key that signs for it.
pub struct Identity {
    pub certificate: Certificate,
    pub key: PrivateKeyDer<'static>,
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        Self {
            certificate: self.certificate.clone(),
            key: self.key.clone_key(),
        }
    }
}

fn named(name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name);
    dn
}

fn identity(cert: &rcgen::Certificate, key: &KeyPair) -> Identity {
    Identity {
        certificate: Certificate::from_der(cert.der().to_vec()).unwrap(),
        key: PrivateKeyDer::Pkcs8(key.serialize_der().into()),
    }
}

/// Self-signed server identity for `host`.
pub fn self_signed(host: &str) -> Identity {
    self_signed_with(host, false)
}

/// Self-signed server identity for `host` marked `CA:TRUE`, the
/// `openssl req -x509` default.
pub fn self_signed_ca(host: &str) -> Identity {
    self_signed_with(host, true)
}

fn self_signed_with(host: &str, is_ca: bool) -> Identity {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
    params.distinguished_name = named(host);
    if is_ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    }
    let cert = params.self_signed(&key).unwrap();
    identity(&cert, &key)
}

pub struct Ca {
    key: KeyPair,
    cert: rcgen::Certificate,
    pub certificate: Certificate,
}

impl Ca {
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name = named(name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::DigitalSignature];
        let cert = params.self_signed(&key).unwrap();
        let certificate = Certificate::from_der(cert.der().to_vec()).unwrap();
        Self {
            key,
            cert,
            certificate,
        }
    }

    pub fn issue(&self, host: &str) -> Identity {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
        params.distinguished_name = named(host);
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        identity(&cert, &key)
    }
}

pub fn authority(
    storage: Arc<dyn KeyValueStore>,
    roots: Vec<Certificate>,
) -> (Arc<TrustAuthority>, RejectionReceiver) {
    TrustAuthority::builder(storage)
        .roots(Arc::new(StaticRoots::new(roots)))
        .provider(provider())
        .build()
}

pub fn memory() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryKeyValueStore::new())
}

/// Plain TLS server on loopback that completes handshakes for `connections`
/// clients and then exits. Failed handshakes are ignored.
pub fn serve(identity: Identity, connections: usize) -> (SocketAddr, JoinHandle<()>) {
    let config = Arc::new(
        ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(
                vec![CertificateDer::from(identity.certificate.der().to_vec())],
                identity.key,
            )
            .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let Ok(mut stream) = stream else { continue };
            let Ok(mut conn) = ServerConnection::new(config.clone()) else { continue };
            while conn.is_handshaking() {
                if conn.complete_io(&mut stream).is_err() {
                    break;
                }
            }
        }
    });

    (addr, handle)
}

pub fn dial(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).unwrap()
}
