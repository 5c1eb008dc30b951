//! TLS configuration wired to the trust authority.

use certtrust_core::{Certificate, Result, TrustError};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{CertificateError, ClientConfig, ClientConnection, ServerConfig, StreamOwned};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use tracing::{debug, info};

use crate::authority::{ClientTrust, TrustAuthority};

/// Hands out TLS configuration whose only certificate verifier is the
/// [`TrustAuthority`].
#[derive(Debug, Clone)]
pub struct SecureTransportFactory {
    authority: Arc<TrustAuthority>,
}

impl SecureTransportFactory {
    #[must_use]
    pub const fn new(authority: Arc<TrustAuthority>) -> Self {
        Self { authority }
    }

    /// Build the client configuration.
    ///
    /// Fails with `TlsInit` when the crypto provider supports no safe
    /// protocol version. There is no plaintext fallback.
    pub fn socket_factory(&self) -> Result<TransportFactory> {
        let provider = self.authority.crypto_provider().clone();
        let client = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| TrustError::TlsInit(format!("client config error: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(self.authority.clone())
            .with_no_client_auth();

        debug!("TLS client configuration ready");
        Ok(TransportFactory {
            authority: self.authority.clone(),
            client: Arc::new(client),
        })
    }
}

/// Source of TLS connections and configurations.
#[derive(Debug, Clone)]
pub struct TransportFactory {
    authority: Arc<TrustAuthority>,
    client: Arc<ClientConfig>,
}

impl TransportFactory {
    #[must_use]
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client.clone()
    }

    /// Run a TLS handshake for `host` over an established socket.
    ///
    /// The handshake completes before this returns, so certificate problems
    /// surface here as `ValidationRejected` or `HostnameMismatch`.
    pub fn connect<S: Read + Write>(
        &self,
        host: &str,
        mut socket: S,
    ) -> Result<StreamOwned<ClientConnection, S>> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| TrustError::Config(format!("invalid host name {host}: {e}")))?;
        let mut conn = ClientConnection::new(self.client.clone(), server_name)
            .map_err(|e| TrustError::TlsInit(e.to_string()))?;

        while conn.is_handshaking() {
            conn.complete_io(&mut socket).map_err(classify)?;
        }

        info!(host, protocol = ?conn.protocol_version(), "TLS session established");
        Ok(StreamOwned::new(conn, socket))
    }

    /// Open a TCP connection and run the TLS handshake over it.
    pub fn open(&self, host: &str, port: u16) -> Result<StreamOwned<ClientConnection, TcpStream>> {
        let socket = TcpStream::connect((host, port))?;
        self.connect(host, socket)
    }

    /// An HTTP client that verifies servers through the trust authority.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .use_preconfigured_tls((*self.client).clone())
            .build()
            .map_err(|e| TrustError::TlsInit(format!("HTTP client error: {e}")))
    }

    /// Server configuration that authenticates clients through the trust
    /// authority.
    pub fn server_config(
        &self,
        certificates: &[Certificate],
        key: PrivateKeyDer<'static>,
    ) -> Result<Arc<ServerConfig>> {
        let chain = certificates
            .iter()
            .map(|cert| CertificateDer::from(cert.der().to_vec()))
            .collect();

        let config = ServerConfig::builder_with_provider(self.authority.crypto_provider().clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| TrustError::TlsInit(format!("server config error: {e}")))?
            .with_client_cert_verifier(Arc::new(ClientTrust::new(self.authority.clone())))
            .with_single_cert(chain, key)
            .map_err(|e| TrustError::TlsInit(format!("server config error: {e}")))?;

        Ok(Arc::new(config))
    }
}

/// The certificate problem behind a failed TLS connection, if there was one.
///
/// Walks the source chain, so errors wrapped by an HTTP client resolve the
/// same way as a handshake `io::Error`. `None` for failures unrelated to
/// certificate trust.
pub fn certificate_failure(err: &(dyn std::error::Error + 'static)) -> Option<TrustError> {
    let mut current = Some(err);
    while let Some(e) = current {
        match as_tls_error(e) {
            Some(rustls::Error::InvalidCertificate(CertificateError::NotValidForName)) => {
                return Some(TrustError::HostnameMismatch(
                    CertificateError::NotValidForName.to_string(),
                ));
            }
            Some(tls @ rustls::Error::InvalidCertificate(_)) => {
                return Some(TrustError::ValidationRejected(tls.to_string()));
            }
            _ => current = e.source(),
        }
    }
    None
}

// io::Error::source skips the wrapped error itself, so look inside explicitly.
fn as_tls_error<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a rustls::Error> {
    err.downcast_ref::<rustls::Error>().or_else(|| {
        err.downcast_ref::<io::Error>()
            .and_then(io::Error::get_ref)
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    })
}

/// Map a handshake failure onto the trust error it represents.
fn classify(err: io::Error) -> TrustError {
    certificate_failure(&err).unwrap_or(TrustError::Io(err))
}
