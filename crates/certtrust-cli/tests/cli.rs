use assert_cmd::Command;
use predicates::prelude::*;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("trust.json");
        std::fs::write(
            dir.path().join("config.toml"),
            format!(
                "storage_path = {:?}\nca_paths = []\n",
                store.to_string_lossy()
            ),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("certcheck").unwrap();
        cmd.env_remove("RUST_LOG")
            .env_remove("HTTPS_PROXY")
            .env_remove("https_proxy")
            .env_remove("ALL_PROXY")
            .env_remove("all_proxy")
            .arg("--no-color")
            .arg("--config")
            .arg(self.path("config.toml"));
        cmd
    }
}

fn write_certificate(path: &Path, host: &str) -> String {
    let key = rcgen::KeyPair::generate().unwrap();
    let cert = rcgen::CertificateParams::new(vec![host.to_string()])
        .unwrap()
        .self_signed(&key)
        .unwrap();
    std::fs::write(path, cert.pem()).unwrap();
    certtrust_core::Certificate::from_der(cert.der().to_vec())
        .unwrap()
        .fingerprint()
        .to_string()
}

/// Loopback HTTPS server with a self-signed certificate for `localhost`.
/// Every request gets `204 No Content`; failed handshakes are ignored.
fn serve_https() -> SocketAddr {
    let key = rcgen::KeyPair::generate().unwrap();
    let cert = rcgen::CertificateParams::new(vec!["localhost".to_string()])
        .unwrap()
        .self_signed(&key)
        .unwrap();
    let config = Arc::new(
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(
                vec![CertificateDer::from(cert.der().to_vec())],
                PrivateKeyDer::Pkcs8(key.serialize_der().into()),
            )
            .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let Ok(conn) = ServerConnection::new(config.clone()) else { continue };
            let mut tls = StreamOwned::new(conn, stream);

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match tls.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            if request.is_empty() {
                continue;
            }

            let _ = tls.write_all(
                b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
            tls.conn.send_close_notify();
            let _ = tls.flush();
        }
    });
    addr
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("certcheck")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("trust"));
}

#[test]
fn trust_add_list_remove() {
    let sandbox = Sandbox::new();
    let pem = sandbox.path("nas.pem");
    let fingerprint = write_certificate(&pem, "nas.lan");

    sandbox
        .cmd()
        .args(["trust", "add"])
        .arg(&pem)
        .assert()
        .success()
        .stdout(predicate::str::contains("trusted"));

    sandbox
        .cmd()
        .args(["-o", "json", "trust", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(fingerprint.as_str()))
        .stdout(predicate::str::contains("nas.lan"));

    sandbox
        .cmd()
        .args(["trust", "remove", &fingerprint])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["trust", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No trusted certificates."));

    sandbox
        .cmd()
        .args(["trust", "remove", &fingerprint])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not trusted"));
}

#[test]
fn reset_recovers_a_corrupt_store() {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.path("trust.json"),
        r#"{"TRUSTED_CERTIFICATES": "!!garbage!!"}"#,
    )
    .unwrap();

    sandbox
        .cmd()
        .args(["trust", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unreadable"));

    let pem = sandbox.path("cam.pem");
    write_certificate(&pem, "cam.lan");
    sandbox
        .cmd()
        .args(["trust", "add"])
        .arg(&pem)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unavailable"));

    sandbox
        .cmd()
        .args(["trust", "reset", "--force"])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["trust", "add"])
        .arg(&pem)
        .assert()
        .success();
}

#[test]
fn check_refuses_plain_http() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["check", "http://example.com/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("https://"));
}

#[test]
fn config_path_prints_the_override() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn check_trusts_on_first_use_and_reuses_the_stored_certificate() {
    let sandbox = Sandbox::new();
    let addr = serve_https();
    let url = format!("https://localhost:{}/", addr.port());

    sandbox
        .cmd()
        .args(["-o", "json", "check", &url, "--yes", "--retry"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""attempts": 2"#))
        .stdout(predicate::str::contains(r#""status": 204"#))
        .stdout(predicate::str::contains("certificate_trusted"));

    sandbox
        .cmd()
        .args(["-o", "json", "check", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""attempts": 1"#))
        .stdout(predicate::str::contains(r#""status": 204"#));

    sandbox
        .cmd()
        .args(["-o", "json", "trust", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("localhost"));
}

#[test]
fn check_names_certificate_failures() {
    let sandbox = Sandbox::new();
    let addr = serve_https();

    sandbox
        .cmd()
        .args(["check", &format!("https://localhost:{}/", addr.port()), "--no-prompt"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Certificate not trusted"))
        .stderr(predicate::str::contains("Certificate not trusted"));

    sandbox
        .cmd()
        .args(["check", &format!("https://localhost:{}/", addr.port()), "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("certificate trusted; run the check again"));

    sandbox
        .cmd()
        .args(["check", &format!("https://127.0.0.1:{}/", addr.port()), "--no-prompt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Hostname not verified"));
}
