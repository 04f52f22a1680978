//! TLS setup for both ends of the link.
//!
//! The relay presents a PEM certificate chain and key. The client either
//! verifies the relay against a CA bundle and a server name, or runs with
//! verification disabled (`--insecure`), which the caller must make visible
//! to the user.

use anyhow::{Context, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::io::{self, BufReader};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{TlsAcceptor, TlsConnector};

/// How the client decides whether to trust the relay.
#[derive(Debug, Clone)]
pub enum ClientTrust {
    Verified {
        ca_path: PathBuf,
        /// Name checked against the certificate; defaults to the dialed host.
        server_name: Option<String>,
    },
    Insecure,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("cannot load CA bundle {}: {reason}", path.display())]
    CaBundle { path: PathBuf, reason: String },
    #[error("invalid TLS server name {0:?}")]
    ServerName(String),
    #[error("cannot reach {addr}: {source}")]
    Tcp {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("certificate verification failed for {server_name}: {reason}")]
    Verification {
        server_name: String,
        by_ip: bool,
        name_mismatch: bool,
        reason: String,
    },
    #[error("TLS negotiation with {server_name} failed: {source}")]
    Handshake {
        server_name: String,
        #[source]
        source: io::Error,
    },
}

impl ConnectError {
    /// Extra guidance printed under the error line.
    pub fn hint(&self) -> Option<String> {
        match self {
            ConnectError::Verification {
                server_name,
                by_ip: true,
                name_mismatch: true,
                ..
            } => Some(format!(
                "The server was addressed by IP ({server_name}) and its certificate has no \
                 matching IP SAN. Reissue the certificate with that IP, or connect with \
                 --server-name set to a DNS name the certificate carries."
            )),
            ConnectError::Verification {
                server_name,
                name_mismatch: true,
                ..
            } => Some(format!(
                "The certificate's subject alternative names do not include {server_name}. \
                 Use --server-name to check against a name the certificate carries."
            )),
            ConnectError::Verification { .. } => Some(
                "Check that --ca points to the CA that issued the server certificate.".into(),
            ),
            _ => None,
        }
    }
}

pub fn build_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    let cert_pem = std::fs::read(cert_path)
        .with_context(|| format!("Failed to read TLS cert: {}", cert_path.display()))?;
    let key_pem = std::fs::read(key_path)
        .with_context(|| format!("Failed to read TLS key: {}", key_path.display()))?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse TLS certificates")?;
    if certs.is_empty() {
        anyhow::bail!("No certificates found in {}", cert_path.display());
    }
    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .context("Failed to parse TLS private key")?
        .context("No private key found in PEM file")?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Invalid TLS configuration")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

pub fn build_connector(trust: &ClientTrust) -> Result<TlsConnector, ConnectError> {
    let config = match trust {
        ClientTrust::Verified { ca_path, .. } => {
            let roots = load_roots(ca_path)?;
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        }
        ClientTrust::Insecure => rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert::new()))
            .with_no_client_auth(),
    };
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Dial `host:port` and complete the TLS handshake.
pub async fn connect(
    host: &str,
    port: u16,
    trust: &ClientTrust,
) -> Result<TlsStream<TcpStream>, ConnectError> {
    let connector = build_connector(trust)?;
    let name = match trust {
        ClientTrust::Verified {
            server_name: Some(name),
            ..
        } => name.clone(),
        _ => host.to_string(),
    };
    let server_name = ServerName::try_from(name.clone())
        .map_err(|_| ConnectError::ServerName(name.clone()))?;

    let addr = format!("{host}:{port}");
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|source| ConnectError::Tcp {
            addr: addr.clone(),
            source,
        })?;
    tracing::debug!(%addr, server_name = %name, "tcp connected, starting handshake");

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| classify_handshake_error(&name, e))
}

fn load_roots(path: &Path) -> Result<RootCertStore, ConnectError> {
    let ca_err = |reason: String| ConnectError::CaBundle {
        path: path.to_path_buf(),
        reason,
    };
    let file = std::fs::File::open(path).map_err(|e| ca_err(e.to_string()))?;
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
        let cert = cert.map_err(|e| ca_err(e.to_string()))?;
        roots.add(cert).map_err(|e| ca_err(e.to_string()))?;
    }
    if roots.is_empty() {
        return Err(ca_err("no certificates found".into()));
    }
    Ok(roots)
}

fn classify_handshake_error(server_name: &str, err: io::Error) -> ConnectError {
    let tls_err = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>());
    match tls_err {
        Some(rustls::Error::InvalidCertificate(cert_err)) => ConnectError::Verification {
            server_name: server_name.to_string(),
            by_ip: server_name.parse::<IpAddr>().is_ok(),
            name_mismatch: is_name_mismatch(cert_err),
            reason: format!("{cert_err:?}"),
        },
        _ => ConnectError::Handshake {
            server_name: server_name.to_string(),
            source: err,
        },
    }
}

fn is_name_mismatch(err: &CertificateError) -> bool {
    // Newer rustls releases report the mismatch with a context-carrying variant.
    matches!(err, CertificateError::NotValidForName)
        || format!("{err:?}").starts_with("NotValidForName")
}

/// Verifier used by `--insecure`: any certificate is accepted, but handshake
/// signatures are still checked so the session keys are bound to the
/// presented certificate.
#[derive(Debug)]
struct AcceptAnyCert {
    provider: Arc<CryptoProvider>,
}

impl AcceptAnyCert {
    fn new() -> Self {
        let provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));
        Self { provider }
    }
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
