use crate::error::{FedError, Result};
use crate::types::ALPN;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Client keep-alive. Rounds can park a call for longer than the QUIC idle
/// timeout, so the client keeps the connection warm while it waits.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Parse every certificate in a PEM bundle.
pub fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| FedError::Tls(format!("parse certificate: {e}")))?;
    if certs.is_empty() {
        return Err(FedError::Tls("no certificate found in PEM data".into()));
    }
    Ok(certs)
}

/// Parse the first private key in a PEM document (PKCS#8, PKCS#1 or SEC1).
pub fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| FedError::Tls(format!("parse private key: {e}")))
}

/// Read a PEM certificate bundle from disk.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let pem = std::fs::read(path)?;
    parse_certs(&pem).map_err(|e| with_path(e, path))
}

/// Read a PEM private key from disk.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let pem = std::fs::read(path)?;
    parse_private_key(&pem).map_err(|e| with_path(e, path))
}

fn with_path(err: FedError, path: &Path) -> FedError {
    match err {
        FedError::Tls(msg) => FedError::Tls(format!("{}: {msg}", path.display())),
        other => other,
    }
}

fn root_store(roots: &[CertificateDer<'static>]) -> Result<Arc<rustls::RootCertStore>> {
    let mut store = rustls::RootCertStore::empty();
    for cert in roots {
        store
            .add(cert.clone())
            .map_err(|e| FedError::Tls(format!("add trust anchor: {e}")))?;
    }
    Ok(Arc::new(store))
}

/// Build a QUIC server config that requires client certificates chaining to
/// `client_roots`.
pub fn make_server_config_mtls(
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    client_roots: &[CertificateDer<'static>],
) -> Result<quinn::ServerConfig> {
    let provider = provider();
    let verifier = rustls::server::WebPkiClientVerifier::builder_with_provider(
        root_store(client_roots)?,
        provider.clone(),
    )
    .build()
    .map_err(|e| FedError::Tls(e.to_string()))?;

    let mut tls_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| FedError::Tls(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, key)
        .map_err(|e| FedError::Tls(e.to_string()))?;

    tls_config.alpn_protocols = vec![ALPN.to_vec()];

    let quic_config = quinn::crypto::rustls::QuicServerConfig::try_from(Arc::new(tls_config))
        .map_err(|e| FedError::Tls(e.to_string()))?;

    Ok(quinn::ServerConfig::with_crypto(Arc::new(quic_config)))
}

/// Build a QUIC client config that trusts `server_roots` and presents
/// `cert_chain` for client authentication.
pub fn make_client_config_mtls(
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    server_roots: &[CertificateDer<'static>],
) -> Result<quinn::ClientConfig> {
    let mut tls_config = rustls::ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| FedError::Tls(e.to_string()))?
        .with_root_certificates(root_store(server_roots)?)
        .with_client_auth_cert(cert_chain, key)
        .map_err(|e| FedError::Tls(e.to_string()))?;

    tls_config.alpn_protocols = vec![ALPN.to_vec()];

    let quic_config = quinn::crypto::rustls::QuicClientConfig::try_from(Arc::new(tls_config))
        .map_err(|e| FedError::Tls(e.to_string()))?;

    let mut transport = quinn::TransportConfig::default();
    transport.keep_alive_interval(Some(KEEP_ALIVE_INTERVAL));

    let mut config = quinn::ClientConfig::new(Arc::new(quic_config));
    config.transport_config(Arc::new(transport));
    Ok(config)
}

/// Ephemeral certificate authority for tests and local development.
///
/// Issues leaf certificates usable for both server and client auth, so one
/// CA can back both sides of a mutual TLS deployment.
pub struct DevCa {
    cert: rcgen::Certificate,
    key: rcgen::KeyPair,
}

impl DevCa {
    /// Generate a fresh self-signed CA.
    pub fn generate() -> Result<Self> {
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new())
            .map_err(|e| FedError::Tls(e.to_string()))?;
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "fedcoll dev CA");
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.key_usages = vec![
            rcgen::KeyUsagePurpose::KeyCertSign,
            rcgen::KeyUsagePurpose::CrlSign,
            rcgen::KeyUsagePurpose::DigitalSignature,
        ];

        let key = rcgen::KeyPair::generate().map_err(|e| FedError::Tls(e.to_string()))?;
        let cert = params
            .self_signed(&key)
            .map_err(|e| FedError::Tls(e.to_string()))?;
        Ok(Self { cert, key })
    }

    /// The CA certificate in DER form.
    pub fn cert_der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    /// The CA certificate in PEM form.
    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    /// Issue a leaf certificate for `name` (a DNS name or IP address).
    pub fn issue_cert(
        &self,
        name: &str,
    ) -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>)> {
        let (cert, key) = self.issue(name)?;
        let key_der = PrivateKeyDer::try_from(key.serialize_der())
            .map_err(|e| FedError::Tls(e.to_string()))?;
        Ok((cert.der().clone(), key_der))
    }

    /// Issue a leaf certificate and return `(cert_pem, key_pem)`.
    pub fn issue_pem(&self, name: &str) -> Result<(String, String)> {
        let (cert, key) = self.issue(name)?;
        Ok((cert.pem(), key.serialize_pem()))
    }

    fn issue(&self, name: &str) -> Result<(rcgen::Certificate, rcgen::KeyPair)> {
        let mut params = rcgen::CertificateParams::new(vec![name.to_string()])
            .map_err(|e| FedError::Tls(e.to_string()))?;
        params.distinguished_name.push(rcgen::DnType::CommonName, name);
        params.extended_key_usages = vec![
            rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            rcgen::ExtendedKeyUsagePurpose::ClientAuth,
        ];

        let key = rcgen::KeyPair::generate().map_err(|e| FedError::Tls(e.to_string()))?;
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .map_err(|e| FedError::Tls(e.to_string()))?;
        Ok((cert, key))
    }
}
