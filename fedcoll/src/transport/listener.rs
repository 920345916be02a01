use crate::error::{FedError, Result};
use crate::transport::tls::make_server_config_mtls;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::net::SocketAddr;

/// Listens for incoming QUIC connections on a bound address.
pub struct TransportListener {
    endpoint: quinn::Endpoint,
    local_addr: SocketAddr,
}

impl TransportListener {
    /// Bind a QUIC listener with mutual TLS. Connecting clients must present
    /// a certificate chaining to `client_roots`.
    pub fn bind_with_mtls(
        addr: SocketAddr,
        cert_chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
        client_roots: &[CertificateDer<'static>],
    ) -> Result<Self> {
        let server_config = make_server_config_mtls(cert_chain, key, client_roots)?;
        Self::bind_with_config(addr, server_config)
    }

    /// Bind with an existing server config.
    pub fn bind_with_config(addr: SocketAddr, config: quinn::ServerConfig) -> Result<Self> {
        let endpoint = quinn::Endpoint::server(config, addr)
            .map_err(|e| FedError::transport_with_source(format!("bind {addr}"), e))?;

        let local_addr = endpoint
            .local_addr()
            .map_err(|e| FedError::transport(format!("local_addr: {e}")))?;

        Ok(Self {
            endpoint,
            local_addr,
        })
    }

    /// Wait for the next incoming connection attempt.
    ///
    /// Returns `None` once the endpoint is closed. The handshake is left to
    /// the caller so that one slow or rejected client does not stall the
    /// accept loop.
    pub async fn accept(&self) -> Option<quinn::Incoming> {
        self.endpoint.accept().await
    }

    /// The local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
