//! QUIC front end for the round coordinator.
//!
//! One task per connection accepts bidirectional streams; each stream
//! carries one request and its reply, handled on its own task.

mod service;

pub use service::FederatedService;

use crate::config::ServerConfig;
use crate::coordinator::RoundCoordinator;
use crate::error::Result;
use crate::protocol::FederatedMessage;
use crate::transport::tls::{load_certs, load_private_key};
use crate::transport::{TransportListener, read_framed, write_framed};
use crate::types::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Upper bound on in-flight calls per connection.
const MAX_CONCURRENT_CALLS: usize = 64;

pub struct FederatedServer {
    listener: TransportListener,
    service: FederatedService,
    max_message_bytes: u64,
}

impl FederatedServer {
    /// Load TLS material from `config` and bind the listener.
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        let cert_chain = load_certs(&config.server_cert)?;
        let key = load_private_key(&config.server_key)?;
        let client_roots = load_certs(&config.client_cert)?;

        let listener = TransportListener::bind_with_mtls(
            config.listen_addr(),
            cert_chain,
            key,
            &client_roots,
        )?;
        Self::with_listener(listener, config)
    }

    /// Build a server on an already bound listener.
    pub fn with_listener(listener: TransportListener, config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        let coordinator = RoundCoordinator::new(config.world_size)?
            .with_admission_timeout(config.admission_timeout)
            .with_max_rounds_ahead(config.max_rounds_ahead);
        Ok(Self {
            listener,
            service: FederatedService::new(Arc::new(coordinator)),
            max_message_bytes: config.max_message_bytes,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn coordinator(&self) -> &Arc<RoundCoordinator> {
        self.service.coordinator()
    }

    /// Accept connections until the endpoint closes.
    pub async fn serve(self) -> Result<()> {
        while let Some(incoming) = self.listener.accept().await {
            let service = self.service.clone();
            let limit = self.max_message_bytes;
            tokio::spawn(async move {
                let remote = incoming.remote_address();
                match incoming.await {
                    Ok(conn) => {
                        tracing::debug!("client connected from {remote}");
                        serve_connection(conn, service, limit).await;
                    }
                    Err(e) => tracing::warn!("handshake with {remote} failed: {e}"),
                }
            });
        }
        Ok(())
    }
}

/// Bind per `config` and serve until the endpoint closes.
pub async fn run(config: ServerConfig) -> Result<()> {
    let server = FederatedServer::bind(&config)?;
    tracing::info!(
        "federated server listening on {}, world size {}",
        server.local_addr(),
        config.world_size
    );
    server.serve().await
}

async fn serve_connection(conn: quinn::Connection, service: FederatedService, limit: u64) {
    let remote = conn.remote_address();
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_CALLS));

    loop {
        let (send, recv) = match conn.accept_bi().await {
            Ok(streams) => streams,
            Err(e) => {
                tracing::debug!("connection from {remote} closed: {e}");
                return;
            }
        };

        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            return;
        };

        let service = service.clone();
        tokio::spawn(async move {
            serve_stream(send, recv, &service, limit, remote).await;
            drop(permit);
        });
    }
}

async fn serve_stream(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    service: &FederatedService,
    limit: u64,
    remote: SocketAddr,
) {
    let reply = match read_framed(&mut recv, limit).await {
        Ok(request) if request.is_request() => service.call(request).await,
        Ok(other) => FederatedMessage::status(
            StatusCode::InvalidArgument,
            format!("{} is not a request", other.name()),
        ),
        Err(e) => {
            tracing::warn!("bad request from {remote}: {e}");
            FederatedMessage::status(e.status_code(), e.to_string())
        }
    };

    if let Err(e) = write_framed(&mut send, &reply).await {
        tracing::warn!("reply to {remote} failed: {e}");
    }
}
