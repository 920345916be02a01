use crate::config::ClientConfig;
use crate::error::{FedError, Result};
use crate::protocol::{
    AllgatherRequest, AllreduceRequest, BroadcastRequest, CollectiveReply, FederatedMessage,
};
use crate::transport::request_reply;
use crate::transport::tls::{load_certs, load_private_key, make_client_config_mtls};
use crate::types::{DataType, Rank, ReduceOp, StatusCode};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// One rank's connection to the coordinator.
///
/// Collective calls take `&mut self`: a rank issues its calls one at a time,
/// and each successful call advances the rank's sequence number by one.
///
/// A call that times out or loses its stream may already have been counted
/// by the coordinator. After that every call fails with
/// [`FedError::Interrupted`] until the rank reconnects.
pub struct FederatedClient {
    endpoint: quinn::Endpoint,
    conn: quinn::Connection,
    rank: Rank,
    world_size: u32,
    sequence_number: u64,
    call_timeout: Option<Duration>,
    max_message_bytes: u64,
    interrupted: Option<&'static str>,
}

fn required<'a>(path: &'a Option<std::path::PathBuf>, key: &str) -> Result<&'a Path> {
    path.as_deref()
        .ok_or_else(|| FedError::Config(format!("{key} is not set")))
}

impl FederatedClient {
    /// Load the PEM files named in `config` and connect to the coordinator.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let server_roots = load_certs(required(&config.server_cert, "FEDERATED_SERVER_CERT")?)?;
        let key = load_private_key(required(&config.client_key, "FEDERATED_CLIENT_KEY")?)?;
        let cert_chain = load_certs(required(&config.client_cert, "FEDERATED_CLIENT_CERT")?)?;

        let quic_config = make_client_config_mtls(cert_chain, key, &server_roots)?;
        Self::connect_with(config, quic_config).await
    }

    /// Connect with a prebuilt QUIC client config. TLS paths in `config`
    /// are ignored.
    pub async fn connect_with(
        config: &ClientConfig,
        quic_config: quinn::ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let addr = tokio::net::lookup_host(config.server_address.as_str())
            .await?
            .next()
            .ok_or_else(|| {
                FedError::Config(format!("{} did not resolve", config.server_address))
            })?;

        let local: SocketAddr = if addr.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let mut endpoint = quinn::Endpoint::client(local)
            .map_err(|e| FedError::transport_with_source("client endpoint", e))?;
        endpoint.set_default_client_config(quic_config);

        tracing::info!(
            "connecting to federated server {}, world size {}, rank {}",
            config.server_address,
            config.world_size,
            config.rank
        );
        let connecting = endpoint
            .connect(addr, config.resolved_server_name())
            .map_err(|e| FedError::transport_with_source(format!("connect {addr}"), e))?;
        let conn = connecting
            .await
            .map_err(|e| FedError::transport_with_source(format!("handshake with {addr}"), e))?;

        Ok(Self {
            endpoint,
            conn,
            rank: config.rank,
            world_size: config.world_size,
            sequence_number: 0,
            call_timeout: config.call_timeout,
            max_message_bytes: config.max_message_bytes,
            interrupted: None,
        })
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    /// Sequence number the next call will carry.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Whether an earlier call was cut off mid-exchange.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.is_some()
    }

    /// Gather every rank's buffer; the result is rank-ordered.
    pub async fn allgather(&mut self, send_buffer: &[u8]) -> Result<Vec<u8>> {
        self.check_usable()?;
        let request = FederatedMessage::Allgather(AllgatherRequest {
            rank: self.rank,
            sequence_number: self.sequence_number,
            send_buffer: send_buffer.to_vec(),
        });
        self.call("allgather", request).await
    }

    /// Element-wise reduce every rank's buffer.
    pub async fn allreduce(
        &mut self,
        send_buffer: &[u8],
        data_type: DataType,
        op: ReduceOp,
    ) -> Result<Vec<u8>> {
        self.check_usable()?;
        if self.world_size == 1 {
            self.sequence_number += 1;
            return Ok(send_buffer.to_vec());
        }
        let request = FederatedMessage::Allreduce(AllreduceRequest::new(
            self.rank,
            self.sequence_number,
            send_buffer.to_vec(),
            data_type,
            op,
        ));
        self.call("allreduce", request).await
    }

    /// Receive `root`'s buffer. Every rank passes a buffer; only the root's
    /// content matters.
    pub async fn broadcast(&mut self, send_buffer: &[u8], root: Rank) -> Result<Vec<u8>> {
        self.check_usable()?;
        if self.world_size == 1 {
            self.sequence_number += 1;
            return Ok(send_buffer.to_vec());
        }
        let request = FederatedMessage::Broadcast(BroadcastRequest {
            rank: self.rank,
            sequence_number: self.sequence_number,
            send_buffer: send_buffer.to_vec(),
            root,
        });
        self.call("broadcast", request).await
    }

    /// Close the connection and wait for the endpoint to drain.
    pub async fn close(self) {
        self.conn.close(0u32.into(), b"done");
        self.endpoint.wait_idle().await;
    }

    fn check_usable(&self) -> Result<()> {
        match self.interrupted {
            Some(operation) => Err(FedError::Interrupted {
                operation,
                sequence_number: self.sequence_number,
            }),
            None => Ok(()),
        }
    }

    async fn call(&mut self, operation: &'static str, request: FederatedMessage) -> Result<Vec<u8>> {
        let sequence_number = self.sequence_number;
        let exchange = request_reply(&self.conn, &request, self.max_message_bytes);
        let outcome = match self.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .unwrap_or_else(|_| {
                    Err(FedError::Timeout {
                        operation,
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }),
            None => exchange.await,
        };
        let reply = outcome.inspect_err(|e| {
            tracing::warn!(
                "rank {} {operation} {sequence_number} interrupted: {e}",
                self.rank
            );
            self.interrupted = Some(operation);
        })?;

        match reply {
            FederatedMessage::Reply(CollectiveReply { receive_buffer }) => {
                self.sequence_number += 1;
                tracing::debug!(
                    "rank {} {operation} {sequence_number}: {} bytes",
                    self.rank,
                    receive_buffer.len()
                );
                Ok(receive_buffer)
            }
            FederatedMessage::Status { code, message } => Err(FedError::Remote {
                code: StatusCode::from_u8(code),
                message,
            }),
            other => Err(FedError::DecodeFailed(format!(
                "unexpected {} reply to {operation}",
                other.name()
            ))),
        }
    }
}
