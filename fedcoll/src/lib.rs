//! Coordinator-mediated collectives for network-isolated ranks.
//!
//! `world_size` ranks that cannot reach each other send allgather,
//! allreduce and broadcast requests to one coordinator. The coordinator
//! runs a round-based barrier ([`RoundCoordinator`]), combines the round's
//! contributions and hands every rank the same result. Ranks talk to it
//! over QUIC with mutual TLS ([`FederatedServer`], [`FederatedClient`]).

pub mod client;
pub mod collective;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod reduce;
pub mod server;
pub mod transport;
pub mod types;

pub use client::FederatedClient;
pub use config::{ClientConfig, ServerConfig};
pub use coordinator::{RoundCoordinator, RoundPhase, SessionSnapshot};
pub use error::{FedError, Result};
pub use protocol::FederatedMessage;
pub use server::{FederatedServer, FederatedService};
pub use transport::{DevCa, TransportListener};
pub use types::{DataType, Rank, ReduceOp, StatusCode};
