use crate::types::{Rank, StatusCode};

pub type Result<T> = std::result::Result<T, FedError>;

#[derive(Debug, thiserror::Error)]
pub enum FedError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error(
        "protocol violation: rank {rank} sent sequence number {requested} while the session is at {current}"
    )]
    ProtocolViolation {
        rank: Rank,
        requested: u64,
        current: u64,
    },

    #[error("rank {rank} already contributed to round {sequence_number}")]
    DuplicateContribution { rank: Rank, sequence_number: u64 },

    #[error(
        "admission timed out after {timeout_ms}ms waiting for round {sequence_number} (session at {current})"
    )]
    AdmissionTimeout {
        sequence_number: u64,
        current: u64,
        timeout_ms: u64,
    },

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error(
        "{operation} at sequence number {sequence_number} was interrupted; reconnect before the next call"
    )]
    Interrupted {
        operation: &'static str,
        sequence_number: u64,
    },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u16, remote: u16 },

    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: u64, limit: u64 },

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("QUIC transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("coordinator returned {code}: {message}")]
    Remote { code: StatusCode, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl FedError {
    /// Create an `InvalidArgument` error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The status code a coordinator reports to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            FedError::InvalidArgument(_)
            | FedError::BufferSizeMismatch { .. }
            | FedError::InvalidRank { .. } => StatusCode::InvalidArgument,
            FedError::ProtocolViolation { .. } | FedError::DuplicateContribution { .. } => {
                StatusCode::FailedPrecondition
            }
            FedError::AdmissionTimeout { .. } | FedError::Timeout { .. } => {
                StatusCode::DeadlineExceeded
            }
            FedError::Remote { code, .. } => *code,
            _ => StatusCode::Internal,
        }
    }
}
