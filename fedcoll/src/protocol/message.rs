use crate::types::{DataType, Rank, ReduceOp, StatusCode};

/// Gather-to-all contribution from one rank.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub struct AllgatherRequest {
    pub rank: Rank,
    pub sequence_number: u64,
    pub send_buffer: Vec<u8>,
}

/// Reduce-to-all contribution from one rank.
///
/// The element type and operation travel as raw wire tags so that an
/// unknown value reaches the coordinator and is rejected there.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub struct AllreduceRequest {
    pub rank: Rank,
    pub sequence_number: u64,
    pub send_buffer: Vec<u8>,
    pub data_type: u8,
    pub reduce_operation: u8,
}

impl AllreduceRequest {
    pub fn new(
        rank: Rank,
        sequence_number: u64,
        send_buffer: Vec<u8>,
        data_type: DataType,
        reduce_operation: ReduceOp,
    ) -> Self {
        Self {
            rank,
            sequence_number,
            send_buffer,
            data_type: data_type.tag(),
            reduce_operation: reduce_operation.tag(),
        }
    }
}

/// Broadcast contribution from one rank; only `root`'s buffer is kept.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub struct BroadcastRequest {
    pub rank: Rank,
    pub sequence_number: u64,
    pub send_buffer: Vec<u8>,
    pub root: Rank,
}

/// The round's final shared buffer, delivered to every rank.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub struct CollectiveReply {
    pub receive_buffer: Vec<u8>,
}

/// Every message exchanged between a rank and the coordinator.
///
/// One request and one response travel per QUIC bidirectional stream.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum FederatedMessage {
    Allgather(AllgatherRequest),
    Allreduce(AllreduceRequest),
    Broadcast(BroadcastRequest),
    Reply(CollectiveReply),
    /// Call failed on the coordinator. `code` is a [`StatusCode`] discriminant.
    Status { code: u8, message: String },
}

impl FederatedMessage {
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        FederatedMessage::Status {
            code: code as u8,
            message: message.into(),
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            FederatedMessage::Allgather(_) => "Allgather",
            FederatedMessage::Allreduce(_) => "Allreduce",
            FederatedMessage::Broadcast(_) => "Broadcast",
            FederatedMessage::Reply(_) => "Reply",
            FederatedMessage::Status { .. } => "Status",
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            FederatedMessage::Allgather(_)
                | FederatedMessage::Allreduce(_)
                | FederatedMessage::Broadcast(_)
        )
    }
}
