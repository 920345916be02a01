//! Per-operation strategies applied by the coordinator.
//!
//! Each strategy consumes one rank's contribution and the round's shared
//! buffer, and leaves the updated shared buffer behind. The coordinator
//! calls `validate` before taking the session lock and `apply` once per
//! rank per round while holding it.

mod allgather;
mod allreduce;
mod broadcast;

pub use allgather::Allgather;
pub use allreduce::Allreduce;
pub use broadcast::Broadcast;

use crate::error::{FedError, Result};
use crate::protocol::{AllgatherRequest, AllreduceRequest, BroadcastRequest};
use crate::types::Rank;

/// Fields every collective request carries.
pub trait CollectiveRequest {
    fn rank(&self) -> Rank;
    fn sequence_number(&self) -> u64;
    fn send_buffer(&self) -> &[u8];
}

macro_rules! impl_collective_request {
    ($($ty:ty),*) => {
        $(
            impl CollectiveRequest for $ty {
                fn rank(&self) -> Rank {
                    self.rank
                }
                fn sequence_number(&self) -> u64 {
                    self.sequence_number
                }
                fn send_buffer(&self) -> &[u8] {
                    &self.send_buffer
                }
            }
        )*
    };
}

impl_collective_request!(AllgatherRequest, AllreduceRequest, BroadcastRequest);

/// A combination strategy for one kind of collective.
pub trait Collective {
    type Request: CollectiveRequest;

    /// Operation name used in logs.
    fn name(&self) -> &'static str;

    /// Reject malformed requests. Runs without the session lock and must
    /// not depend on the shared buffer.
    fn validate(&self, _request: &Self::Request) -> Result<()> {
        Ok(())
    }

    /// Fold one contribution into the shared buffer.
    ///
    /// On error the buffer must be left exactly as it was.
    fn apply(&self, request: &Self::Request, buffer: &mut RoundBuffer) -> Result<()>;
}

/// The round's shared buffer.
///
/// The first contribution of a round fixes the per-rank length; every later
/// contribution must match it, whichever order the ranks arrive in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundBuffer {
    bytes: Vec<u8>,
    slot_len: Option<usize>,
}

impl RoundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Per-rank length fixed by this round's first contribution, if any.
    pub fn slot_len(&self) -> Option<usize> {
        self.slot_len
    }

    /// Check `len` against the round's slot length.
    ///
    /// Returns `true` if no contribution has fixed the length yet.
    pub fn check_slot(&self, len: usize) -> Result<bool> {
        match self.slot_len {
            None => Ok(true),
            Some(expected) if expected == len => Ok(false),
            Some(expected) => Err(FedError::BufferSizeMismatch {
                expected,
                actual: len,
            }),
        }
    }

    /// Fix the slot length. Only the first contribution of a round calls this.
    pub fn fix_slot(&mut self, len: usize) {
        debug_assert!(self.slot_len.is_none(), "slot length fixed twice");
        self.slot_len = Some(len);
    }
}
