use crate::collective::{Collective, CollectiveRequest, RoundBuffer};
use crate::error::{FedError, Result};
use crate::protocol::BroadcastRequest;

/// Keeps the root's buffer; every other contribution only counts toward quorum.
#[derive(Debug, Clone, Copy)]
pub struct Broadcast {
    world_size: u32,
}

impl Broadcast {
    pub fn new(world_size: u32) -> Self {
        Self { world_size }
    }
}

impl Collective for Broadcast {
    type Request = BroadcastRequest;

    fn name(&self) -> &'static str {
        "Broadcast"
    }

    fn validate(&self, request: &BroadcastRequest) -> Result<()> {
        if request.root >= self.world_size {
            return Err(FedError::InvalidRank {
                rank: request.root,
                world_size: self.world_size,
            });
        }
        Ok(())
    }

    fn apply(&self, request: &BroadcastRequest, buffer: &mut RoundBuffer) -> Result<()> {
        if request.rank() == request.root {
            let bytes = buffer.bytes_mut();
            bytes.clear();
            bytes.extend_from_slice(request.send_buffer());
        }
        Ok(())
    }
}
