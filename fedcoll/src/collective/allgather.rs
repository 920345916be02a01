use crate::collective::{Collective, CollectiveRequest, RoundBuffer};
use crate::error::{FedError, Result};
use crate::protocol::AllgatherRequest;

/// Splices each rank's buffer into its slot of a `world_size`-slot buffer.
///
/// The final layout is rank-ordered no matter which rank arrives first.
#[derive(Debug, Clone, Copy)]
pub struct Allgather {
    world_size: u32,
}

impl Allgather {
    pub fn new(world_size: u32) -> Self {
        Self { world_size }
    }

    fn check_rank(&self, request: &AllgatherRequest) -> Result<()> {
        if request.rank() >= self.world_size {
            return Err(FedError::InvalidRank {
                rank: request.rank(),
                world_size: self.world_size,
            });
        }
        Ok(())
    }
}

impl Collective for Allgather {
    type Request = AllgatherRequest;

    fn name(&self) -> &'static str {
        "Allgather"
    }

    fn validate(&self, request: &AllgatherRequest) -> Result<()> {
        self.check_rank(request)?;
        request
            .send_buffer()
            .len()
            .checked_mul(self.world_size as usize)
            .map(|_| ())
            .ok_or_else(|| {
                FedError::invalid_argument(format!(
                    "allgather of {} bytes across {} ranks overflows",
                    request.send_buffer().len(),
                    self.world_size
                ))
            })
    }

    fn apply(&self, request: &AllgatherRequest, buffer: &mut RoundBuffer) -> Result<()> {
        self.check_rank(request)?;
        let send = request.send_buffer();
        let slot = send.len();

        // First contribution of the round sizes the buffer.
        if buffer.check_slot(slot)? {
            buffer.fix_slot(slot);
            buffer.bytes_mut().resize(slot * self.world_size as usize, 0);
        }

        let offset = request.rank() as usize * slot;
        buffer.bytes_mut()[offset..offset + slot].copy_from_slice(send);
        Ok(())
    }
}
