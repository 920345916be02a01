//! Typed and in-place wrappers over the byte-level collectives.

use crate::error::{FedError, Result};
use crate::reduce::{Element, decode_elements, encode_elements};
use crate::types::{Rank, ReduceOp};

use super::FederatedClient;

impl FederatedClient {
    /// Allreduce over a slice of native elements.
    pub async fn allreduce_typed<T: Element>(
        &mut self,
        values: &[T],
        op: ReduceOp,
    ) -> Result<Vec<T>> {
        let reply = self
            .allreduce(&encode_elements(values), T::DATA_TYPE, op)
            .await?;
        decode_elements(&reply)
    }

    /// Broadcast into `buffer`. Non-root ranks overwrite it with the root's
    /// bytes; the root keeps its own.
    pub async fn broadcast_in_place(&mut self, buffer: &mut [u8], root: Rank) -> Result<()> {
        let reply = self.broadcast(buffer, root).await?;
        if self.rank() == root {
            return Ok(());
        }
        if reply.len() != buffer.len() {
            return Err(FedError::BufferSizeMismatch {
                expected: buffer.len(),
                actual: reply.len(),
            });
        }
        buffer.copy_from_slice(&reply);
        Ok(())
    }

    /// Allreduce with a caller-supplied reducer.
    ///
    /// Gathers every rank's buffer, then folds the other ranks' slices into
    /// `buffer` in rank order with `reducer(dst, src)`. All ranks must pass
    /// buffers of the same length.
    pub async fn allreduce_with<F>(&mut self, buffer: &mut [u8], mut reducer: F) -> Result<()>
    where
        F: FnMut(&mut [u8], &[u8]),
    {
        if self.world_size() == 1 {
            return Ok(());
        }
        let gathered = self.allgather(buffer).await?;
        let slot = buffer.len();
        if gathered.len() != slot * self.world_size() as usize {
            return Err(FedError::BufferSizeMismatch {
                expected: slot * self.world_size() as usize,
                actual: gathered.len(),
            });
        }
        if slot == 0 {
            return Ok(());
        }
        for (rank, chunk) in gathered.chunks_exact(slot).enumerate() {
            if rank as Rank != self.rank() {
                reducer(buffer, chunk);
            }
        }
        Ok(())
    }
}
