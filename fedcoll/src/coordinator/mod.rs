//! Round-based barrier coordinator.
//!
//! Every rank calls into the coordinator once per round. A call goes through
//! two waits:
//!
//! 1. **admission**: park until the session's sequence number equals the
//!    request's, so a fast rank cannot touch a slower round's buffer;
//! 2. **completion**: after contributing, park until all `world_size` ranks
//!    have contributed.
//!
//! The last rank to contribute takes its reply without waiting. The last
//! rank to take a reply retires the round: counters reset, the buffer is
//! cleared and the sequence number advances by one.
//!
//! The session sits behind a mutex that is never held across an `.await`.
//! Every change is published as a [`SessionSnapshot`] on a
//! `tokio::sync::watch` channel, and both waits park on that channel, so a
//! waiting rank holds a task rather than a thread.

mod session;

pub use session::{RoundPhase, SessionSnapshot};

use crate::collective::{Allgather, Allreduce, Broadcast, Collective, CollectiveRequest};
use crate::error::{FedError, Result};
use crate::protocol::{AllgatherRequest, AllreduceRequest, BroadcastRequest};
use crate::types::Rank;
use session::Session;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Owns the session and runs the barrier protocol for all three collectives.
///
/// Once a call has been counted toward its round, its future must be driven
/// to completion: dropping it leaves the round one departure short.
/// [`FederatedService`](crate::server::FederatedService) runs every call as
/// its own task for that reason.
#[derive(Debug)]
pub struct RoundCoordinator {
    world_size: u32,
    session: Mutex<Session>,
    changes: watch::Sender<SessionSnapshot>,
    admission_timeout: Option<Duration>,
    max_rounds_ahead: Option<u64>,
}

impl RoundCoordinator {
    /// Create a coordinator for `world_size` ranks.
    pub fn new(world_size: u32) -> Result<Self> {
        if world_size == 0 {
            return Err(FedError::invalid_argument("world size must be at least 1"));
        }
        let session = Session::new();
        let (changes, _) = watch::channel(session.snapshot());
        Ok(Self {
            world_size,
            session: Mutex::new(session),
            changes,
            admission_timeout: None,
            max_rounds_ahead: None,
        })
    }

    /// Bound how long a request may wait for its round to open.
    ///
    /// `None` (the default) waits forever. The completion wait is never
    /// bounded: by then the caller has already been counted.
    pub fn with_admission_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.admission_timeout = timeout;
        self
    }

    /// Reject requests more than `rounds` ahead of the current round.
    pub fn with_max_rounds_ahead(mut self, rounds: Option<u64>) -> Self {
        self.max_rounds_ahead = rounds;
        self
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        Ok(self.lock()?.snapshot())
    }

    pub async fn allgather(&self, request: &AllgatherRequest) -> Result<Vec<u8>> {
        self.handle(&Allgather::new(self.world_size), request).await
    }

    pub async fn allreduce(&self, request: &AllreduceRequest) -> Result<Vec<u8>> {
        self.handle(&Allreduce, request).await
    }

    pub async fn broadcast(&self, request: &BroadcastRequest) -> Result<Vec<u8>> {
        self.handle(&Broadcast::new(self.world_size), request).await
    }

    /// Run one rank's call for one round and return the round's result.
    pub async fn handle<C: Collective>(
        &self,
        collective: &C,
        request: &C::Request,
    ) -> Result<Vec<u8>> {
        // Pass through if there is only one rank.
        if self.world_size == 1 {
            return Ok(request.send_buffer().to_vec());
        }

        let name = collective.name();
        let rank = request.rank();
        let sequence_number = request.sequence_number();

        if rank >= self.world_size {
            return Err(FedError::InvalidRank {
                rank,
                world_size: self.world_size,
            });
        }
        collective.validate(request)?;

        tracing::debug!("{name} rank {rank}: waiting for sequence number {sequence_number}");
        self.admit(rank, sequence_number).await?;

        tracing::debug!("{name} rank {rank}: handling request");
        if self.contribute(collective, request)? {
            tracing::debug!("{name} rank {rank}: all requests received");
        } else {
            tracing::debug!("{name} rank {rank}: waiting for all clients");
            let world_size = self.world_size;
            self.wait_until(|snap| snap.arrived == world_size).await?;
            tracing::debug!("{name} rank {rank}: sending reply");
        }

        let (reply, retired) = self.depart()?;
        if retired {
            tracing::info!("{name} round {sequence_number} retired");
        }
        Ok(reply)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| FedError::LockPoisoned("session"))
    }

    /// Publish the session's state to waiting calls. Called with the lock held.
    fn publish(&self, session: &Session) {
        self.changes.send_replace(session.snapshot());
    }

    /// Park until a published snapshot satisfies `ready`.
    async fn wait_until(&self, mut ready: impl FnMut(&SessionSnapshot) -> bool) -> Result<()> {
        let mut changes = self.changes.subscribe();
        changes
            .wait_for(|snap| ready(snap))
            .await
            .map(|_| ())
            .map_err(|_| FedError::LockPoisoned("session changes"))
    }

    /// Wait until `sequence_number` is the current round.
    async fn admit(&self, rank: Rank, sequence_number: u64) -> Result<()> {
        self.check_sequence(rank, sequence_number)?;
        let opened = self.wait_until(|snap| snap.sequence_number >= sequence_number);
        match self.admission_timeout {
            None => opened.await,
            Some(timeout) => tokio::time::timeout(timeout, opened)
                .await
                .unwrap_or_else(|_| {
                    Err(FedError::AdmissionTimeout {
                        sequence_number,
                        current: self.changes.borrow().sequence_number,
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }),
        }
    }

    fn check_sequence(&self, rank: Rank, sequence_number: u64) -> Result<()> {
        let current = self.lock()?.sequence_number;
        let too_far = self
            .max_rounds_ahead
            .is_some_and(|max| sequence_number > current.saturating_add(max));
        if sequence_number < current || too_far {
            return Err(FedError::ProtocolViolation {
                rank,
                requested: sequence_number,
                current,
            });
        }
        Ok(())
    }

    /// Fold `request` into the open round. Returns `true` if it completed
    /// the quorum.
    fn contribute<C: Collective>(&self, collective: &C, request: &C::Request) -> Result<bool> {
        let rank = request.rank();
        let sequence_number = request.sequence_number();
        let mut session = self.lock()?;

        // Rounds cannot retire without this rank, so a session that moved
        // past the request has already counted another request from it.
        if session.sequence_number != sequence_number {
            return Err(FedError::ProtocolViolation {
                rank,
                requested: sequence_number,
                current: session.sequence_number,
            });
        }
        if session.has_contributed(rank) {
            return Err(FedError::DuplicateContribution {
                rank,
                sequence_number,
            });
        }

        collective.apply(request, &mut session.buffer)?;
        let quorum = session.record_arrival(rank, self.world_size);
        self.publish(&session);
        Ok(quorum)
    }

    /// Take this rank's reply, retiring the round if it is the last one.
    fn depart(&self) -> Result<(Vec<u8>, bool)> {
        let mut session = self.lock()?;
        let departure = session.depart(self.world_size);
        self.publish(&session);
        Ok(departure)
    }
}
