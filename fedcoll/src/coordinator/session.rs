use crate::collective::RoundBuffer;
use crate::types::Rank;
use std::collections::HashSet;

/// Where the current round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No contribution yet for `sequence_number`.
    AwaitingRound,
    /// Some, but not all, ranks have contributed.
    Collecting,
    /// Every rank has contributed; replies are being handed out.
    Draining,
}

/// Mutable state shared by every call. Only touched under the coordinator lock.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) sequence_number: u64,
    pub(crate) buffer: RoundBuffer,
    pub(crate) arrived: u32,
    pub(crate) departed: u32,
    pub(crate) phase: RoundPhase,
    contributors: HashSet<Rank>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            sequence_number: 0,
            buffer: RoundBuffer::new(),
            arrived: 0,
            departed: 0,
            phase: RoundPhase::AwaitingRound,
            contributors: HashSet::new(),
        }
    }

    /// Whether `rank` has already been counted in the current round.
    pub(crate) fn has_contributed(&self, rank: Rank) -> bool {
        self.contributors.contains(&rank)
    }

    /// Count `rank`'s contribution. Returns `true` when it completes the quorum.
    pub(crate) fn record_arrival(&mut self, rank: Rank, world_size: u32) -> bool {
        debug_assert!(self.arrived < world_size, "more arrivals than ranks");
        let first = self.contributors.insert(rank);
        debug_assert!(first, "rank {rank} counted twice");
        self.arrived += 1;
        if self.arrived == world_size {
            self.phase = RoundPhase::Draining;
            true
        } else {
            self.phase = RoundPhase::Collecting;
            false
        }
    }

    pub(crate) fn quorum_reached(&self, world_size: u32) -> bool {
        self.arrived == world_size
    }

    /// Hand out one reply. Retires the round when it was the last one.
    ///
    /// Returns the reply and whether the round retired.
    pub(crate) fn depart(&mut self, world_size: u32) -> (Vec<u8>, bool) {
        debug_assert_eq!(self.phase, RoundPhase::Draining);
        let reply = self.buffer.bytes().to_vec();
        self.departed += 1;
        if self.departed == world_size {
            self.retire();
            (reply, true)
        } else {
            (reply, false)
        }
    }

    /// The only transition that advances the round.
    fn retire(&mut self) {
        self.departed = 0;
        self.arrived = 0;
        self.buffer = RoundBuffer::new();
        self.contributors.clear();
        self.sequence_number += 1;
        self.phase = RoundPhase::AwaitingRound;
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            sequence_number: self.sequence_number,
            arrived: self.arrived,
            departed: self.departed,
            buffer_len: self.buffer.len(),
            phase: self.phase,
        }
    }
}

/// Point-in-time copy of the session, taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub sequence_number: u64,
    pub arrived: u32,
    pub departed: u32,
    pub buffer_len: usize,
    pub phase: RoundPhase,
}
