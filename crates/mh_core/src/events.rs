//! Broadcast notifications fanned out to all observers.
//!
//! The core never pushes to the network itself; accepted state changes are
//! queued here in emission order and the transport drains them once per tick.

use crate::phase::Phase;
use crate::types::{MatchState, PlayerId, StationId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One observable state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoreEvent {
    PhaseChanged { phase: Phase },
    MatchStateChanged { state: MatchState },
    RoundChanged { round: u32 },
    StationsRemainingChanged { remaining: i32 },
    StationHealthChanged { station: StationId, health: i32 },
    NewCommander { commander: Option<PlayerId> },
    NewCandidates { candidate_a: Option<PlayerId>, candidate_b: Option<PlayerId> },
    MoleCountChanged { count: u32 },
    CrewCountChanged { count: u32 },
    RoomAssignmentsUpdated,
}

/// FIFO queue of pending notifications.
#[derive(Debug, Default)]
pub struct EventBus {
    queue: VecDeque<CoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }

    pub fn emit(&mut self, event: CoreEvent) {
        self.queue.push_back(event);
    }

    /// Hand all pending events to the transport, oldest first.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        self.queue.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_emission_order() {
        let mut bus = EventBus::new();
        bus.emit(CoreEvent::RoundChanged { round: 1 });
        bus.emit(CoreEvent::RoundChanged { round: 2 });
        let drained = bus.drain();
        assert_eq!(
            drained,
            vec![CoreEvent::RoundChanged { round: 1 }, CoreEvent::RoundChanged { round: 2 }]
        );
        assert!(bus.is_empty());
    }
}
