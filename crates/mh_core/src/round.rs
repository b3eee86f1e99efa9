//! Round and match-level bookkeeping: round counter, destruction threshold,
//! win/loss evaluation.

use crate::config::MatchConfig;
use crate::replication::Replicated;
use crate::types::{MatchState, RoomId, WinningSide};
use std::collections::HashSet;

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Enough stations were destroyed; the moles win.
    StationsDestroyed,
    /// The round cap was reached with stations standing; the crew wins.
    RoundsExhausted,
    /// An external trigger (disconnect handler, administrative stop).
    Forced(WinningSide),
}

impl MatchOutcome {
    pub fn winner(self) -> WinningSide {
        match self {
            MatchOutcome::StationsDestroyed => WinningSide::Moles,
            MatchOutcome::RoundsExhausted => WinningSide::Crew,
            MatchOutcome::Forced(side) => side,
        }
    }
}

#[derive(Debug)]
pub struct RoundEconomy {
    pub match_state: Replicated<MatchState>,
    /// Starts at 1, capped at `max_rounds`.
    pub round: Replicated<u32>,
    pub stations_to_destroy: Replicated<i32>,
    pub stations_remaining: Replicated<i32>,
    /// Rooms whose station died, accumulated across rounds. A room counts
    /// once no matter how many rounds it stays dead.
    destroyed_rooms: HashSet<RoomId>,
}

impl Default for RoundEconomy {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundEconomy {
    pub fn new() -> Self {
        Self {
            match_state: Replicated::server_owned(MatchState::ReadyUp),
            round: Replicated::server_owned(1),
            stations_to_destroy: Replicated::server_owned(0),
            stations_remaining: Replicated::server_owned(0),
            destroyed_rooms: HashSet::new(),
        }
    }

    pub fn state(&self) -> MatchState {
        self.match_state.value()
    }

    pub fn set_state(&mut self, state: MatchState) -> bool {
        self.match_state.set_server(state)
    }

    /// Fix the destruction threshold from the connected-player bracket.
    /// Runs once at Gameplay start; also resets the round counter and the
    /// destroyed-room set. Returns whether the remaining counter moved.
    pub fn begin_gameplay(&mut self, config: &MatchConfig, player_count: u32) -> bool {
        let target = config.stations_to_destroy(player_count);
        self.stations_to_destroy.set_server(target);
        self.round.set_server(1);
        self.destroyed_rooms.clear();
        self.stations_remaining.set_server(target)
    }

    /// Fold this round's dead rooms into the destroyed set and recompute the
    /// remaining counter. Returns whether the counter moved.
    pub fn record_destroyed<I: IntoIterator<Item = RoomId>>(&mut self, dead_rooms: I) -> bool {
        self.destroyed_rooms.extend(dead_rooms);
        let remaining =
            self.stations_to_destroy.value() - self.destroyed_rooms.len() as i32;
        self.stations_remaining.set_server(remaining)
    }

    /// Win evaluation after the remaining counter updates.
    pub fn check_destruction(&self) -> Option<MatchOutcome> {
        if self.stations_remaining.value() <= 0 {
            Some(MatchOutcome::StationsDestroyed)
        } else {
            None
        }
    }

    /// Bump the round counter. Exceeding the cap clamps the counter and
    /// reports exhaustion.
    pub fn advance_round(&mut self, config: &MatchConfig) -> Option<MatchOutcome> {
        let next = self.round.value() + 1;
        if next > config.max_rounds {
            self.round.set_server(config.max_rounds);
            Some(MatchOutcome::RoundsExhausted)
        } else {
            self.round.set_server(next);
            None
        }
    }
}
