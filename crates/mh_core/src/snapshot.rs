//! Serializable view of all replicated state, for late-join catch-up and
//! debug dumps.

use crate::core::MatchCore;
use crate::phase::Phase;
use crate::players::RoomAssignment;
use crate::scheduler::Tick;
use crate::types::{MatchState, PlayerId, PlayerStatus, Role, RoomId, StationId, VoteStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub seat: u32,
    pub role: Role,
    pub status: PlayerStatus,
    pub vote_status: VoteStatus,
    pub current_vote: Option<PlayerId>,
    pub assignment: Option<RoomAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSnapshot {
    pub id: StationId,
    pub room: RoomId,
    pub health: i32,
    pub can_assign: bool,
    pub links: Vec<StationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub tick: Tick,
    pub phase: Phase,
    pub match_state: MatchState,
    pub round: u32,
    pub stations_to_destroy: i32,
    pub stations_remaining: i32,
    pub commander: Option<PlayerId>,
    pub candidate_a: Option<PlayerId>,
    pub candidate_b: Option<PlayerId>,
    pub mole_count: u32,
    pub crew_count: u32,
    pub players: Vec<PlayerSnapshot>,
    pub stations: Vec<StationSnapshot>,
}

impl MatchCore {
    pub fn snapshot(&self) -> MatchSnapshot {
        let (candidate_a, candidate_b) = self.election().candidates();
        MatchSnapshot {
            tick: self.now(),
            phase: self.phase(),
            match_state: self.match_state(),
            round: self.round().round.value(),
            stations_to_destroy: self.round().stations_to_destroy.value(),
            stations_remaining: self.round().stations_remaining.value(),
            commander: self.election().commander(),
            candidate_a,
            candidate_b,
            mole_count: self.roles().mole_count.value(),
            crew_count: self.roles().crew_count.value(),
            players: self
                .players()
                .iter()
                .map(|p| PlayerSnapshot {
                    id: p.id,
                    seat: p.seat,
                    role: *p.role.get(),
                    status: *p.status.get(),
                    vote_status: p.vote.status,
                    current_vote: *p.vote.current_vote.get(),
                    assignment: *p.assignment.get(),
                })
                .collect(),
            stations: self
                .stations()
                .iter()
                .map(|s| StationSnapshot {
                    id: s.id,
                    room: s.room,
                    health: s.health.value(),
                    can_assign: s.can_assign,
                    links: s.links().to_vec(),
                })
                .collect(),
        }
    }
}
