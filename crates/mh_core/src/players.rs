//! Connected-player registry and per-player replicated state.
//!
//! Seat order is stable for the lifetime of a connection and doubles as the
//! election rotation order: candidates are picked by walking occupied seats.

use crate::error::{CoreError, Result};
use crate::replication::{Authority, Replicated};
use crate::types::{PlayerId, PlayerStatus, Role, RoomId, VoteStatus};
use serde::{Deserialize, Serialize};

/// A player's next-night room plus their spawn point inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAssignment {
    pub room: RoomId,
    pub spawn_index: u32,
}

/// Per-player vote bookkeeping.
///
/// `targeting` is the only client-writable field; `current_vote` commits
/// after the confirmation delay. `status` is derived state maintained by the
/// server: None → Voting → Voted, with the symmetric Voted → Unvoting → None
/// path for hold-to-retract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteState {
    pub current_vote: Replicated<Option<PlayerId>>,
    pub targeting: Replicated<Option<PlayerId>>,
    pub status: VoteStatus,
}

/// What a begin-vote request started, so the caller can schedule the right
/// confirmation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteBegin {
    Voting,
    Unvoting,
}

impl VoteState {
    fn new(owner: PlayerId) -> Self {
        Self {
            current_vote: Replicated::server_owned(None),
            targeting: Replicated::client_owned(None, owner),
            status: VoteStatus::None,
        }
    }

    /// Start a vote (or, when re-targeting the already-confirmed vote, start
    /// the unvote path). `caller` must be the owning client or the server;
    /// the check runs before any state moves so the unvote path is equally
    /// protected.
    pub fn begin(&mut self, caller: Authority, target: PlayerId) -> Result<VoteBegin> {
        if !caller.is_server() && caller != self.targeting.writer() {
            return Err(CoreError::NotAuthoritative(caller));
        }
        if self.status == VoteStatus::Voted && *self.current_vote.get() == Some(target) {
            self.status = VoteStatus::Unvoting;
            return Ok(VoteBegin::Unvoting);
        }
        self.targeting.set(caller, Some(target))?;
        self.status = VoteStatus::Voting;
        Ok(VoteBegin::Voting)
    }

    /// Abort the pending transition; `targeting` reverts to the confirmed
    /// vote.
    pub fn cancel(&mut self) {
        let confirmed = *self.current_vote.get();
        self.targeting.set_server(confirmed);
        self.status = if confirmed.is_some() { VoteStatus::Voted } else { VoteStatus::None };
    }

    /// Commit the pending transition. No-op unless a transition is pending.
    pub fn confirm(&mut self) {
        match self.status {
            VoteStatus::Voting => {
                let target = *self.targeting.get();
                self.current_vote.set_server(target);
                self.status = VoteStatus::Voted;
            }
            VoteStatus::Unvoting => {
                self.current_vote.set_server(None);
                self.targeting.set_server(None);
                self.status = VoteStatus::None;
            }
            VoteStatus::None | VoteStatus::Voted => {}
        }
    }

    /// Drop all vote state (used after a tally).
    pub fn clear(&mut self) {
        self.current_vote.set_server(None);
        self.targeting.set_server(None);
        self.status = VoteStatus::None;
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.status, VoteStatus::Voting | VoteStatus::Unvoting)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Election rotation position. Stable while connected.
    pub seat: u32,
    pub role: Replicated<Role>,
    pub status: Replicated<PlayerStatus>,
    pub vote: VoteState,
    pub assignment: Replicated<Option<RoomAssignment>>,
}

impl Player {
    fn new(id: PlayerId, seat: u32) -> Self {
        Self {
            id,
            seat,
            role: Replicated::server_owned(Role::Unknown),
            status: Replicated::server_owned(PlayerStatus::None),
            vote: VoteState::new(id),
            assignment: Replicated::server_owned(None),
        }
    }

    pub fn is_commander(&self) -> bool {
        *self.status.get() == PlayerStatus::Commander
    }
}

/// All currently connected players, ordered by seat.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self { players: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    /// Connected player ids in seat order, i.e. the election rotation order.
    pub fn seated_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// Seat a new player at the lowest free seat.
    pub fn connect(&mut self, id: PlayerId, max_players: u32) -> Result<&Player> {
        if self.contains(id) {
            return Err(CoreError::InvalidCommand(format!("player {:?} already connected", id)));
        }
        if self.players.len() as u32 >= max_players {
            log::warn!("connect request for {:?} dropped: all {} seats taken", id, max_players);
            return Err(CoreError::CapacityExhausted);
        }
        let mut seat = 0u32;
        while self.players.iter().any(|p| p.seat == seat) {
            seat += 1;
        }
        let player = Player::new(id, seat);
        let insert_at = self.players.iter().position(|p| p.seat > seat).unwrap_or(self.players.len());
        self.players.insert(insert_at, player);
        Ok(&self.players[insert_at])
    }

    /// Remove a player, returning their final state for role accounting.
    pub fn disconnect(&mut self, id: PlayerId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_assigns_lowest_free_seat() {
        let mut registry = PlayerRegistry::new();
        for i in 0..3 {
            registry.connect(PlayerId(i), 8).unwrap();
        }
        registry.disconnect(PlayerId(1));
        let seated = registry.connect(PlayerId(9), 8).unwrap();
        assert_eq!(seated.seat, 1);
        assert_eq!(registry.seated_ids(), vec![PlayerId(0), PlayerId(9), PlayerId(2)]);
    }

    #[test]
    fn test_connect_rejects_when_full() {
        let mut registry = PlayerRegistry::new();
        registry.connect(PlayerId(0), 1).unwrap();
        assert_eq!(registry.connect(PlayerId(1), 1), Err(CoreError::CapacityExhausted));
    }

    #[test]
    fn test_vote_state_machine_paths() {
        let voter = PlayerId(1);
        let target = PlayerId(2);
        let mut vote = VoteState::new(voter);
        let caller = Authority::Client(voter);

        assert_eq!(vote.begin(caller, target).unwrap(), VoteBegin::Voting);
        assert_eq!(vote.status, VoteStatus::Voting);
        vote.confirm();
        assert_eq!(vote.status, VoteStatus::Voted);
        assert_eq!(*vote.current_vote.get(), Some(target));

        // Re-initiating on the same target starts the unvote path.
        assert_eq!(vote.begin(caller, target).unwrap(), VoteBegin::Unvoting);
        assert_eq!(vote.status, VoteStatus::Unvoting);
        vote.confirm();
        assert_eq!(vote.status, VoteStatus::None);
        assert_eq!(*vote.current_vote.get(), None);
    }

    #[test]
    fn test_vote_cancel_reverts_to_confirmed() {
        let voter = PlayerId(1);
        let mut vote = VoteState::new(voter);
        let caller = Authority::Client(voter);

        vote.begin(caller, PlayerId(2)).unwrap();
        vote.confirm();
        vote.begin(caller, PlayerId(3)).unwrap();
        vote.cancel();
        assert_eq!(vote.status, VoteStatus::Voted);
        assert_eq!(*vote.targeting.get(), Some(PlayerId(2)));
    }

    #[test]
    fn test_vote_rejects_foreign_client_write() {
        let mut vote = VoteState::new(PlayerId(1));
        let intruder = Authority::Client(PlayerId(9));
        assert!(vote.begin(intruder, PlayerId(2)).is_err());
        assert_eq!(vote.status, VoteStatus::None);
    }

    #[test]
    fn test_foreign_client_cannot_start_the_unvote_path() {
        let voter = PlayerId(1);
        let target = PlayerId(2);
        let mut vote = VoteState::new(voter);
        vote.begin(Authority::Client(voter), target).unwrap();
        vote.confirm();

        // Re-initiating on the confirmed target would flip Voted → Unvoting;
        // a non-owning caller must not reach that branch.
        let intruder = Authority::Client(PlayerId(9));
        assert!(vote.begin(intruder, target).is_err());
        assert_eq!(vote.status, VoteStatus::Voted);
        assert_eq!(*vote.current_vote.get(), Some(target));
    }
}
