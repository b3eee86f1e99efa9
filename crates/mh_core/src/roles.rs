//! Crew/mole split and live role accounting.

use crate::config::MatchConfig;
use crate::players::PlayerRegistry;
use crate::replication::Replicated;
use crate::types::{MatchState, Role, WinningSide};
use rand::seq::SliceRandom;
use rand::Rng;

/// What a disconnect did to the role counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// ReadyUp, or the player never received a role.
    Ignored,
    /// A counter dropped; the match continues.
    Decremented(Role),
    /// The departed player was the last of their role; end immediately.
    EndMatch(WinningSide),
}

/// Computes the covert split at match start and tracks live counts.
#[derive(Debug)]
pub struct RoleAssignment {
    pub mole_count: Replicated<u32>,
    pub crew_count: Replicated<u32>,
}

impl Default for RoleAssignment {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleAssignment {
    pub fn new() -> Self {
        Self {
            mole_count: Replicated::server_owned(0),
            crew_count: Replicated::server_owned(0),
        }
    }

    /// Mole quota for `player_count` connected players: small lobbies get
    /// `min_moles`, lobbies at or above the threshold get `max_moles`,
    /// clamped so a lobby can never hold more moles than players.
    pub fn mole_quota(config: &MatchConfig, player_count: u32) -> u32 {
        let quota = if player_count < config.mole_threshold {
            config.min_moles
        } else {
            config.max_moles
        };
        quota.min(player_count)
    }

    /// Assign roles to every connected player: all start as crew, then
    /// uniformly random players are flipped to mole (without replacement)
    /// until the quota is reached. Returns `(moles, crew)`.
    pub fn assign<R: Rng>(
        &mut self,
        players: &mut PlayerRegistry,
        config: &MatchConfig,
        rng: &mut R,
    ) -> (u32, u32) {
        let count = players.len() as u32;
        let quota = Self::mole_quota(config, count);

        for player in players.iter_mut() {
            player.role.set_server(Role::Crewmate);
        }

        let mut unmarked = players.seated_ids();
        unmarked.shuffle(rng);
        for id in unmarked.into_iter().take(quota as usize) {
            if let Some(player) = players.get_mut(id) {
                player.role.set_server(Role::Mole);
            }
        }

        let moles = quota;
        let crew = count - quota;
        self.mole_count.set_server(moles);
        self.crew_count.set_server(crew);
        (moles, crew)
    }

    /// React to a disconnect. Counters only move during gameplay for players
    /// with a resolved role; losing the last member of a role ends the match
    /// in the other side's favor.
    pub fn on_disconnect(&mut self, role: Role, match_state: MatchState) -> DisconnectOutcome {
        if match_state == MatchState::ReadyUp || role == Role::Unknown {
            return DisconnectOutcome::Ignored;
        }
        match role {
            Role::Crewmate => {
                let before = self.crew_count.value();
                self.crew_count.set_server(before.saturating_sub(1));
                if before == 1 {
                    DisconnectOutcome::EndMatch(WinningSide::Moles)
                } else {
                    DisconnectOutcome::Decremented(Role::Crewmate)
                }
            }
            Role::Mole => {
                let before = self.mole_count.value();
                self.mole_count.set_server(before.saturating_sub(1));
                if before == 1 {
                    DisconnectOutcome::EndMatch(WinningSide::Crew)
                } else {
                    DisconnectOutcome::Decremented(Role::Mole)
                }
            }
            Role::Unknown => DisconnectOutcome::Ignored,
        }
    }
}
