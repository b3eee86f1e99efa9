//! The single mutation entry point.
//!
//! Every externally triggered change arrives as a `Command` tagged with the
//! caller's authority. The table here is the whole permission model: votes
//! belong to the voting player, station interaction to any participant, room
//! overrides to the commander, everything else to the server.

use crate::core::MatchCore;
use crate::error::{CoreError, Result};
use crate::replication::Authority;
use crate::types::{MatchState, PlayerId, RoomId, StationId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    StartNewRound,
    SetMatchState(MatchState),
    AdvancePhase,
    ForceSkipPhase,
    AssignRoles,
    SetPlayerRoom { player: PlayerId, room: RoomId },
    ClearRoomAssignments,
    /// `amount` of 0 means the configured per-action change.
    IncreaseStationHealth { station: StationId, amount: i32 },
    DecreaseStationHealth { station: StationId, amount: i32 },
    InitiateVote { voter: PlayerId, target: PlayerId },
    CancelVote { voter: PlayerId },
    ConfirmVote { voter: PlayerId },
    EnterStation { player: PlayerId, station: StationId },
    LeaveStation { player: PlayerId, station: StationId },
    StopGame { crew_wins: bool },
}

impl MatchCore {
    /// Validate the caller against the command's authority requirement and
    /// apply it. Replicas reject everything.
    pub fn execute(&mut self, command: Command, caller: Authority) -> Result<()> {
        if !self.is_server() {
            log::error!("command {:?} dropped on non-authoritative process", command);
            return Err(CoreError::NotAuthoritative(caller));
        }
        match command {
            Command::StartNewRound => {
                self.require_server(caller)?;
                self.start_new_round()
            }
            Command::SetMatchState(state) => {
                self.require_server(caller)?;
                self.set_match_state(state);
                Ok(())
            }
            Command::AdvancePhase => {
                self.require_server(caller)?;
                self.advance_phase();
                Ok(())
            }
            Command::ForceSkipPhase => {
                self.require_server(caller)?;
                self.force_skip_phase();
                Ok(())
            }
            Command::AssignRoles => {
                self.require_server(caller)?;
                self.assign_roles();
                Ok(())
            }
            Command::SetPlayerRoom { player, room } => {
                self.require_commander(caller)?;
                self.set_player_room(player, room)
            }
            Command::ClearRoomAssignments => {
                self.require_server(caller)?;
                self.clear_room_assignments();
                Ok(())
            }
            Command::IncreaseStationHealth { station, amount } => {
                self.require_participant(caller)?;
                self.increase_station_health(station, amount)
            }
            Command::DecreaseStationHealth { station, amount } => {
                self.require_participant(caller)?;
                self.decrease_station_health(station, amount)
            }
            Command::InitiateVote { voter, target } => {
                self.require_player(caller, voter)?;
                self.initiate_vote(caller, voter, target)
            }
            Command::CancelVote { voter } => {
                self.require_player(caller, voter)?;
                self.cancel_vote(voter)
            }
            Command::ConfirmVote { voter } => {
                self.require_player(caller, voter)?;
                self.confirm_vote(voter)
            }
            Command::EnterStation { player, station } => {
                self.require_player(caller, player)?;
                self.enter_station(player, station)
            }
            Command::LeaveStation { player, station } => {
                self.require_player(caller, player)?;
                self.leave_station(player, station)
            }
            Command::StopGame { crew_wins } => {
                self.require_server(caller)?;
                self.stop_game(crew_wins);
                Ok(())
            }
        }
    }

    fn require_server(&self, caller: Authority) -> Result<()> {
        if caller.is_server() {
            Ok(())
        } else {
            log::error!("server-only command from {:?} rejected", caller);
            Err(CoreError::NotAuthoritative(caller))
        }
    }

    /// The named player's own client, or the server.
    fn require_player(&self, caller: Authority, subject: PlayerId) -> Result<()> {
        match caller {
            Authority::Server => Ok(()),
            Authority::Client(id) if id == subject => Ok(()),
            _ => {
                log::error!("command for {:?} from {:?} rejected", subject, caller);
                Err(CoreError::NotAuthoritative(caller))
            }
        }
    }

    /// Any connected client, or the server.
    fn require_participant(&self, caller: Authority) -> Result<()> {
        match caller {
            Authority::Server => Ok(()),
            Authority::Client(id) if self.players().contains(id) => Ok(()),
            _ => {
                log::error!("command from unseated {:?} rejected", caller);
                Err(CoreError::NotAuthoritative(caller))
            }
        }
    }

    /// The current commander's client, or the server.
    fn require_commander(&self, caller: Authority) -> Result<()> {
        match caller {
            Authority::Server => Ok(()),
            Authority::Client(id) if self.election().commander() == Some(id) => Ok(()),
            _ => {
                log::error!("commander-only command from {:?} rejected", caller);
                Err(CoreError::NotAuthoritative(caller))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;

    fn seated_core(players: u32) -> MatchCore {
        let mut core = MatchCore::new(MatchConfig::default(), 42).unwrap();
        let room = core.add_room("reactor", 2);
        core.add_station(room, true).unwrap();
        for i in 0..players {
            core.connect_player(PlayerId(i)).unwrap();
        }
        core
    }

    #[test]
    fn test_server_only_commands_reject_clients() {
        let mut core = seated_core(2);
        let client = Authority::Client(PlayerId(0));
        for command in [
            Command::StartNewRound,
            Command::AdvancePhase,
            Command::ForceSkipPhase,
            Command::AssignRoles,
            Command::ClearRoomAssignments,
            Command::StopGame { crew_wins: true },
        ] {
            assert_eq!(
                core.execute(command, client),
                Err(CoreError::NotAuthoritative(client))
            );
        }
        assert_eq!(core.match_state(), MatchState::ReadyUp);
    }

    #[test]
    fn test_vote_commands_belong_to_the_voter() {
        let mut core = seated_core(3);
        core.execute(Command::StartNewRound, Authority::Server).unwrap();

        let voter = PlayerId(0);
        let target = PlayerId(1);
        let intruder = Authority::Client(PlayerId(2));
        assert!(core
            .execute(Command::InitiateVote { voter, target }, intruder)
            .is_err());
        assert!(core
            .execute(Command::InitiateVote { voter, target }, Authority::Client(voter))
            .is_ok());
        assert!(core
            .execute(Command::CancelVote { voter }, intruder)
            .is_err());
        assert!(core
            .execute(Command::ConfirmVote { voter }, Authority::Server)
            .is_ok());
    }

    #[test]
    fn test_station_commands_require_a_seat() {
        let mut core = seated_core(2);
        let station = StationId(0);
        let outsider = Authority::Client(PlayerId(77));
        assert!(core
            .execute(Command::EnterStation { player: PlayerId(77), station }, outsider)
            .is_err());
        assert!(core
            .execute(
                Command::DecreaseStationHealth { station, amount: 0 },
                Authority::Client(PlayerId(77))
            )
            .is_err());
        assert!(core
            .execute(
                Command::DecreaseStationHealth { station, amount: 0 },
                Authority::Client(PlayerId(0))
            )
            .is_ok());
    }

    #[test]
    fn test_room_override_requires_commander() {
        let mut core = seated_core(2);
        let room = core.add_room("engine", 1);
        let player = PlayerId(0);
        assert!(core
            .execute(Command::SetPlayerRoom { player, room }, Authority::Client(player))
            .is_err());
        assert!(core
            .execute(Command::SetPlayerRoom { player, room }, Authority::Server)
            .is_ok());
    }

    #[test]
    fn test_replica_drops_everything() {
        let mut core = MatchCore::new_replica(MatchConfig::default(), 42).unwrap();
        assert!(core.execute(Command::StartNewRound, Authority::Server).is_err());
    }
}
