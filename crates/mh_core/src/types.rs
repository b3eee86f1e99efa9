//! Shared identifier and state types for the match core.

use serde::{Deserialize, Serialize};

/// Stable identifier for a connected player, assigned by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Stable identifier for a minigame station, assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationId(pub u32);

/// Room tag. Stations and spawn assignments reference rooms by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u16);

/// Covert role, assigned once per match by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Unknown,
    Crewmate,
    Mole,
}

/// Public per-player status. At most one player holds `Commander`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlayerStatus {
    #[default]
    None,
    Commander,
}

/// Coarse match lifecycle, owned by the round economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchState {
    #[default]
    ReadyUp,
    Gameplay,
    GameEnd,
}

/// Derived state of a player's vote, see `VoteState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VoteStatus {
    #[default]
    None,
    Voting,
    Voted,
    Unvoting,
}

/// Which side won when a match ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinningSide {
    Crew,
    Moles,
}
