//! # mh_core - Authoritative Social-Deduction Match Core
//!
//! Headless round/phase orchestration for a station-sabotage deduction game:
//! the phase cycle, commander elections, covert role assignment, the station
//! health economy, and next-night room assignment. The engine embedding this
//! crate owns rendering, movement and networking; it feeds commands in
//! through [`MatchCore::execute`] and drains [`CoreEvent`]s back out once per
//! tick.
//!
//! ## Features
//! - 100% deterministic per seed (same seed + same commands = same match)
//! - Single-writer replication model with explicit authority checks
//! - Tick-driven cooperative scheduler, no wall-clock dependency

// Large enum variants - boxing would require API changes
#![allow(clippy::large_enum_variant)]

pub mod command;
pub mod config;
pub mod core;
pub mod election;
pub mod error;
pub mod events;
pub mod phase;
pub mod players;
pub mod replication;
pub mod roles;
pub mod round;
pub mod scheduler;
pub mod snapshot;
pub mod spawn;
pub mod station;
pub mod types;

pub use crate::command::Command;
pub use crate::config::{DestroyBracket, MatchConfig, PreStepConfig};
pub use crate::core::MatchCore;
pub use crate::election::{CommanderElection, ElectionRecord, TallyOutcome};
pub use crate::error::{CoreError, Result};
pub use crate::events::{CoreEvent, EventBus};
pub use crate::phase::{next_phase, Phase};
pub use crate::players::{Player, PlayerRegistry, RoomAssignment, VoteState};
pub use crate::replication::{Authority, Replicated};
pub use crate::roles::{DisconnectOutcome, RoleAssignment};
pub use crate::round::{MatchOutcome, RoundEconomy};
pub use crate::scheduler::Tick;
pub use crate::snapshot::{MatchSnapshot, PlayerSnapshot, StationSnapshot};
pub use crate::spawn::{RoomConfig, SpawnAssignment};
pub use crate::station::{Station, StationRegistry};
pub use crate::types::{
    MatchState, PlayerId, PlayerStatus, Role, RoomId, StationId, VoteStatus, WinningSide,
};
