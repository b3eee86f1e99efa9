//! Match configuration.
//!
//! All tunables live here with production defaults; the transport constructs
//! one `MatchConfig` per match and hands it to `MatchCore::new`.

use crate::error::{CoreError, Result};
use crate::phase::Phase;
use crate::scheduler::Tick;
use serde::{Deserialize, Serialize};

/// One pre-phase step: an ordered intro action (teleport, voiceover cue, ...)
/// executed by an external collaborator. The core only tracks its duration
/// and completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreStepConfig {
    pub name: String,
    pub duration_secs: f32,
}

impl PreStepConfig {
    pub fn new(name: &str, duration_secs: f32) -> Self {
        Self { name: name.to_string(), duration_secs }
    }
}

/// Stations-to-destroy bracket: matches with at least `min_players` connected
/// players use `stations` as the destruction target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyBracket {
    pub min_players: u32,
    pub stations: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Logical frames per second for the cooperative scheduler.
    pub ticks_per_second: u32,

    pub planning_secs: f32,
    pub night_secs: f32,
    pub voting_secs: f32,
    pub discussion_secs: f32,

    /// When an advance request arrives with more than this much time left,
    /// the timer is clamped to it so players see a final countdown.
    pub short_countdown_secs: f32,

    /// Hold-to-confirm delay before a pending vote or unvote commits.
    pub vote_confirm_secs: f32,

    pub min_moles: u32,
    pub max_moles: u32,
    /// Player counts below this use `min_moles`, at or above it `max_moles`.
    pub mole_threshold: u32,

    pub max_rounds: u32,
    pub max_players: u32,

    pub station_max_health: i32,
    pub max_decrease_per_round: i32,
    /// Extra decrease allowance while a player occupies the station.
    pub occupancy_bonus: i32,
    /// Default per-action health change; an explicit amount of 0 means
    /// "use this value".
    pub health_action_amount: i32,

    /// Sorted ascending by `min_players`; the last matching bracket wins.
    pub destroy_brackets: Vec<DestroyBracket>,

    pub planning_pre_steps: Vec<PreStepConfig>,
    pub night_pre_steps: Vec<PreStepConfig>,
    pub voting_pre_steps: Vec<PreStepConfig>,
    pub discussion_pre_steps: Vec<PreStepConfig>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 10,

            planning_secs: 60.0,
            night_secs: 180.0,
            voting_secs: 45.0,
            discussion_secs: 30.0,

            short_countdown_secs: 3.0,
            vote_confirm_secs: 1.5,

            min_moles: 1,
            max_moles: 2,
            mole_threshold: 6,

            max_rounds: 5,
            max_players: 8,

            station_max_health: 100,
            max_decrease_per_round: 20,
            occupancy_bonus: 5,
            health_action_amount: 10,

            destroy_brackets: vec![
                DestroyBracket { min_players: 0, stations: 2 },
                DestroyBracket { min_players: 5, stations: 3 },
                DestroyBracket { min_players: 7, stations: 4 },
            ],

            planning_pre_steps: vec![PreStepConfig::new("briefing", 2.0)],
            night_pre_steps: vec![PreStepConfig::new("deploy", 4.0)],
            voting_pre_steps: vec![PreStepConfig::new("podium-lineup", 3.0)],
            discussion_pre_steps: vec![PreStepConfig::new("recap", 2.0)],
        }
    }
}

impl MatchConfig {
    /// Convert a duration in seconds into scheduler ticks, never below 1.
    pub fn ticks(&self, secs: f32) -> Tick {
        let ticks = (secs * self.ticks_per_second as f32).round() as i64;
        ticks.max(1) as Tick
    }

    /// Timer duration of a phase, in seconds. Invalid has no timer.
    pub fn phase_duration_secs(&self, phase: Phase) -> f32 {
        match phase {
            Phase::Planning => self.planning_secs,
            Phase::Night => self.night_secs,
            Phase::Voting => self.voting_secs,
            Phase::Discussion => self.discussion_secs,
            Phase::Invalid => 0.0,
        }
    }

    pub fn pre_steps(&self, phase: Phase) -> &[PreStepConfig] {
        match phase {
            Phase::Planning => &self.planning_pre_steps,
            Phase::Night => &self.night_pre_steps,
            Phase::Voting => &self.voting_pre_steps,
            Phase::Discussion => &self.discussion_pre_steps,
            Phase::Invalid => &[],
        }
    }

    /// Destruction target for a given connected-player count.
    pub fn stations_to_destroy(&self, player_count: u32) -> i32 {
        let mut target = 0;
        for bracket in &self.destroy_brackets {
            if player_count >= bracket.min_players {
                target = bracket.stations;
            }
        }
        target
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_second == 0 {
            return Err(CoreError::InvalidConfig("ticks_per_second must be positive".into()));
        }
        if self.min_moles > self.max_moles {
            return Err(CoreError::InvalidConfig("min_moles exceeds max_moles".into()));
        }
        if self.max_rounds == 0 {
            return Err(CoreError::InvalidConfig("max_rounds must be positive".into()));
        }
        if self.max_players == 0 {
            return Err(CoreError::InvalidConfig("max_players must be positive".into()));
        }
        if self.station_max_health <= 0 {
            return Err(CoreError::InvalidConfig("station_max_health must be positive".into()));
        }
        if self.max_decrease_per_round < 0 || self.occupancy_bonus < 0 {
            return Err(CoreError::InvalidConfig("decrease caps must be non-negative".into()));
        }
        if self.destroy_brackets.is_empty() {
            return Err(CoreError::InvalidConfig("destroy_brackets must not be empty".into()));
        }
        for pair in self.destroy_brackets.windows(2) {
            if pair[0].min_players > pair[1].min_players {
                return Err(CoreError::InvalidConfig(
                    "destroy_brackets must be sorted by min_players".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_ticks_rounds_and_clamps() {
        let config = MatchConfig::default();
        assert_eq!(config.ticks(1.5), 15);
        assert_eq!(config.ticks(0.0), 1);
    }

    #[test]
    fn test_destroy_bracket_selection() {
        let config = MatchConfig::default();
        assert_eq!(config.stations_to_destroy(2), 2);
        assert_eq!(config.stations_to_destroy(5), 3);
        assert_eq!(config.stations_to_destroy(8), 4);
    }

    #[test]
    fn test_invalid_bracket_order_rejected() {
        let mut config = MatchConfig::default();
        config.destroy_brackets = vec![
            DestroyBracket { min_players: 5, stations: 3 },
            DestroyBracket { min_players: 0, stations: 2 },
        ];
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }
}
