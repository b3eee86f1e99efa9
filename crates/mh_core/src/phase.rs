//! The fixed phase cycle and the state carried by one live phase instance.

use crate::config::MatchConfig;
use crate::scheduler::Tick;
use serde::{Deserialize, Serialize};

/// One segment of the round cycle. Exactly one instance is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
pub enum Phase {
    #[default]
    Invalid,
    Planning,
    Night,
    Voting,
    Discussion,
}

/// Fixed transition table. The cycle never varies:
/// Voting → Planning → Night → Discussion → Voting.
pub fn next_phase(current: Phase) -> Phase {
    match current {
        Phase::Voting => Phase::Planning,
        Phase::Planning => Phase::Night,
        Phase::Night => Phase::Discussion,
        Phase::Discussion => Phase::Voting,
        Phase::Invalid => Phase::Invalid,
    }
}

/// A pre-phase step in flight or pending, durations already in ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct PreStep {
    pub name: String,
    pub duration_ticks: Tick,
}

/// State of the one live phase.
///
/// A phase runs its pre-steps sequentially, then starts the countdown timer.
/// `ending` is set when the timer expires (or when an advance forces the
/// phase down).
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseInstance {
    pub phase: Phase,
    pub pre_steps: Vec<PreStep>,
    /// Index of the running pre-step, `None` once all steps finished.
    pub current_step: Option<usize>,
    /// Countdown deadline; set only after pre-steps complete.
    pub deadline: Option<Tick>,
    pub ending: bool,
}

impl PhaseInstance {
    pub fn new(phase: Phase, config: &MatchConfig) -> Self {
        let pre_steps = config
            .pre_steps(phase)
            .iter()
            .map(|s| PreStep { name: s.name.clone(), duration_ticks: config.ticks(s.duration_secs) })
            .collect();
        Self { phase, pre_steps, current_step: None, deadline: None, ending: false }
    }

    pub fn timer_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Ticks until the countdown expires, if the timer is running.
    pub fn remaining(&self, now: Tick) -> Option<Tick> {
        self.deadline.map(|d| d.saturating_sub(now))
    }
}

/// Holder for the live phase plus the advance re-entrancy guard.
#[derive(Debug, Default)]
pub struct PhaseMachine {
    pub current: Option<PhaseInstance>,
    /// True while an advance is tearing the current phase down. This is the
    /// listener-detach guard: end-of-phase behavior runs while the flag is
    /// held, so end-triggered side effects cannot re-enter the advance path;
    /// a nested advance request during teardown is a logged no-op.
    pub advancing: bool,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self { current: None, advancing: false }
    }

    pub fn current_phase(&self) -> Phase {
        self.current.as_ref().map(|i| i.phase).unwrap_or(Phase::Invalid)
    }
}
