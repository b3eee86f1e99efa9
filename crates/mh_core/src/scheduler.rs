//! Tick-driven cooperative scheduler.
//!
//! All long-running operations (phase countdowns, vote confirmation delays,
//! drain loops, pre-phase steps) are suspended tasks in one flat list. Each
//! task resumes either at a tick deadline or when a state predicate becomes
//! true; the list is polled once per logical frame and suspension never
//! blocks other tasks. Every task names an owner so that destroying the
//! owner (a phase ending, a player disconnecting) cancels its pending work.

use crate::phase::Phase;
use crate::types::{PlayerId, StationId};

/// Logical frame counter. One tick is one scheduler poll.
pub type Tick = u64;

/// Who a task belongs to, for bulk cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOwner {
    Match,
    Phase(Phase),
    Player(PlayerId),
}

/// State predicates a suspended task can wait on. Evaluated by the core once
/// per tick against current match state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatePredicate {
    /// The previous phase instance has been destroyed.
    PhaseCleared,
}

/// When a suspended task resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    At(Tick),
    When(StatePredicate),
}

/// What to do when a task resumes. Dispatched by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// The current phase's countdown expired; request an advance.
    PhaseTimerExpired,
    /// The running pre-phase step signalled completion.
    PreStepComplete,
    /// Instantiate the next phase once the old one is gone.
    InstantiatePhase(Phase),
    /// A pending vote auto-confirms.
    VoteConfirm(PlayerId),
    /// A pending unvote auto-confirms.
    UnvoteConfirm(PlayerId),
    /// One drain decrement for a station during Night.
    DrainTick(StationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredTask {
    pub owner: TaskOwner,
    pub resume: Resume,
    pub kind: TaskKind,
}

/// Flat task list plus the logical clock.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Tick,
    tasks: Vec<DeferredTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { now: 0, tasks: Vec::new() }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Advance the clock one logical frame.
    pub fn step(&mut self) -> Tick {
        self.now += 1;
        self.now
    }

    pub fn schedule(&mut self, owner: TaskOwner, resume: Resume, kind: TaskKind) {
        self.tasks.push(DeferredTask { owner, resume, kind });
    }

    /// Cancel every pending task belonging to `owner`.
    pub fn cancel_owner(&mut self, owner: TaskOwner) {
        self.tasks.retain(|t| t.owner != owner);
    }

    /// Cancel tasks matching an arbitrary filter (used for single-task
    /// cancellation such as one player's pending vote confirm).
    pub fn cancel_where<F: Fn(&DeferredTask) -> bool>(&mut self, doomed: F) {
        self.tasks.retain(|t| !doomed(t));
    }

    pub fn has_pending<F: Fn(&DeferredTask) -> bool>(&self, matches: F) -> bool {
        self.tasks.iter().any(matches)
    }

    /// Remove and return every task that is due this tick. Deadline tasks are
    /// due when the clock reaches them; predicate tasks when `predicate_true`
    /// says so. Returned in scheduling order.
    pub fn take_due<F: Fn(StatePredicate) -> bool>(&mut self, predicate_true: F) -> Vec<DeferredTask> {
        let now = self.now;
        let mut due = Vec::new();
        let mut remaining = Vec::with_capacity(self.tasks.len());
        for task in self.tasks.drain(..) {
            let ready = match task.resume {
                Resume::At(deadline) => deadline <= now,
                Resume::When(pred) => predicate_true(pred),
            };
            if ready {
                due.push(task);
            } else {
                remaining.push(task);
            }
        }
        self.tasks = remaining;
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_task_resumes_on_time() {
        let mut sched = Scheduler::new();
        sched.schedule(TaskOwner::Match, Resume::At(2), TaskKind::PhaseTimerExpired);
        sched.step();
        assert!(sched.take_due(|_| false).is_empty());
        sched.step();
        let due = sched.take_due(|_| false);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].kind, TaskKind::PhaseTimerExpired);
    }

    #[test]
    fn test_predicate_task_waits_for_state() {
        let mut sched = Scheduler::new();
        sched.schedule(
            TaskOwner::Match,
            Resume::When(StatePredicate::PhaseCleared),
            TaskKind::InstantiatePhase(Phase::Night),
        );
        sched.step();
        assert!(sched.take_due(|_| false).is_empty());
        let due = sched.take_due(|_| true);
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn test_cancel_owner_drops_only_that_owner() {
        let mut sched = Scheduler::new();
        sched.schedule(TaskOwner::Phase(Phase::Night), Resume::At(5), TaskKind::PhaseTimerExpired);
        sched.schedule(
            TaskOwner::Player(PlayerId(1)),
            Resume::At(5),
            TaskKind::VoteConfirm(PlayerId(1)),
        );
        sched.cancel_owner(TaskOwner::Phase(Phase::Night));
        for _ in 0..5 {
            sched.step();
        }
        let due = sched.take_due(|_| false);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].kind, TaskKind::VoteConfirm(PlayerId(1)));
    }
}
