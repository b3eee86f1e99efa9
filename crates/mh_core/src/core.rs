//! The match context object: owns every subsystem, the scheduler, and the
//! event bus, and drives the phase cycle.
//!
//! One `MatchCore` exists per match. The authoritative instance mutates
//! state and emits broadcast events; replicas apply nothing locally and
//! reject commands. There is no global registry: everything reachable from
//! the match is reachable through this struct.

use crate::config::MatchConfig;
use crate::election::CommanderElection;
use crate::error::{CoreError, Result};
use crate::events::{CoreEvent, EventBus};
use crate::phase::{next_phase, Phase, PhaseInstance, PhaseMachine};
use crate::players::{PlayerRegistry, VoteBegin};
use crate::replication::Authority;
use crate::roles::{DisconnectOutcome, RoleAssignment};
use crate::round::{MatchOutcome, RoundEconomy};
use crate::scheduler::{DeferredTask, Resume, Scheduler, StatePredicate, TaskKind, TaskOwner, Tick};
use crate::spawn::SpawnAssignment;
use crate::station::StationRegistry;
use crate::types::{MatchState, PlayerId, PlayerStatus, Role, RoomId, StationId, WinningSide};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub struct MatchCore {
    config: MatchConfig,
    is_server: bool,
    rng: ChaCha8Rng,
    scheduler: Scheduler,
    events: EventBus,
    players: PlayerRegistry,
    stations: StationRegistry,
    spawn: SpawnAssignment,
    roles: RoleAssignment,
    election: CommanderElection,
    round: RoundEconomy,
    phases: PhaseMachine,
    outcome: Option<MatchOutcome>,
}

impl MatchCore {
    /// Construct the authoritative instance. The seed fully determines every
    /// random pick in the match.
    pub fn new(config: MatchConfig, seed: u64) -> Result<Self> {
        Self::build(config, seed, true)
    }

    /// Construct a non-authoritative replica: commands are rejected and no
    /// tasks run. Replicas render state received from the transport.
    pub fn new_replica(config: MatchConfig, seed: u64) -> Result<Self> {
        Self::build(config, seed, false)
    }

    fn build(config: MatchConfig, seed: u64, is_server: bool) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            is_server,
            rng: ChaCha8Rng::seed_from_u64(seed),
            scheduler: Scheduler::new(),
            events: EventBus::new(),
            players: PlayerRegistry::new(),
            stations: StationRegistry::new(),
            spawn: SpawnAssignment::new(),
            roles: RoleAssignment::new(),
            election: CommanderElection::new(),
            round: RoundEconomy::new(),
            phases: PhaseMachine::new(),
            outcome: None,
        })
    }

    // ========================
    // Scene setup
    // ========================

    pub fn add_room(&mut self, name: &str, capacity: u32) -> RoomId {
        self.spawn.add_room(name, capacity)
    }

    pub fn add_station(&mut self, room: RoomId, can_assign: bool) -> Result<StationId> {
        if self.spawn.capacity(room).is_none() {
            return Err(CoreError::UnknownRoom(room));
        }
        Ok(self.stations.add(room, can_assign, &self.config))
    }

    pub fn link_stations(&mut self, a: StationId, b: StationId) -> Result<()> {
        self.stations.link(a, b)
    }

    // ========================
    // Connection lifecycle
    // ========================

    /// Seat a new player. Only legal during ReadyUp.
    pub fn connect_player(&mut self, id: PlayerId) -> Result<()> {
        if self.round.state() != MatchState::ReadyUp {
            return Err(CoreError::InvalidCommand("players can only join during ready-up".into()));
        }
        self.players.connect(id, self.config.max_players)?;
        Ok(())
    }

    /// Handle a disconnect at any tick. Role counters move mid-phase and the
    /// match may end immediately when the last member of a role departs.
    pub fn disconnect_player(&mut self, id: PlayerId) {
        let Some(player) = self.players.disconnect(id) else {
            log::warn!("disconnect for unknown player {:?} dropped", id);
            return;
        };
        self.stations.evict(id);
        self.scheduler.cancel_owner(TaskOwner::Player(id));

        let role = *player.role.get();
        match self.roles.on_disconnect(role, self.round.state()) {
            DisconnectOutcome::Ignored => {}
            DisconnectOutcome::Decremented(Role::Mole) => {
                let count = self.roles.mole_count.value();
                self.events.emit(CoreEvent::MoleCountChanged { count });
            }
            DisconnectOutcome::Decremented(_) => {
                let count = self.roles.crew_count.value();
                self.events.emit(CoreEvent::CrewCountChanged { count });
            }
            DisconnectOutcome::EndMatch(side) => {
                match role {
                    Role::Mole => {
                        let count = self.roles.mole_count.value();
                        self.events.emit(CoreEvent::MoleCountChanged { count });
                    }
                    _ => {
                        let count = self.roles.crew_count.value();
                        self.events.emit(CoreEvent::CrewCountChanged { count });
                    }
                }
                self.end_match(MatchOutcome::Forced(side));
            }
        }
    }

    // ========================
    // Accessors
    // ========================

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn now(&self) -> Tick {
        self.scheduler.now()
    }

    pub fn phase(&self) -> Phase {
        self.phases.current_phase()
    }

    pub fn match_state(&self) -> MatchState {
        self.round.state()
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn stations(&self) -> &StationRegistry {
        &self.stations
    }

    pub fn spawn(&self) -> &SpawnAssignment {
        &self.spawn
    }

    pub fn roles(&self) -> &RoleAssignment {
        &self.roles
    }

    pub fn election(&self) -> &CommanderElection {
        &self.election
    }

    pub fn round(&self) -> &RoundEconomy {
        &self.round
    }

    /// Pending broadcast events, oldest first.
    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        self.events.drain()
    }

    // ========================
    // Tick loop
    // ========================

    /// Advance one logical frame: bump the clock and resume every due task.
    /// Replicas keep a clock but run nothing.
    pub fn tick(&mut self) {
        self.scheduler.step();
        if !self.is_server {
            return;
        }
        let phase_cleared = self.phases.current.is_none();
        let due = self.scheduler.take_due(|pred| match pred {
            StatePredicate::PhaseCleared => phase_cleared,
        });
        for task in due {
            self.run_task(task);
        }
    }

    fn run_task(&mut self, task: DeferredTask) {
        match task.kind {
            TaskKind::PhaseTimerExpired => {
                if let Some(instance) = self.phases.current.as_mut() {
                    instance.ending = true;
                }
                self.advance_phase();
            }
            TaskKind::PreStepComplete => self.pre_step_finished(),
            TaskKind::InstantiatePhase(phase) => self.start_phase(phase),
            TaskKind::VoteConfirm(voter) | TaskKind::UnvoteConfirm(voter) => {
                if let Some(player) = self.players.get_mut(voter) {
                    player.vote.confirm();
                }
            }
            TaskKind::DrainTick(station) => self.drain_tick(station),
        }
    }

    // ========================
    // Match lifecycle
    // ========================

    /// Begin gameplay: lock in roles and the destruction threshold, then
    /// start the phase cycle at Voting.
    pub(crate) fn start_new_round(&mut self) -> Result<()> {
        if self.round.state() != MatchState::ReadyUp {
            return Err(CoreError::InvalidCommand("match already started".into()));
        }
        if self.players.is_empty() {
            return Err(CoreError::InvalidCommand("no players connected".into()));
        }
        self.set_match_state(MatchState::Gameplay);
        self.assign_roles();
        if self.round.begin_gameplay(&self.config, self.players.len() as u32) {
            let remaining = self.round.stations_remaining.value();
            self.events.emit(CoreEvent::StationsRemainingChanged { remaining });
        }
        self.events.emit(CoreEvent::RoundChanged { round: self.round.round.value() });
        self.start_phase(Phase::Voting);
        Ok(())
    }

    pub(crate) fn assign_roles(&mut self) {
        let (moles, crew) = self.roles.assign(&mut self.players, &self.config, &mut self.rng);
        self.events.emit(CoreEvent::MoleCountChanged { count: moles });
        self.events.emit(CoreEvent::CrewCountChanged { count: crew });
    }

    pub(crate) fn set_match_state(&mut self, state: MatchState) {
        if self.round.set_state(state) {
            self.events.emit(CoreEvent::MatchStateChanged { state });
        }
        if state == MatchState::GameEnd {
            self.halt();
        }
    }

    /// End the match with a definite outcome, tearing down all pending work.
    pub(crate) fn end_match(&mut self, outcome: MatchOutcome) {
        if self.round.state() == MatchState::GameEnd {
            return;
        }
        log::debug!("match over: {:?} win", outcome.winner());
        self.outcome = Some(outcome);
        self.set_match_state(MatchState::GameEnd);
    }

    /// Cancel every in-flight task and destroy the live phase.
    fn halt(&mut self) {
        self.scheduler.cancel_where(|_| true);
        self.phases.current = None;
        self.phases.advancing = false;
    }

    // ========================
    // Phase machinery
    // ========================

    fn start_phase(&mut self, phase: Phase) {
        if self.round.state() != MatchState::Gameplay {
            // The match ended while the transition was pending.
            return;
        }
        self.phases.current = Some(PhaseInstance::new(phase, &self.config));
        self.events.emit(CoreEvent::PhaseChanged { phase });
        self.on_phase_start(phase);
        if self.round.state() != MatchState::Gameplay {
            // Phase-start bookkeeping can end the match (win check).
            return;
        }
        self.launch_phase_body(phase);
    }

    /// Kick off the first pre-step, or the timer when there are none.
    fn launch_phase_body(&mut self, phase: Phase) {
        let now = self.scheduler.now();
        let first_step = self.phases.current.as_mut().and_then(|instance| {
            if instance.pre_steps.is_empty() {
                None
            } else {
                instance.current_step = Some(0);
                Some(instance.pre_steps[0].duration_ticks)
            }
        });
        match first_step {
            Some(duration) => self.scheduler.schedule(
                TaskOwner::Phase(phase),
                Resume::At(now + duration),
                TaskKind::PreStepComplete,
            ),
            None => self.start_phase_timer(),
        }
    }

    /// The running pre-step signalled completion: start the next one, or the
    /// countdown once the list is exhausted.
    fn pre_step_finished(&mut self) {
        let now = self.scheduler.now();
        let mut schedule: Option<(Phase, Tick)> = None;
        let mut start_timer = false;
        if let Some(instance) = self.phases.current.as_mut() {
            match instance.current_step {
                Some(step) if step + 1 < instance.pre_steps.len() && !instance.ending => {
                    instance.current_step = Some(step + 1);
                    schedule = Some((instance.phase, instance.pre_steps[step + 1].duration_ticks));
                }
                _ => {
                    instance.current_step = None;
                    start_timer = !instance.timer_running();
                }
            }
        }
        if let Some((phase, duration)) = schedule {
            self.scheduler.schedule(
                TaskOwner::Phase(phase),
                Resume::At(now + duration),
                TaskKind::PreStepComplete,
            );
        }
        if start_timer {
            self.start_phase_timer();
        }
    }

    fn start_phase_timer(&mut self) {
        let now = self.scheduler.now();
        let Some(instance) = self.phases.current.as_mut() else { return };
        let phase = instance.phase;
        let duration = self.config.ticks(self.config.phase_duration_secs(phase));
        instance.deadline = Some(now + duration);
        self.scheduler.schedule(
            TaskOwner::Phase(phase),
            Resume::At(now + duration),
            TaskKind::PhaseTimerExpired,
        );
        if phase == Phase::Night {
            self.start_drain(now);
        }
    }

    /// Request a phase advance. Authoritative only.
    ///
    /// The protocol guards a re-entrancy hazard: the `advancing` flag is
    /// held for the whole teardown, detaching end listeners before the end
    /// behavior runs so end-triggered side effects cannot recursively
    /// advance again. An advance arriving with plenty of timer left clamps
    /// the countdown instead of cutting straight over; an advance arriving
    /// mid-pre-step forces the phase into its ending state and lets the
    /// (now short) timer finish the job.
    pub fn advance_phase(&mut self) {
        debug_assert!(self.is_server, "advance_phase on a non-authoritative process");
        if !self.is_server {
            log::error!("advance_phase rejected: not the authority");
            return;
        }
        if self.phases.advancing {
            log::debug!("re-entrant advance request ignored");
            return;
        }
        let Some(phase) = self.phases.current.as_ref().map(|i| i.phase) else {
            log::warn!("advance request with no active phase dropped");
            return;
        };

        self.phases.advancing = true;
        self.before_phase_end(phase);

        let now = self.scheduler.now();
        let short = self.config.ticks(self.config.short_countdown_secs);

        // Clamp to the final countdown when plenty of timer remains. The
        // next advance request proceeds normally.
        let mut clamped = false;
        if let Some(instance) = self.phases.current.as_mut() {
            if !instance.ending {
                if let Some(deadline) = instance.deadline {
                    if deadline.saturating_sub(now) > short {
                        instance.deadline = Some(now + short);
                        clamped = true;
                    }
                }
            }
        }
        if clamped {
            self.scheduler.cancel_where(|t| {
                t.owner == TaskOwner::Phase(phase) && t.kind == TaskKind::PhaseTimerExpired
            });
            self.scheduler.schedule(
                TaskOwner::Phase(phase),
                Resume::At(now + short),
                TaskKind::PhaseTimerExpired,
            );
            self.phases.advancing = false;
            return;
        }

        // Not ending yet: force the ending state, terminating any in-flight
        // pre-step; the timer expiry re-invokes this method.
        let mut forced_without_timer = false;
        let mut forced = false;
        if let Some(instance) = self.phases.current.as_mut() {
            if !instance.ending {
                instance.ending = true;
                instance.current_step = None;
                forced = true;
                if instance.deadline.is_none() {
                    instance.deadline = Some(now + short);
                    forced_without_timer = true;
                }
            }
        }
        if forced {
            self.scheduler.cancel_where(|t| {
                t.owner == TaskOwner::Phase(phase) && t.kind == TaskKind::PreStepComplete
            });
            if forced_without_timer {
                self.scheduler.schedule(
                    TaskOwner::Phase(phase),
                    Resume::At(now + short),
                    TaskKind::PhaseTimerExpired,
                );
            }
            self.phases.advancing = false;
            return;
        }

        // Ending confirmed: run end behavior, destroy the instance, and
        // instantiate the successor once destruction is observed.
        let next = next_phase(phase);
        self.on_phase_end(phase);
        self.scheduler.cancel_owner(TaskOwner::Phase(phase));
        self.phases.current = None;
        if self.round.state() == MatchState::Gameplay {
            self.scheduler.schedule(
                TaskOwner::Match,
                Resume::When(StatePredicate::PhaseCleared),
                TaskKind::InstantiatePhase(next),
            );
        }
        self.phases.advancing = false;
    }

    /// Debug/administrative skip: terminate the current pre-step and begin
    /// the timer early.
    pub(crate) fn force_skip_phase(&mut self) {
        if !self.is_server {
            log::error!("force_skip_phase rejected: not the authority");
            return;
        }
        let Some(instance) = self.phases.current.as_mut() else {
            log::warn!("force-skip with no active phase dropped");
            return;
        };
        let phase = instance.phase;
        let timer_running = instance.timer_running();
        instance.current_step = None;
        self.scheduler.cancel_where(|t| {
            t.owner == TaskOwner::Phase(phase) && t.kind == TaskKind::PreStepComplete
        });
        if !timer_running {
            self.start_phase_timer();
        }
    }

    fn before_phase_end(&mut self, phase: Phase) {
        log::debug!("phase {:?} ending at tick {}", phase, self.scheduler.now());
    }

    fn on_phase_start(&mut self, phase: Phase) {
        match phase {
            Phase::Voting => {
                self.finalize_pending_votes();
                let seats = self.players.seated_ids();
                self.election.choose_candidates(&seats, &mut self.rng);
                let (candidate_a, candidate_b) = self.election.candidates();
                self.events.emit(CoreEvent::NewCandidates { candidate_a, candidate_b });
            }
            Phase::Night => {
                self.spawn.fill(&mut self.players, &mut self.rng);
                self.events.emit(CoreEvent::RoomAssignmentsUpdated);
                self.stations.snapshot_round_start();
            }
            Phase::Discussion => self.discussion_bookkeeping(),
            Phase::Planning | Phase::Invalid => {}
        }
    }

    fn on_phase_end(&mut self, phase: Phase) {
        match phase {
            Phase::Voting => self.run_election(),
            // Night drain tasks die with the phase owner.
            _ => {}
        }
    }

    /// Round bookkeeping at Discussion start: fold in dead stations, check
    /// the destruction win, then bump the round counter.
    fn discussion_bookkeeping(&mut self) {
        let dead = self.stations.dead_rooms();
        self.stations.retire_dead();
        if self.round.record_destroyed(dead) {
            let remaining = self.round.stations_remaining.value();
            self.events.emit(CoreEvent::StationsRemainingChanged { remaining });
        }
        if let Some(outcome) = self.round.check_destruction() {
            self.end_match(outcome);
            return;
        }
        match self.round.advance_round(&self.config) {
            Some(outcome) => {
                self.end_match(outcome);
            }
            None => {
                let round = self.round.round.value();
                self.events.emit(CoreEvent::RoundChanged { round });
                self.stations.reset_round();
            }
        }
    }

    // ========================
    // Night drain
    // ========================

    fn drain_interval(&self) -> Tick {
        let duration = self.config.ticks(self.config.night_secs);
        (duration / (self.config.max_decrease_per_round as u64 + 1)).max(1)
    }

    fn start_drain(&mut self, now: Tick) {
        let interval = self.drain_interval();
        let alive: Vec<StationId> =
            self.stations.iter().filter(|s| !s.is_dead()).map(|s| s.id).collect();
        for station in alive {
            self.scheduler.schedule(
                TaskOwner::Phase(Phase::Night),
                Resume::At(now + interval),
                TaskKind::DrainTick(station),
            );
        }
    }

    fn drain_tick(&mut self, station: StationId) {
        if self.phases.current_phase() != Phase::Night {
            return;
        }
        match self.stations.decrease_health(station, 1, Phase::Night, &self.config) {
            Ok(Some(health)) => {
                self.events.emit(CoreEvent::StationHealthChanged { station, health })
            }
            Ok(None) => {}
            Err(err) => log::warn!("drain dropped: {}", err),
        }
        let alive = self.stations.get(station).map(|s| !s.is_dead()).unwrap_or(false);
        if alive {
            let now = self.scheduler.now();
            self.scheduler.schedule(
                TaskOwner::Phase(Phase::Night),
                Resume::At(now + self.drain_interval()),
                TaskKind::DrainTick(station),
            );
        }
    }

    // ========================
    // Station health commands
    // ========================

    pub(crate) fn increase_station_health(
        &mut self,
        station: StationId,
        amount: i32,
    ) -> Result<()> {
        let phase = self.phases.current_phase();
        if let Some(health) =
            self.stations.increase_health(station, amount, phase, &self.config)?
        {
            self.events.emit(CoreEvent::StationHealthChanged { station, health });
        }
        Ok(())
    }

    pub(crate) fn decrease_station_health(
        &mut self,
        station: StationId,
        amount: i32,
    ) -> Result<()> {
        let phase = self.phases.current_phase();
        if let Some(health) =
            self.stations.decrease_health(station, amount, phase, &self.config)?
        {
            self.events.emit(CoreEvent::StationHealthChanged { station, health });
        }
        Ok(())
    }

    // ========================
    // Voting
    // ========================

    pub(crate) fn initiate_vote(
        &mut self,
        caller: Authority,
        voter: PlayerId,
        target: PlayerId,
    ) -> Result<()> {
        if !self.players.contains(target) {
            return Err(CoreError::UnknownPlayer(target));
        }
        let confirm_delay = self.config.ticks(self.config.vote_confirm_secs);
        let now = self.scheduler.now();
        let player = self.players.get_mut(voter).ok_or(CoreError::UnknownPlayer(voter))?;
        let begun = player.vote.begin(caller, target)?;
        self.cancel_vote_tasks(voter);
        let kind = match begun {
            VoteBegin::Voting => TaskKind::VoteConfirm(voter),
            VoteBegin::Unvoting => TaskKind::UnvoteConfirm(voter),
        };
        self.scheduler.schedule(TaskOwner::Player(voter), Resume::At(now + confirm_delay), kind);
        Ok(())
    }

    pub(crate) fn cancel_vote(&mut self, voter: PlayerId) -> Result<()> {
        let player = self.players.get_mut(voter).ok_or(CoreError::UnknownPlayer(voter))?;
        player.vote.cancel();
        self.cancel_vote_tasks(voter);
        Ok(())
    }

    pub(crate) fn confirm_vote(&mut self, voter: PlayerId) -> Result<()> {
        let player = self.players.get_mut(voter).ok_or(CoreError::UnknownPlayer(voter))?;
        player.vote.confirm();
        self.cancel_vote_tasks(voter);
        Ok(())
    }

    fn cancel_vote_tasks(&mut self, voter: PlayerId) {
        self.scheduler.cancel_where(|t| {
            matches!(t.kind,
                TaskKind::VoteConfirm(v) | TaskKind::UnvoteConfirm(v) if v == voter)
        });
    }

    /// Entering Voting: pending votes are force-confirmed (or cleared on the
    /// unvote path) so the ballot starts consistent.
    fn finalize_pending_votes(&mut self) {
        let pending: Vec<PlayerId> =
            self.players.iter().filter(|p| p.vote.has_pending()).map(|p| p.id).collect();
        for voter in pending {
            self.cancel_vote_tasks(voter);
            if let Some(player) = self.players.get_mut(voter) {
                player.vote.confirm();
            }
        }
    }

    /// Voting-phase end: tally confirmed votes, resolve the winner, hand the
    /// commander role over, and clear the ballot.
    fn run_election(&mut self) {
        let votes: Vec<PlayerId> =
            self.players.iter().filter_map(|p| *p.vote.current_vote.get()).collect();
        let outcome = CommanderElection::tally(votes.into_iter());
        let live = self.players.seated_ids();
        let winner = self.election.resolve_winner(&outcome, &live, &mut self.rng);

        // Previous commander steps down before the handoff.
        if let Some(previous) = self.election.commander() {
            if let Some(player) = self.players.get_mut(previous) {
                player.status.set_server(PlayerStatus::None);
            }
        }
        if let Some(id) = winner {
            if let Some(player) = self.players.get_mut(id) {
                player.status.set_server(PlayerStatus::Commander);
            }
        }
        if self.election.install(winner) {
            self.events.emit(CoreEvent::NewCommander { commander: winner });
        }

        for player in self.players.iter_mut() {
            player.vote.clear();
        }
        self.scheduler.cancel_where(|t| {
            matches!(t.kind, TaskKind::VoteConfirm(_) | TaskKind::UnvoteConfirm(_))
        });
    }

    // ========================
    // Room assignment commands
    // ========================

    pub(crate) fn set_player_room(&mut self, player: PlayerId, room: RoomId) -> Result<()> {
        if !self.players.contains(player) {
            return Err(CoreError::UnknownPlayer(player));
        }
        if self.spawn.capacity(room).is_none() {
            return Err(CoreError::UnknownRoom(room));
        }
        self.spawn.set_room(&mut self.players, player, room);
        self.events.emit(CoreEvent::RoomAssignmentsUpdated);
        Ok(())
    }

    pub(crate) fn clear_room_assignments(&mut self) {
        SpawnAssignment::clear_all(&mut self.players);
        self.events.emit(CoreEvent::RoomAssignmentsUpdated);
    }

    // ========================
    // Occupancy
    // ========================

    pub(crate) fn enter_station(&mut self, player: PlayerId, station: StationId) -> Result<()> {
        if !self.players.contains(player) {
            return Err(CoreError::UnknownPlayer(player));
        }
        self.stations.enter(station, player)
    }

    pub(crate) fn leave_station(&mut self, player: PlayerId, station: StationId) -> Result<()> {
        self.stations.leave(station, player)
    }

    // ========================
    // Forced stop
    // ========================

    pub(crate) fn stop_game(&mut self, crew_wins: bool) {
        let side = if crew_wins { WinningSide::Crew } else { WinningSide::Moles };
        self.end_match(MatchOutcome::Forced(side));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    /// One tick per second keeps the arithmetic in the assertions readable.
    fn test_config() -> MatchConfig {
        MatchConfig {
            ticks_per_second: 1,
            planning_secs: 5.0,
            night_secs: 10.0,
            voting_secs: 5.0,
            discussion_secs: 4.0,
            short_countdown_secs: 2.0,
            vote_confirm_secs: 1.0,
            ..MatchConfig::default()
        }
    }

    fn started_core(config: MatchConfig, players: u32) -> MatchCore {
        let mut core = MatchCore::new(config, 42).unwrap();
        let reactor = core.add_room("reactor", 2);
        let comms = core.add_room("comms", 1);
        core.add_station(reactor, true).unwrap();
        core.add_station(comms, true).unwrap();
        for i in 0..players {
            core.connect_player(PlayerId(i)).unwrap();
        }
        core.execute(Command::StartNewRound, Authority::Server).unwrap();
        core
    }

    fn run_until_phase(core: &mut MatchCore, phase: Phase, max_ticks: u32) {
        for _ in 0..max_ticks {
            core.tick();
            if core.phase() == phase {
                return;
            }
        }
        panic!("phase {:?} not reached within {} ticks", phase, max_ticks);
    }

    fn run_until_over(core: &mut MatchCore, max_ticks: u32) {
        for _ in 0..max_ticks {
            core.tick();
            if core.match_state() == MatchState::GameEnd {
                return;
            }
        }
        panic!("match did not end within {} ticks", max_ticks);
    }

    #[test]
    fn test_start_new_round_enters_voting_and_announces() {
        let mut core = started_core(test_config(), 4);
        assert_eq!(core.match_state(), MatchState::Gameplay);
        assert_eq!(core.phase(), Phase::Voting);

        let events = core.drain_events();
        assert!(events.contains(&CoreEvent::MatchStateChanged { state: MatchState::Gameplay }));
        assert!(events.contains(&CoreEvent::RoundChanged { round: 1 }));
        assert!(events.contains(&CoreEvent::PhaseChanged { phase: Phase::Voting }));
        assert!(events
            .iter()
            .any(|e| matches!(e, CoreEvent::NewCandidates { .. })));
        assert!(events.contains(&CoreEvent::MoleCountChanged { count: 1 }));
        assert!(events.contains(&CoreEvent::CrewCountChanged { count: 3 }));
    }

    #[test]
    fn test_phase_cycle_runs_in_order() {
        let mut core = started_core(test_config(), 4);
        run_until_phase(&mut core, Phase::Planning, 32);
        run_until_phase(&mut core, Phase::Night, 32);
        run_until_phase(&mut core, Phase::Discussion, 64);
        run_until_phase(&mut core, Phase::Voting, 32);
        assert_eq!(core.round().round.value(), 2);
        assert_eq!(core.match_state(), MatchState::Gameplay);
    }

    #[test]
    fn test_start_new_round_requires_ready_up_and_players() {
        let mut core = MatchCore::new(test_config(), 1).unwrap();
        assert!(core.start_new_round().is_err());
        core.connect_player(PlayerId(0)).unwrap();
        core.start_new_round().unwrap();
        assert!(core.start_new_round().is_err());
        assert!(core.connect_player(PlayerId(1)).is_err());
    }

    #[test]
    fn test_sole_mole_disconnect_ends_match_for_crew_immediately() {
        // Below the threshold the lobby gets exactly one mole.
        let mut core = started_core(test_config(), 2);
        let mole = core
            .players
            .iter()
            .find(|p| *p.role.get() == Role::Mole)
            .map(|p| p.id)
            .unwrap();

        core.disconnect_player(mole);

        assert_eq!(core.match_state(), MatchState::GameEnd);
        assert_eq!(core.outcome(), Some(MatchOutcome::Forced(WinningSide::Crew)));
        assert_eq!(core.phase(), Phase::Invalid);
        let events = core.drain_events();
        assert!(events.contains(&CoreEvent::MoleCountChanged { count: 0 }));
        assert!(events.contains(&CoreEvent::MatchStateChanged { state: MatchState::GameEnd }));
        // No pending work survives the end of the match.
        assert!(!core.scheduler.has_pending(|_| true));
    }

    #[test]
    fn test_advance_clamps_then_proceeds() {
        let mut core = started_core(test_config(), 4);
        // Tick through the voting pre-step until the countdown runs.
        for _ in 0..8 {
            core.tick();
            if core.phases.current.as_ref().is_some_and(|i| i.timer_running()) {
                break;
            }
        }
        let short = core.config.ticks(core.config.short_countdown_secs);

        core.advance_phase();
        let instance = core.phases.current.as_ref().unwrap();
        assert_eq!(instance.phase, Phase::Voting);
        assert!(!instance.ending);
        assert_eq!(instance.remaining(core.now()), Some(short));

        // The countdown finishes the advance on its own.
        run_until_phase(&mut core, Phase::Planning, short as u32 + 4);
    }

    #[test]
    fn test_advance_during_pre_step_forces_ending() {
        let mut core = started_core(test_config(), 4);
        let instance = core.phases.current.as_ref().unwrap();
        assert!(instance.current_step.is_some());
        assert!(!instance.timer_running());

        core.advance_phase();
        let instance = core.phases.current.as_ref().unwrap();
        assert!(instance.ending);
        assert_eq!(instance.current_step, None);

        let short = core.config.ticks(core.config.short_countdown_secs);
        run_until_phase(&mut core, Phase::Planning, short as u32 + 4);
    }

    #[test]
    fn test_force_skip_cancels_pre_step_and_starts_timer_early() {
        let mut core = started_core(test_config(), 4);
        let instance = core.phases.current.as_ref().unwrap();
        assert!(instance.current_step.is_some());
        assert!(!instance.timer_running());

        core.execute(Command::ForceSkipPhase, Authority::Server).unwrap();

        let instance = core.phases.current.as_ref().unwrap();
        assert_eq!(instance.current_step, None);
        assert!(instance.timer_running());
        assert!(!core.scheduler.has_pending(|t| t.kind == TaskKind::PreStepComplete));

        // The phase still advances when the early timer expires.
        let duration = core.config.ticks(core.config.voting_secs);
        run_until_phase(&mut core, Phase::Planning, duration as u32 + 4);
    }

    #[test]
    fn test_election_installs_the_voted_commander() {
        let mut core = started_core(test_config(), 4);
        let target = PlayerId(2);
        for voter in [PlayerId(0), PlayerId(1), PlayerId(3)] {
            core.execute(
                Command::InitiateVote { voter, target },
                Authority::Client(voter),
            )
            .unwrap();
        }
        // Past the confirmation delay, then through the voting timer.
        run_until_phase(&mut core, Phase::Planning, 32);

        assert_eq!(core.election.commander(), Some(target));
        assert!(core.players.get(target).unwrap().is_commander());
        assert!(core.players.iter().all(|p| !p.vote.has_pending()));
        assert!(core.players.iter().all(|p| p.vote.current_vote.get().is_none()));
        let events = core.drain_events();
        assert!(events.contains(&CoreEvent::NewCommander { commander: Some(target) }));
    }

    #[test]
    fn test_commander_handoff_clears_previous_status() {
        let mut core = started_core(test_config(), 3);
        let first = PlayerId(0);
        let second = PlayerId(1);
        for voter in core.players.seated_ids() {
            core.execute(
                Command::InitiateVote { voter, target: first },
                Authority::Client(voter),
            )
            .unwrap();
        }
        run_until_phase(&mut core, Phase::Planning, 32);
        assert!(core.players.get(first).unwrap().is_commander());

        // Second election, next round.
        run_until_phase(&mut core, Phase::Voting, 64);
        for voter in core.players.seated_ids() {
            core.execute(
                Command::InitiateVote { voter, target: second },
                Authority::Client(voter),
            )
            .unwrap();
        }
        run_until_phase(&mut core, Phase::Planning, 32);
        assert!(core.players.get(second).unwrap().is_commander());
        assert!(!core.players.get(first).unwrap().is_commander());
    }

    #[test]
    fn test_night_drain_decreases_station_health() {
        let mut core = started_core(test_config(), 4);
        run_until_phase(&mut core, Phase::Night, 64);
        let max = core.config.station_max_health;
        // Past the deploy pre-step and into the drain loop.
        for _ in 0..8 {
            core.tick();
        }
        let health = core.stations.get(StationId(0)).unwrap().health.value();
        assert!(health < max, "drain never fired: health {}", health);
        assert!(core
            .drain_events()
            .iter()
            .any(|e| matches!(e, CoreEvent::StationHealthChanged { .. })));
    }

    #[test]
    fn test_destruction_threshold_ends_match_for_moles() {
        // Two players sit in the lowest bracket: two stations to destroy.
        let mut core = started_core(test_config(), 2);
        run_until_phase(&mut core, Phase::Night, 64);
        for id in [StationId(0), StationId(1)] {
            core.stations.get_mut(id).unwrap().health.set_server(0);
        }
        // The win check at Discussion instantiation ends the match before the
        // phase ever runs.
        run_until_over(&mut core, 64);

        assert_eq!(core.match_state(), MatchState::GameEnd);
        assert_eq!(core.outcome(), Some(MatchOutcome::StationsDestroyed));
        assert_eq!(core.round().stations_remaining.value(), 0);
        // Dead stations leave the assignment pool.
        assert!(core.stations.iter().all(|s| !s.can_assign));
    }

    #[test]
    fn test_round_cap_ends_match_for_crew() {
        let config = MatchConfig { max_rounds: 1, ..test_config() };
        let mut core = started_core(config, 2);
        run_until_over(&mut core, 128);
        assert_eq!(core.outcome(), Some(MatchOutcome::RoundsExhausted));
    }

    #[test]
    fn test_pending_votes_are_finalized_entering_voting() {
        // Confirmation delay longer than all of Discussion, so the vote is
        // still pending when Voting starts.
        let config = MatchConfig { vote_confirm_secs: 30.0, ..test_config() };
        let mut core = started_core(config, 3);
        run_until_phase(&mut core, Phase::Discussion, 128);
        let voter = PlayerId(0);
        core.execute(
            Command::InitiateVote { voter, target: PlayerId(1) },
            Authority::Client(voter),
        )
        .unwrap();
        assert!(core.players.get(voter).unwrap().vote.has_pending());

        run_until_phase(&mut core, Phase::Voting, 32);
        let vote = &core.players.get(voter).unwrap().vote;
        assert!(!vote.has_pending());
        assert_eq!(*vote.current_vote.get(), Some(PlayerId(1)));
    }

    #[test]
    fn test_replica_runs_no_tasks() {
        let mut core = MatchCore::new_replica(test_config(), 42).unwrap();
        for _ in 0..16 {
            core.tick();
        }
        assert_eq!(core.phase(), Phase::Invalid);
        assert_eq!(core.match_state(), MatchState::ReadyUp);
    }

    #[test]
    fn test_forced_stop_records_outcome() {
        let mut core = started_core(test_config(), 4);
        core.execute(Command::StopGame { crew_wins: false }, Authority::Server).unwrap();
        assert_eq!(core.match_state(), MatchState::GameEnd);
        assert_eq!(core.outcome(), Some(MatchOutcome::Forced(WinningSide::Moles)));
    }
}
