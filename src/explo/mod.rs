//! Exploration drivers.
//!
//! An [`ExplorationContext`] holds what one run shares: the configuration, the
//! checked app, the state arena, the reduction and the guiding strategy, the
//! counters and the bug reports. The explorers own their stack and execution and
//! borrow the context mutably while they walk the tree. Every search ends with a
//! [`SearchOutcome`] instead of unwinding.

pub mod befs;
pub mod critical;
pub mod dfs;
pub mod dot;
pub mod record;

pub use befs::BeFsExplorer;
pub use critical::CriticalTransitionExplorer;
pub use dfs::DfsExplorer;
pub use dot::DotWriter;
pub use record::RecordTrace;

use crate::config::{CheckerConfig, ExplorerKind};
use crate::error::{CrashStatus, ExitStatus, McError};
use crate::odpor::{DataRace, Execution, MazurkiewiczTraces};
use crate::reduction::{build_reduction, state_create, NextStep, Reduction};
use crate::remote::{CheckpointId, RemoteApp, ReplayedStep};
use crate::rng::DeterministicRng;
use crate::state::{State, StateArena, StateId};
use crate::strategy::{build_strategy, ExplorationStrategy};
use crate::transition::{Aid, Transition, TransitionKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Checkpoints are not taken when fewer descriptors than this remain available.
const FD_MARGIN: u64 = 16;

/// What went wrong in a counter-example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BugKind {
    Deadlock,
    AssertionFailure { message: String },
    ProgramCrash(CrashStatus),
    DataRace(DataRace),
    NonDeterminism { message: String },
}

impl BugKind {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            BugKind::Deadlock => ExitStatus::Deadlock,
            BugKind::AssertionFailure { .. } => ExitStatus::Safety,
            BugKind::ProgramCrash(_) => ExitStatus::ProgramCrash,
            BugKind::DataRace(_) => ExitStatus::DataRace,
            BugKind::NonDeterminism { .. } => ExitStatus::NonDeterminism,
        }
    }

    /// The finding carried by `e`, or `e` itself when it is a checker failure.
    pub(crate) fn from_finding(e: McError) -> Result<BugKind, McError> {
        match e {
            McError::AssertionFailed(message) => Ok(BugKind::AssertionFailure { message }),
            McError::ProgramCrash(status) => Ok(BugKind::ProgramCrash(status)),
            McError::NonDeterminism(message) => Ok(BugKind::NonDeterminism { message }),
            other => Err(other),
        }
    }

    fn title(&self) -> &'static str {
        match self {
            BugKind::Deadlock => "*** DEADLOCK DETECTED ***",
            BugKind::AssertionFailure { .. } => "*** PROPERTY NOT VALID ***",
            BugKind::ProgramCrash(_) => "** CRASH IN THE PROGRAM **",
            BugKind::DataRace(_) => "*** DATA RACE DETECTED ***",
            BugKind::NonDeterminism { .. } => "*** NON-DETERMINISM DETECTED ***",
        }
    }
}

/// A counter-example, with everything needed to replay it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugReport {
    pub kind: BugKind,
    /// One line per transition, from the initial state
    pub trace: Vec<String>,
    pub record_trace: RecordTrace,
    /// Last transition after which no correct execution remained, when searched for
    pub critical_transition: Option<String>,
}

impl BugReport {
    pub fn exit_status(&self) -> ExitStatus {
        self.kind.exit_status()
    }
}

/// How a search ended, or that it goes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Continue,
    FoundBug(Box<BugReport>),
    ExhaustedCleanly,
    /// Only while looking for the critical transition
    ReachedCorrectExecution,
}

impl SearchOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, SearchOutcome::Continue)
    }

    pub fn bug(&self) -> Option<&BugReport> {
        match self {
            SearchOutcome::FoundBug(report) => Some(&**report),
            _ => None,
        }
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.bug()
            .map_or(ExitStatus::Success, BugReport::exit_status)
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationStats {
    /// States created, duplicates included
    pub expanded_states: u64,
    /// Transitions executed or replayed
    pub visited_states: u64,
    /// Executions that reached a state without enabled actors
    pub explored_traces: u64,
    pub backtracks: u64,
    pub replayed_transitions: u64,
    pub errors: u64,
    pub timed_out: bool,
}

/// Hooks called at the milestones of an exploration. Every method defaults to doing
/// nothing.
pub trait ExplorationObserver {
    fn on_exploration_start(&mut self) {}
    fn on_state_creation(&mut self, _state: &State) {}
    fn on_transition_execute(&mut self, _transition: &Transition) {}
    fn on_backtracking(&mut self) {}
    fn on_restore_state(&mut self, _state: &State) {}
    fn on_transition_replay(&mut self, _transition: &Transition) {}
    fn on_log_state(&mut self, _stats: &ExplorationStats) {}
}

/// Where restorations start when the path to a state has no checkpoint.
#[derive(Debug, Clone, Default)]
pub(crate) struct RestoreBase {
    pub checkpoint: Option<CheckpointId>,
    pub prefix: Vec<(Aid, u32)>,
}

/// Result of executing one transition from a state.
pub(crate) enum StepOutcome {
    Reached {
        child: StateId,
        transition: Arc<Transition>,
    },
    /// The step failed. On `Continue`, the app is back at the state the step started from.
    Stopped(SearchOutcome),
}

/// Everything one run shares.
pub struct ExplorationContext {
    pub(crate) config: CheckerConfig,
    pub(crate) remote: Box<dyn RemoteApp>,
    pub(crate) arena: StateArena,
    pub(crate) strategy: Box<dyn ExplorationStrategy>,
    pub(crate) reduction: Box<dyn Reduction>,
    pub(crate) stats: ExplorationStats,
    pub(crate) looking_for_critical: bool,
    pub(crate) base: RestoreBase,
    pub(crate) rng: DeterministicRng,
    observers: Vec<Box<dyn ExplorationObserver>>,
    dot: Option<DotWriter>,
    traces: Option<MazurkiewiczTraces>,
    reports: Vec<BugReport>,
    started: Instant,
    fd_limit: Option<u64>,
}

impl ExplorationContext {
    pub fn new(config: CheckerConfig, remote: Box<dyn RemoteApp>) -> Result<Self, McError> {
        config.validate()?;
        let strategy = build_strategy(config.strategy, config.random_seed);
        let reduction = build_reduction(config.reduction, config.explorer);
        let dot = config
            .dot_output
            .as_deref()
            .map(DotWriter::create)
            .transpose()?;
        let traces =
            (config.debug_optimality && reduction.is_optimal()).then(MazurkiewiczTraces::new);
        let rng = DeterministicRng::new(config.random_seed);
        Ok(ExplorationContext {
            config,
            remote,
            arena: StateArena::new(),
            strategy,
            reduction,
            stats: ExplorationStats::default(),
            looking_for_critical: false,
            base: RestoreBase::default(),
            rng,
            observers: Vec::new(),
            dot,
            traces,
            reports: Vec::new(),
            started: Instant::now(),
            fd_limit: open_files_limit(),
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn ExplorationObserver>) {
        self.observers.push(observer);
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn stats(&self) -> ExplorationStats {
        ExplorationStats {
            expanded_states: self.arena.expanded_states(),
            ..self.stats.clone()
        }
    }

    /// Every bug reported so far, in the order they were found.
    pub fn reports(&self) -> &[BugReport] {
        &self.reports
    }

    /// Runs the configured exploration, or the configured replay.
    ///
    /// When more errors than `max_errors` are tolerated, the search goes on after a
    /// bug and the first reported one is returned at the end.
    pub fn run(&mut self) -> Result<SearchOutcome, McError> {
        let outcome = match self.config.replay.clone() {
            Some(trace) => {
                let trace: RecordTrace = trace.parse()?;
                record::replay(self, &trace)?
            }
            None => {
                for observer in &mut self.observers {
                    observer.on_exploration_start();
                }
                match self.config.explorer {
                    ExplorerKind::Dfs => DfsExplorer::new().run(self)?,
                    ExplorerKind::Befs => BeFsExplorer::new().run(self)?,
                }
            }
        };
        self.log_state()?;
        Ok(match outcome {
            SearchOutcome::Continue | SearchOutcome::ExhaustedCleanly => {
                match self.reports.first() {
                    Some(first) => SearchOutcome::FoundBug(Box::new(first.clone())),
                    None => SearchOutcome::ExhaustedCleanly,
                }
            }
            other => other,
        })
    }

    /// Builds, or reuses, the state reached from `parent` through `incoming` and
    /// initializes it from the app. The caller owns one reference on it.
    pub(crate) fn create_state(
        &mut self,
        parent: Option<StateId>,
        incoming: Option<Arc<Transition>>,
    ) -> Result<StateId, McError> {
        let id = state_create(
            self.reduction.as_ref(),
            &mut self.arena,
            self.strategy.as_ref(),
            self.remote.as_mut(),
            parent,
            incoming,
            self.config.debug_optimality || self.config.verbose,
        )?;
        let state = self.arena.state(id);
        for observer in &mut self.observers {
            observer.on_state_creation(state);
        }
        Ok(id)
    }

    /// Builds the state the app reached on its own from `parent`.
    pub(crate) fn adopt_step(&mut self, parent: StateId, step: ReplayedStep) -> StateId {
        self.arena
            .state_mut(parent)
            .record_executed(Arc::clone(&step.transition));
        self.stats.visited_states += 1;
        for observer in &mut self.observers {
            observer.on_transition_execute(&step.transition);
        }
        let child = self.arena.create(
            Some(parent),
            Some(step.transition),
            self.reduction.new_state_kind(),
            self.strategy.as_ref(),
        );
        self.arena.state_mut(child).initialize(step.actors);
        self.reduction
            .on_state_initialized(&mut self.arena, child, self.strategy.as_ref());
        let state = self.arena.state(child);
        for observer in &mut self.observers {
            observer.on_state_creation(state);
        }
        child
    }

    /// Executes `next` from `state`, the last state of `stack` reached through
    /// `exec`, and builds the state it leads to.
    pub(crate) fn execute_step(
        &mut self,
        state: StateId,
        next: NextStep,
        stack: &[StateId],
        exec: &Execution,
    ) -> Result<StepOutcome, McError> {
        let (planned, previous) = {
            let s = self.arena.state(state);
            let planned = s.actors().get(&next.aid).map(|a| {
                let times = next.times.unwrap_or_else(|| a.times_considered());
                a.get_transition(times).cloned().unwrap_or_else(|| {
                    // pending transitions are only fetched when something reads them
                    Arc::new(Transition::new(next.aid, times, TransitionKind::Unknown))
                })
            });
            (planned, s.outgoing_transition().cloned())
        };

        let result =
            self.arena
                .state_mut(state)
                .execute_next(next.aid, next.times, self.remote.as_mut());
        let executed = match result {
            Ok(t) => t,
            Err(e) => {
                let kind = BugKind::from_finding(e)?;
                // the outgoing transition is only set once the simcall went through
                let failing = match (self.arena.state(state).outgoing_transition(), &previous) {
                    (Some(now), Some(before)) if Arc::ptr_eq(now, before) => planned,
                    (Some(now), _) => Some(Arc::clone(now)),
                    (None, _) => planned,
                };
                let mut trace = transitions_of(exec);
                trace.extend(failing.clone());
                let outcome = self.report_bug(kind, stack, trace)?;
                if outcome.is_continue() {
                    self.reduction.on_failed_step(&mut self.arena, state, failing);
                    self.restore_state(state)?;
                }
                return Ok(StepOutcome::Stopped(outcome));
            }
        };

        self.stats.visited_states += 1;
        for observer in &mut self.observers {
            observer.on_transition_execute(&executed);
        }
        let child = self.create_state(Some(state), Some(Arc::clone(&executed)))?;
        self.dot_edge(state, child, &executed)?;
        self.maybe_checkpoint(child)?;
        Ok(StepOutcome::Reached {
            child,
            transition: executed,
        })
    }

    pub(crate) fn dot_edge(
        &mut self,
        parent: StateId,
        child: StateId,
        t: &Transition,
    ) -> Result<(), McError> {
        if let Some(dot) = &mut self.dot {
            let parent = self.arena.state(parent).num();
            let child = self.arena.state(child).num();
            dot.edge(parent, child, t)?;
        }
        Ok(())
    }

    /// Saves the app at `state` every `cached_states_interval` states.
    fn maybe_checkpoint(&mut self, state: StateId) -> Result<(), McError> {
        let interval = self.config.cached_states_interval as u64;
        let num = self.arena.state(state).num();
        if interval == 0 || num % interval != 0 || self.arena.state(state).has_state_factory() {
            return Ok(());
        }
        if let Some(limit) = self.fd_limit {
            let alive = self.remote.checkpoint_count() as u64;
            if alive + FD_MARGIN >= limit {
                error!(
                    "Not caching state {}: {} checkpoints are alive and the file descriptor limit is {}",
                    num, alive, limit
                );
                return Ok(());
            }
        }
        let checkpoint = self.remote.clone_checker_side()?;
        self.arena.state_mut(state).set_state_factory(checkpoint);
        debug!(state = num, checkpoint, "app state cached");
        Ok(())
    }

    /// Checks whether the app is deadlocked at the end of `exec`, then whether the
    /// soft timeout expired. `ExhaustedCleanly` means the run has to stop.
    pub(crate) fn check_deadlock(
        &mut self,
        stack: &[StateId],
        exec: &Execution,
    ) -> Result<SearchOutcome, McError> {
        let verbose = self.config.verbose && !self.looking_for_critical;
        if self.remote.check_deadlock(verbose)? {
            let outcome = self.report_bug(BugKind::Deadlock, stack, transitions_of(exec))?;
            if !outcome.is_continue() {
                return Ok(outcome);
            }
        }
        if let Some(budget) = self.config.soft_timeout() {
            if self.started.elapsed() > budget {
                info!(
                    "Soft timeout after {} seconds. Gracefully exiting.",
                    budget.as_secs()
                );
                self.stats.timed_out = true;
                match self.remote.finalize_app(true) {
                    Err(e) if !e.is_finding() => return Err(e),
                    _ => {}
                }
                return Ok(SearchOutcome::ExhaustedCleanly);
            }
        }
        Ok(SearchOutcome::Continue)
    }

    /// Reports a bug found after `trace`, `stack` being the states it went through.
    ///
    /// The report is only returned as the outcome once more errors than tolerated
    /// were found; until then the search goes on. While looking for the critical
    /// transition, bugs are only logged.
    pub(crate) fn report_bug(
        &mut self,
        kind: BugKind,
        stack: &[StateId],
        trace: Vec<Arc<Transition>>,
    ) -> Result<SearchOutcome, McError> {
        if self.looking_for_critical {
            debug!(
                "{} while looking for the critical transition",
                kind.title().trim_matches(|c| c == '*' || c == ' ')
            );
            return Ok(SearchOutcome::Continue);
        }
        let mut report = build_report(kind, &trace);
        log_report(&report);
        self.stats.errors += 1;

        if self.config.search_critical_transition && self.config.max_errors == 0 {
            report.critical_transition = CriticalTransitionExplorer::new(stack, trace)
                .run(self)?
                .map(|t| trace_line(&t));
        }
        self.reports.push(report.clone());
        let budget = self.config.max_errors;
        if budget >= 0 && self.stats.errors > budget as u64 {
            Ok(SearchOutcome::FoundBug(Box::new(report)))
        } else {
            Ok(SearchOutcome::Continue)
        }
    }

    /// Logs a bug found while replaying a record trace; replays stop at the first bug.
    pub(crate) fn conclude_replay(
        &mut self,
        kind: BugKind,
        trace: Vec<Arc<Transition>>,
    ) -> SearchOutcome {
        let report = build_report(kind, &trace);
        log_report(&report);
        self.stats.errors += 1;
        self.reports.push(report.clone());
        SearchOutcome::FoundBug(Box::new(report))
    }

    /// Records that the execution ending at `state` is correct.
    pub(crate) fn report_correct_execution(&mut self, state: StateId) -> Option<SearchOutcome> {
        self.arena.register_as_correct(state);
        if self.looking_for_critical {
            info!("Found a correct execution while looking for the critical transition");
            return Some(SearchOutcome::ReachedCorrectExecution);
        }
        None
    }

    /// Ends the execution that reached `state`, where no actor is left.
    pub(crate) fn finish_execution(
        &mut self,
        state: StateId,
        stack: &[StateId],
        exec: &Execution,
    ) -> Result<SearchOutcome, McError> {
        if let Err(e) = self.remote.finalize_app(false) {
            let kind = BugKind::from_finding(e)?;
            return self.report_bug(kind, stack, transitions_of(exec));
        }
        debug!(
            "Execution came to an end at {}",
            RecordTrace::from_transitions(&transitions_of(exec))
        );
        Ok(self
            .report_correct_execution(state)
            .unwrap_or(SearchOutcome::Continue))
    }

    /// Counts the maximal execution `exec` and, when checking optimality, makes
    /// sure no equivalent one was explored before.
    pub(crate) fn record_maximal_execution(&mut self, exec: &Execution) -> Result<(), McError> {
        self.stats.explored_traces += 1;
        if let Some(traces) = &mut self.traces {
            traces.record_new_execution(exec)?;
        }
        Ok(())
    }

    /// Looks for races in `exec` and applies what the reduction makes of them.
    /// Returns the states the reduction created ahead of time, owned by the caller.
    pub(crate) fn handle_races(
        &mut self,
        exec: &Execution,
        stack: &[StateId],
    ) -> Vec<StateId> {
        let update = self.reduction.races_computation(&self.arena, exec, stack);
        if update.is_empty() {
            return Vec::new();
        }
        debug!(actions = update.len(), "applying race update");
        self.reduction
            .apply_race_update(&mut self.arena, self.strategy.as_ref(), update)
    }

    /// Frees the states nobody refers to anymore, and their checkpoints.
    pub(crate) fn release_garbage(&mut self) {
        for checkpoint in self.arena.collect_garbage() {
            self.remote.release_checkpoint(checkpoint);
        }
    }

    pub(crate) fn notify_backtracking(&mut self) {
        for observer in &mut self.observers {
            observer.on_backtracking();
        }
    }

    /// Brings the app to `target`: restores the closest checkpoint on the way up
    /// (or the base of the run) and replays the steps from there.
    ///
    /// States of the path that were created ahead of time get initialized from the
    /// statuses reported during the replay; they are returned in path order.
    pub(crate) fn restore_state(&mut self, target: StateId) -> Result<Vec<StateId>, McError> {
        let mut silent: VecDeque<Arc<Transition>> = VecDeque::new();
        let mut with_status: VecDeque<(StateId, Arc<Transition>)> = VecDeque::new();
        let mut checkpoint = None;
        let mut restart = None;

        let mut cur = Some(target);
        while let Some(id) = cur {
            let state = self.arena.state(id);
            if let Some(factory) = state.state_factory() {
                checkpoint = Some(factory);
                restart = Some(id);
                break;
            }
            match state.incoming_transition() {
                Some(t) if state.is_initialized() => silent.push_front(Arc::clone(t)),
                Some(t) => {
                    if !silent.is_empty() {
                        return Err(McError::Internal(format!(
                            "state {} is not initialized but has an initialized descendant",
                            state.num()
                        )));
                    }
                    with_status.push_front((id, Arc::clone(t)));
                }
                None => restart = Some(id),
            }
            cur = state.parent();
        }

        let mut replay: Vec<(Aid, u32)> = Vec::new();
        match checkpoint {
            Some(factory) => self.remote.restore_checker_side(Some(factory))?,
            None => {
                self.remote.restore_checker_side(self.base.checkpoint)?;
                replay.extend_from_slice(&self.base.prefix);
            }
        }
        if let Some(restart) = restart {
            let state = self.arena.state(restart);
            for observer in &mut self.observers {
                observer.on_restore_state(state);
            }
        }
        replay.extend(silent.iter().map(|t| (t.aid, t.times_considered)));
        let to_initialize: Vec<(Aid, u32)> = with_status
            .iter()
            .map(|(_, t)| (t.aid, t.times_considered))
            .collect();
        debug!(
            target = self.arena.state(target).num(),
            replayed = replay.len(),
            initialized = to_initialize.len(),
            "restoring the app"
        );
        let steps = self.remote.replay_sequence(&replay, &to_initialize)?;
        if steps.len() != to_initialize.len() {
            return Err(McError::Internal(format!(
                "{} steps reported for {} states to initialize",
                steps.len(),
                to_initialize.len()
            )));
        }

        for t in &silent {
            for observer in &mut self.observers {
                observer.on_transition_replay(t);
            }
        }
        let mut initialized = Vec::with_capacity(steps.len());
        for ((id, _), step) in with_status.into_iter().zip(steps) {
            for observer in &mut self.observers {
                observer.on_transition_replay(&step.transition);
            }
            let state = self.arena.state_mut(id);
            state.update_incoming_transition(step.transition);
            state.initialize(step.actors);
            initialized.push(id);
        }

        let replayed = (replay.len() + initialized.len()) as u64;
        self.stats.visited_states += replayed;
        self.stats.replayed_transitions += replayed;
        self.stats.backtracks += 1;

        if !initialized.is_empty() && !self.arena.state(target).has_more_to_be_explored() {
            self.reduction
                .on_state_initialized(&mut self.arena, target, self.strategy.as_ref());
        }
        Ok(initialized)
    }

    /// Logs the statistics of the run and closes its outputs.
    pub(crate) fn log_state(&mut self) -> Result<(), McError> {
        let stats = self.stats();
        let explorer = match self.config.explorer {
            ExplorerKind::Dfs => "DFS",
            ExplorerKind::Befs => "BeFS",
        };
        info!(
            "{} exploration ended. {} unique states visited; {} backtracks ({} transition replays, {} states visited overall)",
            explorer,
            stats.expanded_states,
            stats.backtracks,
            stats.replayed_transitions,
            stats.visited_states
        );
        info!("{} maximal executions explored", stats.explored_traces);
        if let Some(dot) = &mut self.dot {
            dot.close()?;
        }
        if self.config.system_statistics {
            match std::process::Command::new("free").status() {
                Ok(status) if !status.success() => {
                    warn!("Call to `free` did not succeed: {}", status)
                }
                Err(e) => warn!("Cannot run `free`: {}", e),
                Ok(_) => {}
            }
        }
        if let Some(traces) = &self.traces {
            traces.log_data();
        }
        for observer in &mut self.observers {
            observer.on_log_state(&stats);
        }
        Ok(())
    }

    /// Sets aside what only belongs to the main search, for a nested one.
    pub(crate) fn suspend_outputs(&mut self) -> SuspendedOutputs {
        SuspendedOutputs {
            observers: std::mem::take(&mut self.observers),
            dot: self.dot.take(),
            traces: self.traces.take(),
            stats: self.stats.clone(),
        }
    }

    pub(crate) fn resume_outputs(&mut self, saved: SuspendedOutputs) {
        self.observers = saved.observers;
        self.dot = saved.dot;
        self.traces = saved.traces;
        self.stats = saved.stats;
    }
}

pub(crate) struct SuspendedOutputs {
    observers: Vec<Box<dyn ExplorationObserver>>,
    dot: Option<DotWriter>,
    traces: Option<MazurkiewiczTraces>,
    stats: ExplorationStats,
}

pub(crate) fn transitions_of(exec: &Execution) -> Vec<Arc<Transition>> {
    exec.events().map(|e| Arc::clone(e.transition())).collect()
}

/// `Actor <aid> in <location> ==> simcall: <transition>`
pub(crate) fn trace_line(t: &Transition) -> String {
    if t.call_location.is_empty() {
        format!("Actor {} in simcall {}", t.aid, t)
    } else {
        format!("Actor {} in {} ==> simcall: {}", t.aid, t.call_location, t)
    }
}

fn build_report(kind: BugKind, trace: &[Arc<Transition>]) -> BugReport {
    BugReport {
        kind,
        trace: trace.iter().map(|t| trace_line(t)).collect(),
        record_trace: RecordTrace::from_transitions(trace),
        critical_transition: None,
    }
}

fn log_report(report: &BugReport) {
    let title = report.kind.title();
    let stars = "*".repeat(title.len());
    info!("{}", stars);
    info!("{}", title);
    info!("{}", stars);
    match &report.kind {
        BugKind::Deadlock => {}
        BugKind::AssertionFailure { message } | BugKind::NonDeterminism { message } => {
            if !message.is_empty() {
                info!("{}", message);
            }
        }
        BugKind::ProgramCrash(CrashStatus::Signaled {
            signal,
            core_dumped,
        }) => {
            info!("From signal: {}", signal_name(*signal));
            info!(
                "{} core dump was generated by the system.",
                if *core_dumped { "A" } else { "No" }
            );
        }
        BugKind::ProgramCrash(CrashStatus::Exited { code }) => info!("From exit: {}", code),
        BugKind::DataRace(race) => info!("{}", race),
    }
    info!("Counter-example execution trace:");
    for line in &report.trace {
        info!("  {}", line);
    }
    info!(
        "You can debug the problem (and see the whole details) by rerunning with --cfg=model-check/replay:'{}'",
        report.record_trace
    );
}

fn signal_name(signal: i32) -> String {
    match signal {
        libc::SIGABRT => "Aborted".to_string(),
        libc::SIGSEGV => "Segmentation fault".to_string(),
        libc::SIGBUS => "Bus error".to_string(),
        libc::SIGFPE => "Floating point exception".to_string(),
        libc::SIGILL => "Illegal instruction".to_string(),
        libc::SIGKILL => "Killed".to_string(),
        libc::SIGTERM => "Terminated".to_string(),
        libc::SIGINT => "Interrupt".to_string(),
        other => format!("signal {}", other),
    }
}

fn open_files_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct it is handed
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    (rc == 0 && limit.rlim_cur != libc::RLIM_INFINITY).then(|| limit.rlim_cur as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::TransitionKind;

    #[test]
    fn test_trace_line_mentions_location_when_known() {
        let t = Transition::new(Aid(2), 0, TransitionKind::Unknown);
        assert_eq!(trace_line(&t), "Actor 2 in simcall UNKNOWN");
        let t = t.with_location("main.rs:12");
        assert_eq!(trace_line(&t), "Actor 2 in main.rs:12 ==> simcall: UNKNOWN");
    }

    #[test]
    fn test_exit_status_of_outcomes() {
        assert_eq!(SearchOutcome::ExhaustedCleanly.exit_status(), ExitStatus::Success);
        let report = build_report(BugKind::Deadlock, &[]);
        assert_eq!(
            SearchOutcome::FoundBug(Box::new(report)).exit_status(),
            ExitStatus::Deadlock
        );
        assert_eq!(
            BugKind::ProgramCrash(CrashStatus::Exited { code: 1 }).exit_status(),
            ExitStatus::ProgramCrash
        );
    }

    #[test]
    fn test_findings_become_bug_kinds() {
        assert_eq!(
            BugKind::from_finding(McError::AssertionFailed("x > 0".into())).unwrap(),
            BugKind::AssertionFailure {
                message: "x > 0".into()
            }
        );
        assert!(BugKind::from_finding(McError::Internal("oops".into())).is_err());
    }

    #[test]
    fn test_banner_fits_title() {
        for kind in [
            BugKind::Deadlock,
            BugKind::AssertionFailure {
                message: String::new(),
            },
        ] {
            assert!(kind.title().starts_with("**"));
            assert!(kind.title().ends_with("**"));
        }
        assert_eq!(signal_name(libc::SIGSEGV), "Segmentation fault");
        assert_eq!(signal_name(1000), "signal 1000");
    }
}
