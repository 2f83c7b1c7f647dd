//! Exploration Scenario Tests
//!
//! Full explorations of the bundled scenarios, with the program running inside the
//! checker. Every run is deterministic.

use parking_lot::Mutex;
use stateless_mc::app::Scenario;
use stateless_mc::explo::ExplorationObserver;
use stateless_mc::state::State;
use stateless_mc::transition::{Aid, MemOpKind, Transition};
use stateless_mc::{
    BugKind, BugReport, CheckerConfig, ExitStatus, ExplorationContext, ExplorationStats,
    InProcessApp, ReductionMode, SearchOutcome, StrategyKind,
};
use std::sync::Arc;

const PRODUCER_CONSUMER: &str = include_str!("../scenarios/producer_consumer.toml");
const MUTEX_PAIR: &str = include_str!("../scenarios/mutex_pair.toml");
const MUTEX_TRIO: &str = include_str!("../scenarios/mutex_trio.toml");
const LOCK_INVERSION: &str = include_str!("../scenarios/lock_inversion.toml");
const LONELY_RECEIVER: &str = include_str!("../scenarios/lonely_receiver.toml");
const GUARDED_ASSERT: &str = include_str!("../scenarios/guarded_assert.toml");
const RACY_COUNTER: &str = include_str!("../scenarios/racy_counter.toml");

struct Run {
    outcome: SearchOutcome,
    stats: ExplorationStats,
    reports: Vec<BugReport>,
}

fn context(scenario: &str, config: CheckerConfig) -> ExplorationContext {
    let scenario = Arc::new(Scenario::from_toml_str(scenario).unwrap());
    let app = InProcessApp::scripted(scenario).unwrap();
    ExplorationContext::new(config, Box::new(app)).unwrap()
}

fn explore(scenario: &str, config: CheckerConfig) -> Run {
    let mut ctx = context(scenario, config);
    let outcome = ctx.run().unwrap();
    Run {
        outcome,
        stats: ctx.stats(),
        reports: ctx.reports().to_vec(),
    }
}

fn with(reduction: ReductionMode) -> CheckerConfig {
    CheckerConfig::test().with_reduction(reduction)
}

// =============================================================================
// Correct programs
// =============================================================================

#[test]
fn test_producer_consumer_has_one_trace_under_odpor() {
    let run = explore(PRODUCER_CONSUMER, with(ReductionMode::Odpor));
    assert_eq!(run.outcome, SearchOutcome::ExhaustedCleanly);
    assert_eq!(run.stats.explored_traces, 1);
    assert_eq!(run.stats.errors, 0);
    assert!(run.reports.is_empty());
}

#[test]
fn test_mutex_pair_has_one_trace_per_locking_order() {
    let run = explore(MUTEX_PAIR, with(ReductionMode::Odpor));
    assert_eq!(run.outcome, SearchOutcome::ExhaustedCleanly);
    assert_eq!(run.stats.explored_traces, 2);
}

#[test]
fn test_mutex_trio_has_one_trace_per_locking_order() {
    let run = explore(MUTEX_TRIO, with(ReductionMode::Odpor));
    assert_eq!(run.outcome, SearchOutcome::ExhaustedCleanly);
    assert_eq!(run.stats.explored_traces, 6);
}

#[test]
fn test_sleep_set_reductions_find_each_locking_order_once() {
    for reduction in [ReductionMode::Dpor, ReductionMode::Sdpor] {
        let pair = explore(MUTEX_PAIR, with(reduction));
        assert_eq!(pair.outcome, SearchOutcome::ExhaustedCleanly, "{:?}", reduction);
        assert_eq!(pair.stats.explored_traces, 2, "{:?}", reduction);

        let trio = explore(MUTEX_TRIO, with(reduction));
        assert_eq!(trio.outcome, SearchOutcome::ExhaustedCleanly, "{:?}", reduction);
        assert_eq!(trio.stats.explored_traces, 6, "{:?}", reduction);
    }
}

#[test]
fn test_no_reduction_explores_at_least_every_locking_order() {
    let run = explore(MUTEX_TRIO, with(ReductionMode::None));
    assert_eq!(run.outcome, SearchOutcome::ExhaustedCleanly);
    assert!(run.stats.explored_traces >= 6);
}

#[test]
fn test_no_reduction_explores_every_interleaving_of_the_pair() {
    let none = explore(MUTEX_PAIR, with(ReductionMode::None));
    let dpor = explore(MUTEX_PAIR, with(ReductionMode::Dpor));
    assert_eq!(none.outcome, SearchOutcome::ExhaustedCleanly);
    assert!(none.stats.explored_traces > 2);
    assert!(none.stats.explored_traces >= dpor.stats.explored_traces);
}

#[test]
fn test_best_first_reductions_cover_every_locking_order() {
    for reduction in [ReductionMode::BfsOdpor, ReductionMode::BefsOdpor] {
        let pair = explore(MUTEX_PAIR, with(reduction));
        assert_eq!(pair.outcome, SearchOutcome::ExhaustedCleanly, "{:?}", reduction);
        assert_eq!(pair.stats.explored_traces, 2, "{:?}", reduction);

        let trio = explore(MUTEX_TRIO, with(reduction));
        assert_eq!(trio.outcome, SearchOutcome::ExhaustedCleanly, "{:?}", reduction);
        assert_eq!(trio.stats.explored_traces, 6, "{:?}", reduction);
    }
}

#[test]
fn test_checkpoints_do_not_change_the_exploration() {
    let mut config = with(ReductionMode::Odpor);
    config.cached_states_interval = 1;
    let run = explore(MUTEX_TRIO, config);
    assert_eq!(run.outcome, SearchOutcome::ExhaustedCleanly);
    assert_eq!(run.stats.explored_traces, 6);
}

#[test]
fn test_max_depth_cuts_the_search() {
    let mut config = with(ReductionMode::Odpor);
    config.max_depth = 2;
    let run = explore(MUTEX_TRIO, config);
    assert_eq!(run.outcome, SearchOutcome::ExhaustedCleanly);
    assert_eq!(run.stats.explored_traces, 0);
}

#[test]
fn test_one_way_exploration_completes() {
    let mut config = with(ReductionMode::None);
    config.one_way = true;
    let run = explore(PRODUCER_CONSUMER, config);
    assert_eq!(run.outcome, SearchOutcome::ExhaustedCleanly);
    assert!(run.stats.explored_traces >= 1);
}

// =============================================================================
// Bugs
// =============================================================================

#[test]
fn test_lonely_receiver_deadlocks() {
    let run = explore(LONELY_RECEIVER, with(ReductionMode::Odpor));
    let report = run.outcome.bug().expect("the deadlock is found");
    assert_eq!(report.kind, BugKind::Deadlock);
    assert_eq!(run.outcome.exit_status(), ExitStatus::Deadlock);
    assert_eq!(report.trace.len(), 1);
    assert_eq!(report.record_trace.to_string(), "1");
}

#[test]
fn test_lock_inversion_deadlock_is_found_by_every_explorer() {
    for reduction in [
        ReductionMode::Dpor,
        ReductionMode::Sdpor,
        ReductionMode::Odpor,
        ReductionMode::BfsOdpor,
        ReductionMode::BefsOdpor,
    ] {
        let run = explore(LOCK_INVERSION, with(reduction));
        assert_eq!(
            run.outcome.exit_status(),
            ExitStatus::Deadlock,
            "{:?} missed the deadlock",
            reduction
        );
        assert_eq!(run.stats.errors, 1);
    }
}

#[test]
fn test_befs_with_uniform_strategy_finds_the_deadlock() {
    let mut config = with(ReductionMode::Dpor);
    config.explorer = stateless_mc::ExplorerKind::Befs;
    config.strategy = StrategyKind::Uniform;
    config.random_seed = 7;
    let run = explore(LOCK_INVERSION, config);
    assert_eq!(run.outcome.exit_status(), ExitStatus::Deadlock);
}

#[test]
fn test_assertion_fails_when_the_reader_wins() {
    let run = explore(GUARDED_ASSERT, with(ReductionMode::Odpor));
    let report = run.outcome.bug().expect("the assertion failure is found");
    assert!(matches!(report.kind, BugKind::AssertionFailure { .. }));
    assert_eq!(run.outcome.exit_status(), ExitStatus::Safety);
    assert!(report.trace.iter().any(|line| line.starts_with("Actor 2")));
    // one correct execution was explored before
    assert_eq!(run.stats.explored_traces, 1);
}

#[test]
fn test_racy_counter_reports_a_data_race() {
    let run = explore(RACY_COUNTER, with(ReductionMode::Odpor));
    let report = run.outcome.bug().expect("the race is found");
    match &report.kind {
        BugKind::DataRace(race) => {
            assert_eq!(race.location, 1);
            assert_eq!(race.first, (Aid(1), 1));
            assert_eq!(race.second, (Aid(2), 0));
            assert_eq!(race.first_kind, MemOpKind::Write);
            assert_eq!(race.second_kind, MemOpKind::Read);
        }
        other => panic!("expected a data race, got {:?}", other),
    }
    assert_eq!(run.outcome.exit_status(), ExitStatus::DataRace);
}

#[test]
fn test_tolerated_errors_let_the_search_go_on() {
    let mut config = with(ReductionMode::Odpor);
    config.max_errors = -1;
    let run = explore(GUARDED_ASSERT, config);
    assert_eq!(run.outcome.exit_status(), ExitStatus::Safety);
    assert!(!run.reports.is_empty());
    assert_eq!(run.stats.errors, run.reports.len() as u64);
    assert_eq!(run.outcome.bug(), Some(&run.reports[0]));
}

#[test]
fn test_each_tolerated_error_is_reported_once() {
    let mut config = with(ReductionMode::Odpor);
    config.max_errors = 5;
    let run = explore(GUARDED_ASSERT, config);
    assert_eq!(run.outcome.exit_status(), ExitStatus::Safety);
    assert_eq!(run.stats.errors, run.reports.len() as u64);
    assert!(run.stats.errors <= 5, "{} errors", run.stats.errors);

    let mut traces: Vec<String> = run
        .reports
        .iter()
        .map(|r| r.record_trace.to_string())
        .collect();
    traces.sort();
    traces.dedup();
    assert_eq!(traces.len(), run.reports.len(), "{:?}", traces);
}

#[test]
fn test_critical_transition_is_the_readers_lock() {
    let mut config = with(ReductionMode::Odpor);
    config.search_critical_transition = true;
    let run = explore(GUARDED_ASSERT, config);
    let report = run.outcome.bug().expect("the assertion failure is found");
    let critical = report
        .critical_transition
        .as_deref()
        .expect("a correct execution exists");
    assert!(critical.starts_with("Actor 2"), "{}", critical);
    // the nested searches are not counted
    assert_eq!(run.stats.errors, 1);
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_record_trace_replays_the_bug() {
    let run = explore(GUARDED_ASSERT, with(ReductionMode::Odpor));
    let recorded = run.outcome.bug().unwrap().record_trace.to_string();

    let mut config = with(ReductionMode::Odpor);
    config.replay = Some(recorded.clone());
    let replayed = explore(GUARDED_ASSERT, config);
    let report = replayed.outcome.bug().expect("the replay fails the same way");
    assert!(matches!(report.kind, BugKind::AssertionFailure { .. }));
    assert_eq!(report.record_trace.to_string(), recorded);
}

#[test]
fn test_replaying_a_correct_path_succeeds() {
    let mut config = with(ReductionMode::Odpor);
    config.replay = Some("1;2".to_string());
    let run = explore(PRODUCER_CONSUMER, config);
    assert_eq!(run.outcome.exit_status(), ExitStatus::Success);
}

#[test]
fn test_replaying_a_disabled_actor_is_non_deterministic() {
    let mut config = with(ReductionMode::Odpor);
    config.replay = Some("1;1".to_string());
    let run = explore(LONELY_RECEIVER, config);
    assert_eq!(run.outcome.exit_status(), ExitStatus::NonDeterminism);
}

// =============================================================================
// Outputs
// =============================================================================

#[derive(Default)]
struct Counts {
    starts: u32,
    states: u64,
    executed: u64,
    backtracks: u64,
    logged: Option<ExplorationStats>,
}

struct Counter(Arc<Mutex<Counts>>);

impl ExplorationObserver for Counter {
    fn on_exploration_start(&mut self) {
        self.0.lock().starts += 1;
    }

    fn on_state_creation(&mut self, _state: &State) {
        self.0.lock().states += 1;
    }

    fn on_transition_execute(&mut self, _transition: &Transition) {
        self.0.lock().executed += 1;
    }

    fn on_backtracking(&mut self) {
        self.0.lock().backtracks += 1;
    }

    fn on_log_state(&mut self, stats: &ExplorationStats) {
        self.0.lock().logged = Some(stats.clone());
    }
}

#[test]
fn test_observers_see_every_milestone() {
    let counts = Arc::new(Mutex::new(Counts::default()));
    let mut ctx = context(MUTEX_PAIR, with(ReductionMode::Odpor));
    ctx.add_observer(Box::new(Counter(Arc::clone(&counts))));
    ctx.run().unwrap();

    let counts = counts.lock();
    assert_eq!(counts.starts, 1);
    assert!(counts.states > 1);
    assert!(counts.executed > 0);
    assert!(counts.backtracks > 0);
    assert_eq!(counts.logged.as_ref(), Some(&ctx.stats()));
}

#[test]
fn test_dot_output_is_a_closed_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("states.dot");
    let mut config = with(ReductionMode::Odpor);
    config.dot_output = Some(path.clone());
    explore(MUTEX_PAIR, config);

    let dot = std::fs::read_to_string(&path).unwrap();
    assert!(dot.starts_with("digraph graphname{"));
    assert!(dot.contains("\"0\" -> "));
    assert!(dot.ends_with("}\n"));
}

#[test]
fn test_incompatible_settings_are_rejected() {
    let mut config = CheckerConfig::test();
    config.reduction = ReductionMode::Odpor;
    config.explorer = stateless_mc::ExplorerKind::Befs;
    let scenario = Arc::new(Scenario::from_toml_str(MUTEX_PAIR).unwrap());
    let app = InProcessApp::scripted(scenario).unwrap();
    assert!(ExplorationContext::new(config, Box::new(app)).is_err());
}
