//! Process App Tests
//!
//! Explorations of the `scripted-app` binary started as a separate process. They
//! fork, so they are ignored by default: `cargo test -- --ignored`.

use stateless_mc::{
    CheckerConfig, ExitStatus, ExplorationContext, ProcessApp, ReductionMode, SearchOutcome,
};
use std::path::PathBuf;

fn scenario(name: &str) -> String {
    format!("{}/scenarios/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn explore(name: &str, config: CheckerConfig) -> (SearchOutcome, u64) {
    let program = PathBuf::from(env!("CARGO_BIN_EXE_scripted-app"));
    let app = ProcessApp::spawn(program, vec![scenario(name)], &config).unwrap();
    let mut ctx = ExplorationContext::new(config, Box::new(app)).unwrap();
    let outcome = ctx.run().unwrap();
    (outcome, ctx.stats().explored_traces)
}

#[test]
#[ignore]
fn test_restarting_the_program_for_each_restore() {
    let config = CheckerConfig::test().with_reduction(ReductionMode::Odpor);
    assert!(config.no_fork);
    let (outcome, traces) = explore("mutex_pair.toml", config);
    assert_eq!(outcome, SearchOutcome::ExhaustedCleanly);
    assert_eq!(traces, 2);
}

#[test]
#[ignore]
fn test_forked_checkpoints_find_the_deadlock() {
    let mut config = CheckerConfig::test().with_reduction(ReductionMode::Odpor);
    config.no_fork = false;
    config.cached_states_interval = 2;
    let (outcome, _) = explore("lock_inversion.toml", config);
    assert_eq!(outcome.exit_status(), ExitStatus::Deadlock);
}

#[test]
#[ignore]
fn test_assertion_in_the_program_is_a_safety_bug() {
    let mut config = CheckerConfig::test().with_reduction(ReductionMode::Odpor);
    config.no_fork = false;
    let (outcome, _) = explore("guarded_assert.toml", config);
    assert_eq!(outcome.exit_status(), ExitStatus::Safety);
}
