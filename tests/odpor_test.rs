//! Race Analysis Tests
//!
//! Executions built from the transitions a scripted program really reports, and
//! the races the reductions would see in them.

use stateless_mc::app::Scenario;
use stateless_mc::odpor::{Execution, WakeupTree};
use stateless_mc::remote::RemoteApp;
use stateless_mc::transition::{Aid, MemOpKind, Transition};
use stateless_mc::InProcessApp;
use std::sync::Arc;

const MUTEX_PAIR: &str = include_str!("../scenarios/mutex_pair.toml");
const RACY_COUNTER: &str = include_str!("../scenarios/racy_counter.toml");

/// Runs `schedule` on the scenario and returns the executed transitions.
fn run(scenario: &str, schedule: &[u32]) -> Vec<Arc<Transition>> {
    let scenario = Arc::new(Scenario::from_toml_str(scenario).unwrap());
    let mut app = InProcessApp::scripted(scenario).unwrap();
    schedule
        .iter()
        .map(|&aid| {
            let t = app.handle_simcall(Aid(aid), 0, true).unwrap().unwrap();
            app.wait_for_requests().unwrap();
            Arc::new(t)
        })
        .collect()
}

fn execution_of(transitions: &[Arc<Transition>]) -> Execution {
    let mut exec = Execution::new();
    for t in transitions {
        exec.push_transition(Arc::clone(t)).unwrap();
    }
    exec
}

// =============================================================================
// Mutex pair: lock, wait, unlock by each actor in turn
// =============================================================================

#[test]
fn test_competing_locks_race_reversibly() {
    let exec = execution_of(&run(MUTEX_PAIR, &[1, 1, 1, 2, 2, 2]));
    assert_eq!(exec.size(), 6);
    // the second lock request races with the first one
    assert_eq!(exec.get_reversible_races_of(3), vec![0]);
}

#[test]
fn test_wait_enabled_by_unlock_is_not_reversible() {
    let exec = execution_of(&run(MUTEX_PAIR, &[1, 1, 1, 2, 2, 2]));
    assert!(exec.happens_before(2, 4));
    assert_eq!(exec.get_racing_events_of(4), vec![2]);
    assert!(exec.get_reversible_races_of(4).is_empty());
}

#[test]
fn test_wait_of_owner_is_independent_of_other_request() {
    let exec = execution_of(&run(MUTEX_PAIR, &[1, 1, 1, 2, 2, 2]));
    assert!(!exec.happens_before(1, 3));
    assert!(exec.happens_before(0, 3));
    assert!(exec.happens_before_process(0, Aid(2)));
}

#[test]
fn test_reversed_race_fits_in_a_wakeup_tree() {
    let transitions = run(MUTEX_PAIR, &[1, 1, 1, 2, 2, 2]);
    let exec = execution_of(&transitions);
    let v = exec
        .get_odpor_extension_from(0, 3, &Default::default())
        .expect("nothing sleeps at the root");
    assert_eq!(v.last().map(|t| t.aid), Some(Aid(2)));

    let mut tree = WakeupTree::new();
    tree.insert(&v);
    assert_eq!(tree.min_single_process_actor(), v.first().map(|t| t.aid));
}

// =============================================================================
// Racy counter: unsynchronized load and store
// =============================================================================

#[test]
fn test_unsynchronized_store_is_a_data_race() {
    let transitions = run(RACY_COUNTER, &[1, 1, 2]);
    let mut exec = Execution::new();
    exec.push_transition(Arc::clone(&transitions[0])).unwrap();
    exec.push_transition(Arc::clone(&transitions[1])).unwrap();
    let race = exec
        .push_transition(Arc::clone(&transitions[2]))
        .expect_err("the read of actor 2 is not ordered after the write of actor 1");
    assert_eq!(race.location, 1);
    // the store before the second transition of actor 1, then the load before the
    // first transition of actor 2
    assert_eq!(race.first, (Aid(1), 1));
    assert_eq!(race.second, (Aid(2), 0));
    assert_eq!(race.first_kind, MemOpKind::Write);
    assert_eq!(race.second_kind, MemOpKind::Read);
    // the racy event is still recorded
    assert_eq!(exec.size(), 3);
}
