//! Protocol Tests
//!
//! The checker side of the control socket against an app side served from a thread,
//! compared with the in-process app on the same scenarios.

use stateless_mc::app::{Scenario, ScriptedProgram};
use stateless_mc::remote::{AppSide, Channel, CheckerSide, Message, RemoteApp};
use stateless_mc::transition::Aid;
use stateless_mc::{InProcessApp, McError};
use std::sync::Arc;
use std::thread::JoinHandle;

const GUARDED_ASSERT: &str = include_str!("../scenarios/guarded_assert.toml");
const LONELY_RECEIVER: &str = include_str!("../scenarios/lonely_receiver.toml");
const MUTEX_PAIR: &str = include_str!("../scenarios/mutex_pair.toml");

fn serve(toml: &str) -> (CheckerSide, JoinHandle<Result<(), McError>>) {
    let scenario = Arc::new(Scenario::from_toml_str(toml).unwrap());
    let (checker, app) = Channel::pair().unwrap();
    let handle =
        std::thread::spawn(move || AppSide::new(app, Box::new(ScriptedProgram::new(scenario))).run());
    let mut side = CheckerSide::new(checker, 0, 0);
    side.expect_waiting().unwrap();
    (side, handle)
}

fn in_process(toml: &str) -> InProcessApp {
    InProcessApp::scripted(Arc::new(Scenario::from_toml_str(toml).unwrap())).unwrap()
}

// =============================================================================
// Findings over the wire
// =============================================================================

#[test]
fn test_assertion_failure_travels_to_the_checker() {
    let (mut side, handle) = serve(GUARDED_ASSERT);
    side.handle_simcall(Aid(2), 0, false).unwrap();
    side.wait_for_requests().unwrap();
    side.handle_simcall(Aid(2), 0, false).unwrap();
    match side.wait_for_requests() {
        Err(McError::AssertionFailed(message)) => assert!(message.contains("location 1")),
        other => panic!("expected an assertion failure, got {:?}", other),
    }
    side.finalize(true).unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn test_deadlock_check_over_the_wire() {
    let (mut side, handle) = serve(LONELY_RECEIVER);
    assert!(!side.check_deadlock(false).unwrap());
    side.handle_simcall(Aid(1), 0, false).unwrap();
    side.wait_for_requests().unwrap();
    assert!(side.check_deadlock(true).unwrap());
    side.finalize(true).unwrap();
    handle.join().unwrap().unwrap();
}

// =============================================================================
// Both implementations agree
// =============================================================================

#[test]
fn test_replay_statuses_match_the_in_process_app() {
    let silent = [(Aid(1), 0)];
    let with_status = [(Aid(2), 0), (Aid(1), 0)];

    let (mut side, handle) = serve(MUTEX_PAIR);
    let wire = side.replay(&silent, &with_status).unwrap();
    side.finalize(true).unwrap();
    handle.join().unwrap().unwrap();

    let mut local = in_process(MUTEX_PAIR);
    let direct = local.replay_sequence(&silent, &with_status).unwrap();

    assert_eq!(wire.len(), direct.len());
    for (w, d) in wire.iter().zip(&direct) {
        assert_eq!(w.transition, d.transition);
        assert_eq!(w.actors, d.actors);
    }
}

#[test]
fn test_one_way_runs_match_the_in_process_app() {
    let (mut side, handle) = serve(MUTEX_PAIR);
    let wire = side.go_one_way(None, true).unwrap();
    side.finalize(false).unwrap();
    handle.join().unwrap().unwrap();

    let direct = in_process(MUTEX_PAIR).go_one_way(None, true).unwrap();
    let aids = |steps: &[stateless_mc::remote::ReplayedStep]| -> Vec<Aid> {
        steps.iter().map(|s| s.transition.aid).collect()
    };
    assert_eq!(aids(&wire), aids(&direct));
    assert_eq!(wire.len(), 6);
}

// =============================================================================
// Framing
// =============================================================================

#[test]
fn test_unexpected_reply_is_a_protocol_error() {
    let (checker, mut app) = Channel::pair().unwrap();
    app.send(&Message::ActorsMaxpidReply { maxpid: 3 }).unwrap();
    let mut side = CheckerSide::new(checker, 0, 0);
    let err = side.expect_waiting().unwrap_err();
    assert!(matches!(err, McError::Protocol(_)), "{:?}", err);
}

#[test]
fn test_closed_app_is_reported() {
    let (checker, app) = Channel::pair().unwrap();
    drop(app);
    let mut side = CheckerSide::new(checker, 0, 0);
    assert!(side.check_deadlock(false).is_err());
}
