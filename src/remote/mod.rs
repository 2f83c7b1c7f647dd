//! The checker's handle on the checked program.
//!
//! [`RemoteApp`] is the only way the exploration talks to the program. Two
//! implementations exist: [`ProcessApp`] drives real forked processes over Unix
//! sockets with the [`protocol`] messages, [`InProcessApp`] runs a
//! [`CheckedProgram`](crate::app::CheckedProgram) in the checker's own process and
//! is what the tests use.

pub mod app_side;
pub mod channel;
pub mod checker_side;
pub mod in_process;
pub mod protocol;
pub mod remote_app;

use crate::error::McError;
use crate::transition::{Aid, Transition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use app_side::AppSide;
pub use channel::Channel;
pub use checker_side::CheckerSide;
pub use in_process::InProcessApp;
pub use protocol::Message;
pub use remote_app::ProcessApp;

/// Opaque handle on a saved copy of the checked program.
pub type CheckpointId = u64;

/// One actor of the checked program, as reported by the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStatus {
    pub aid: Aid,
    pub enabled: bool,
    /// How many branches the pending simcall has
    pub max_considered: u32,
    /// One pending transition per branch, when they were asked for
    pub transitions: Vec<Transition>,
}

/// A step the app executed on its own, with the actor statuses right after it.
#[derive(Debug, Clone)]
pub struct ReplayedStep {
    pub transition: Arc<Transition>,
    pub actors: Vec<ActorStatus>,
}

pub trait RemoteApp {
    /// Actors alive in the current state of the app, in id order.
    fn get_actors_status(&mut self, want_transitions: bool) -> Result<Vec<ActorStatus>, McError>;

    /// Executes branch `times_considered` of the pending simcall of `aid`. Returns
    /// the transition that executed when asked for.
    fn handle_simcall(
        &mut self,
        aid: Aid,
        times_considered: u32,
        want_transition: bool,
    ) -> Result<Option<Transition>, McError>;

    /// Lets the app run until every actor is blocked on its next simcall. A failed
    /// assertion in those local steps surfaces as [`McError::AssertionFailed`].
    fn wait_for_requests(&mut self) -> Result<(), McError>;

    /// Whether some actors remain and none of them can move.
    fn check_deadlock(&mut self, verbose: bool) -> Result<bool, McError>;

    /// Replays `silent` from the current app state, then `with_status` while
    /// reporting every step.
    fn replay_sequence(
        &mut self,
        silent: &[(Aid, u32)],
        with_status: &[(Aid, u32)],
    ) -> Result<Vec<ReplayedStep>, McError>;

    /// Lets the app run to completion on its own, picking the lowest enabled actor
    /// or a random one when a seed is given.
    fn go_one_way(
        &mut self,
        random_seed: Option<u64>,
        want_transitions: bool,
    ) -> Result<Vec<ReplayedStep>, McError>;

    /// Saves the current app state for later restoration.
    fn clone_checker_side(&mut self) -> Result<CheckpointId, McError>;

    /// Makes `from` (or the initial state when `None`) the current app state.
    fn restore_checker_side(&mut self, from: Option<CheckpointId>) -> Result<(), McError>;

    fn release_checkpoint(&mut self, id: CheckpointId);

    /// Number of checkpoints currently alive.
    fn checkpoint_count(&self) -> usize;

    /// Lets the current app state run its exit handlers and terminate.
    fn finalize_app(&mut self, terminate_asap: bool) -> Result<(), McError>;

    /// Highest actor id ever used by the app.
    fn get_maxpid(&mut self) -> Result<u32, McError>;
}
