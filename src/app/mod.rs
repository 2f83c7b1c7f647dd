//! The checked program, seen from its own side.
//!
//! A [`CheckedProgram`] exposes its actors, what each of them is about to do and a
//! way to make one of them do it. [`crate::remote::AppSide`] serves it over the wire
//! protocol, [`crate::remote::InProcessApp`] drives it directly.

pub mod scripted;

use crate::error::McError;
use crate::remote::ActorStatus;
use crate::transition::{Aid, Transition};

pub use scripted::{Op, Scenario, ScriptedProgram};

pub trait CheckedProgram: Send {
    /// Actors alive, in id order, without their pending transitions.
    fn actors(&self) -> Vec<ActorStatus>;

    /// Branch `times` of the simcall `aid` is blocked on.
    fn pending_transition(&self, aid: Aid, times: u32) -> Option<Transition>;

    /// Runs branch `times` of the pending simcall of `aid` and returns what happened.
    fn execute(&mut self, aid: Aid, times: u32) -> Result<Transition, McError>;

    /// Runs every actor until it blocks on its next simcall or terminates.
    fn run_local_steps(&mut self) -> Result<(), McError>;

    /// Highest actor id ever used.
    fn max_pid(&self) -> u32;

    /// Runs the exit handlers of the program.
    fn finalize(&mut self) {}

    /// One line per actor, for deadlock reports.
    fn describe_actors(&self) -> Vec<String>;

    fn box_clone(&self) -> Box<dyn CheckedProgram>;

    /// Actor statuses, with every pending transition when asked for.
    fn actors_status(&self, want_transitions: bool) -> Vec<ActorStatus> {
        let mut actors = self.actors();
        if want_transitions {
            for actor in &mut actors {
                actor.transitions = (0..actor.max_considered)
                    .filter_map(|times| self.pending_transition(actor.aid, times))
                    .collect();
            }
        }
        actors
    }

    /// Some actors remain and none of them can move.
    fn is_deadlocked(&self) -> bool {
        let actors = self.actors();
        !actors.is_empty() && actors.iter().all(|a| !a.enabled)
    }
}

impl Clone for Box<dyn CheckedProgram> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
