//! Depth-first exploration.

use super::{transitions_of, BugKind, ExplorationContext, SearchOutcome, StepOutcome};
use crate::config::StrategyKind;
use crate::error::McError;
use crate::odpor::Execution;
use crate::state::StateId;
use crate::transition::Transition;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Walks the exploration tree depth-first, keeping the states from the root to the
/// current one on a stack. The app is restored each time the search backtracks.
#[derive(Default)]
pub struct DfsExplorer {
    stack: Vec<StateId>,
    exec: Execution,
}

impl DfsExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explores from the current state of the app until every state was exhausted
    /// or the outcome is decided.
    pub fn run(&mut self, ctx: &mut ExplorationContext) -> Result<SearchOutcome, McError> {
        info!(
            "Start a DFS exploration. Reduction is: {}.",
            ctx.reduction.mode().as_str()
        );
        let outcome = self.explore(ctx);
        while let Some(id) = self.stack.pop() {
            ctx.arena.release(id);
        }
        ctx.release_garbage();
        self.exec = Execution::new();
        outcome
    }

    fn explore(&mut self, ctx: &mut ExplorationContext) -> Result<SearchOutcome, McError> {
        let root = ctx.create_state(None, None)?;
        self.stack.push(root);
        if ctx.config.one_way {
            if let Some(outcome) = self.follow_app(ctx)? {
                return Ok(outcome);
            }
        }

        while let Some(&state) = self.stack.last() {
            if self.stack.len() > ctx.config.max_depth {
                warn!(
                    "/!\\ Max depth of {} reached! THIS WILL PROBABLY BREAK the dpor reduction /!\\",
                    ctx.config.max_depth
                );
                self.backtrack(ctx)?;
                continue;
            }

            let next = ctx
                .reduction
                .next_to_explore(&mut ctx.arena, state, ctx.strategy.as_ref());
            let Some(next) = next else {
                let outcome = ctx.check_deadlock(&self.stack, &self.exec)?;
                if !outcome.is_continue() {
                    return Ok(outcome);
                }
                if ctx.arena.state(state).actor_count() == 0 {
                    let outcome = ctx.finish_execution(state, &self.stack, &self.exec)?;
                    if !outcome.is_continue() {
                        return Ok(outcome);
                    }
                }
                self.backtrack(ctx)?;
                continue;
            };

            trace!(
                state = ctx.arena.state(state).num(),
                aid = %next.aid,
                depth = self.stack.len(),
                "exploring"
            );
            let (child, transition) = match ctx.execute_step(state, next, &self.stack, &self.exec)? {
                StepOutcome::Reached { child, transition } => (child, transition),
                StepOutcome::Stopped(SearchOutcome::Continue) => continue,
                StepOutcome::Stopped(outcome) => return Ok(outcome),
            };
            if let Some(outcome) = self.push(ctx, child, transition)? {
                return Ok(outcome);
            }
            if ctx.config.one_way {
                if let Some(outcome) = self.follow_app(ctx)? {
                    return Ok(outcome);
                }
            }
        }
        Ok(SearchOutcome::ExhaustedCleanly)
    }

    /// Makes `child`, reached through `t`, the new top of the stack and looks for
    /// the races this step revealed.
    fn push(
        &mut self,
        ctx: &mut ExplorationContext,
        child: StateId,
        t: Arc<Transition>,
    ) -> Result<Option<SearchOutcome>, McError> {
        self.stack.push(child);
        if let Err(race) = self.exec.push_transition(t) {
            let outcome =
                ctx.report_bug(BugKind::DataRace(race), &self.stack, transitions_of(&self.exec))?;
            if !outcome.is_continue() {
                return Ok(Some(outcome));
            }
        }

        let maximal = ctx.arena.state(child).enabled_actors().is_empty();
        if ctx.reduction.races_on_each_step() || maximal {
            for opened in ctx.handle_races(&self.exec, &self.stack) {
                ctx.arena.release(opened);
            }
        }
        if maximal {
            ctx.record_maximal_execution(&self.exec)?;
        }
        Ok(None)
    }

    /// Lets the app run on its own from the top of the stack, and pushes every
    /// state it went through.
    fn follow_app(&mut self, ctx: &mut ExplorationContext) -> Result<Option<SearchOutcome>, McError> {
        let seed = (ctx.config.strategy == StrategyKind::Uniform)
            .then(|| ctx.config.random_seed ^ ctx.stats.explored_traces);
        let steps = match ctx.remote.go_one_way(seed, true) {
            Ok(steps) => steps,
            Err(e) => {
                // the steps taken before the failure are lost with it
                let kind = BugKind::from_finding(e)?;
                let outcome = ctx.report_bug(kind, &self.stack, transitions_of(&self.exec))?;
                if !outcome.is_continue() {
                    return Ok(Some(outcome));
                }
                if let Some(&top) = self.stack.last() {
                    ctx.restore_state(top)?;
                }
                return Ok(None);
            }
        };
        debug!(steps = steps.len(), "the app ran on its own");
        for step in steps {
            let Some(&parent) = self.stack.last() else {
                break;
            };
            let t = Arc::clone(&step.transition);
            let child = ctx.adopt_step(parent, step);
            ctx.dot_edge(parent, child, &t)?;
            if let Some(outcome) = self.push(ctx, child, t)? {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    /// Pops the states that have nothing left to explore, then restores the app to
    /// the new top of the stack.
    fn backtrack(&mut self, ctx: &mut ExplorationContext) -> Result<(), McError> {
        ctx.notify_backtracking();
        while let Some(child) = self.stack.pop() {
            ctx.arena.release(child);
            let Some(&parent) = self.stack.last() else {
                break;
            };
            ctx.reduction.on_backtrack(&mut ctx.arena, parent);
            self.exec.remove_last_event();
            if ctx.arena.state(parent).has_more_to_be_explored() {
                debug!(
                    "Backtracking to state #{} at depth {}",
                    ctx.arena.state(parent).num(),
                    self.stack.len()
                );
                break;
            }
        }
        ctx.release_garbage();
        if let Some(&top) = self.stack.last() {
            ctx.restore_state(top)?;
        }
        Ok(())
    }
}
