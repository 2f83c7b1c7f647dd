//! Best-first exploration.
//!
//! Instead of always going back to the closest ancestor with work left, the
//! explorer keeps a set of opened states and jumps to the one the configuration
//! prefers: the oldest one (`bfs-odpor`), the best valued one (`befs-odpor`), a
//! random one, or the deepest ancestor when no strategy guides the search. The stack
//! and the execution are rebuilt from the chosen state's path after each jump.

use super::{transitions_of, BugKind, ExplorationContext, SearchOutcome, StepOutcome};
use crate::config::{ReductionMode, StrategyKind};
use crate::error::McError;
use crate::odpor::Execution;
use crate::state::{StateArena, StateId};
use crate::transition::Transition;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Default)]
pub struct BeFsExplorer {
    stack: Vec<StateId>,
    exec: Execution,
    /// States that may still have work; each entry holds one reference
    opened: VecDeque<StateId>,
}

impl BeFsExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&mut self, ctx: &mut ExplorationContext) -> Result<SearchOutcome, McError> {
        info!(
            "Start a BeFS exploration. Reduction is: {}.",
            ctx.reduction.mode().as_str()
        );
        let outcome = self.explore(ctx);
        for id in self.opened.drain(..).chain(self.stack.drain(..)) {
            ctx.arena.release(id);
        }
        ctx.release_garbage();
        self.exec = Execution::new();
        outcome
    }

    fn explore(&mut self, ctx: &mut ExplorationContext) -> Result<SearchOutcome, McError> {
        let root = ctx.create_state(None, None)?;
        self.stack.push(root);
        ctx.arena.acquire(root);
        self.opened.push_back(root);

        while let Some(&state) = self.stack.last() {
            trace!(
                depth = self.stack.len(),
                state = ctx.arena.state(state).num(),
                todo = ctx.arena.state(state).count_todo(),
                opened = self.opened.len(),
                "exploring"
            );
            if self.stack.len() > ctx.config.max_depth {
                warn!(
                    "/!\\ Max depth of {} reached! THIS WILL PROBABLY BREAK the reduction /!\\",
                    ctx.config.max_depth
                );
                warn!("/!\\ Any bug you may find are real, but not finding bug doesn't mean anything /!\\");
                warn!("/!\\ You should consider changing the depth limit with --cfg=model-check/max-depth /!\\");
                match self.backtrack(ctx)? {
                    SearchOutcome::Continue => continue,
                    outcome => return Ok(outcome),
                }
            }

            let next = ctx
                .reduction
                .next_to_explore(&mut ctx.arena, state, ctx.strategy.as_ref());
            let Some(next) = next else {
                debug!(
                    "{} actors remain, but none of them need to be interleaved (depth {}).",
                    ctx.arena.state(state).actor_count(),
                    self.stack.len()
                );
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
                match self.backtrack(ctx)? {
                    SearchOutcome::Continue => continue,
                    outcome => return Ok(outcome),
                }
            };

            if ctx.config.befs_threshold != 0 && self.should_switch(ctx, state, next.aid) {
                ctx.arena.acquire(state);
                self.opened.push_back(state);
                match self.backtrack(ctx)? {
                    SearchOutcome::Continue => continue,
                    outcome => return Ok(outcome),
                }
            }

            let (child, transition) = match ctx.execute_step(state, next, &self.stack, &self.exec)? {
                StepOutcome::Reached { child, transition } => (child, transition),
                StepOutcome::Stopped(SearchOutcome::Continue) => continue,
                StepOutcome::Stopped(outcome) => return Ok(outcome),
            };
            ctx.reduction.on_backtrack(&mut ctx.arena, state);
            if ctx.arena.state(state).has_more_to_be_explored() {
                ctx.arena.acquire(state);
                self.opened.push_back(state);
            }
            if let Some(outcome) = self.push(ctx, child, transition)? {
                return Ok(outcome);
            }
        }
        Ok(SearchOutcome::ExhaustedCleanly)
    }

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
            let created = ctx.handle_races(&self.exec, &self.stack);
            self.opened.extend(created);
            if !materializes(ctx) && !walks_stack(ctx) {
                self.reopen_stack(ctx);
            }
        }
        if maximal {
            ctx.record_maximal_execution(&self.exec)?;
        }
        Ok(None)
    }

    /// Races may give work back to states of the stack that were already dropped
    /// from the opened ones.
    fn reopen_stack(&mut self, ctx: &mut ExplorationContext) {
        for &id in &self.stack {
            if ctx.arena.state(id).has_more_to_be_explored() && !self.opened.contains(&id) {
                ctx.arena.acquire(id);
                self.opened.push_back(id);
            }
        }
    }

    /// Whether the best opened state is enough better than going on with `aid`
    /// from `state`.
    fn should_switch(
        &mut self,
        ctx: &mut ExplorationContext,
        state: StateId,
        aid: crate::transition::Aid,
    ) -> bool {
        if walks_stack(ctx) {
            return false;
        }
        let dist = {
            let s = ctx.arena.state(state);
            match s.actors().get(&aid) {
                Some(actor) => i64::from(ctx.strategy.valuation(s, actor)),
                None => return false,
            }
        };
        let Some(index) = self.best_index(ctx) else {
            return false;
        };
        let Some(best) = valuation_of(ctx, self.opened[index]) else {
            return false;
        };
        let switch = dist * i64::from(ctx.config.befs_threshold) / 100 > i64::from(best);
        if switch {
            debug!("current selected dist:{} vs. best*rate:{}", dist, best);
        }
        switch
    }

    /// Drops the opened states that are exhausted, then returns the index of the
    /// preferred one.
    fn best_index(&mut self, ctx: &mut ExplorationContext) -> Option<usize> {
        let max_depth = ctx.config.max_depth;
        let (keep, exhausted): (VecDeque<StateId>, VecDeque<StateId>) = std::mem::take(&mut self.opened)
            .into_iter()
            .partition(|&id| is_candidate(&ctx.arena, id, max_depth));
        self.opened = keep;
        for id in exhausted {
            ctx.arena.release(id);
        }
        if self.opened.is_empty() {
            debug!("No more opened state");
            return None;
        }
        let index = match ctx.reduction.mode() {
            ReductionMode::BfsOdpor => 0,
            ReductionMode::BefsOdpor => (0..self.opened.len())
                .min_by_key(|&i| valuation_of(ctx, self.opened[i]).unwrap_or(i32::MAX))
                .unwrap_or(0),
            _ => ctx.rng.gen_range(0, self.opened.len() as u64) as usize,
        };
        Some(index)
    }

    /// Takes the state to go on with, with one reference on it.
    fn pick_target(&mut self, ctx: &mut ExplorationContext) -> Option<StateId> {
        if walks_stack(ctx) {
            for id in self.opened.drain(..) {
                ctx.arena.release(id);
            }
            let max_depth = ctx.config.max_depth;
            let target = self.stack.iter().rev().copied().find(|&id| {
                let s = ctx.arena.state(id);
                s.depth() < max_depth && s.has_more_to_be_explored()
            })?;
            ctx.arena.acquire(target);
            return Some(target);
        }
        let index = self.best_index(ctx)?;
        self.opened.remove(index)
    }

    /// Jumps to the preferred opened state. `ExhaustedCleanly` when none is left.
    fn backtrack(&mut self, ctx: &mut ExplorationContext) -> Result<SearchOutcome, McError> {
        ctx.notify_backtracking();
        let Some(target) = self.pick_target(ctx) else {
            debug!("No more opened point of exploration, the search will end");
            return Ok(SearchOutcome::ExhaustedCleanly);
        };
        debug!(
            "Backtracking to state #{} at depth {}",
            ctx.arena.state(target).num(),
            ctx.arena.state(target).depth()
        );
        let initialized = ctx.restore_state(target)?;
        let outcome = self.restore_stack(ctx, target, &initialized)?;
        ctx.arena.release(target);
        ctx.release_garbage();
        Ok(outcome)
    }

    /// Rebuilds the stack and the execution along the path to `target`.
    ///
    /// Events already explored in a previous branch keep their races as computed,
    /// unless the search may leave branches before their end (non-zero threshold).
    /// Events leading to `initialized` states are new and checked for data races.
    fn restore_stack(
        &mut self,
        ctx: &mut ExplorationContext,
        target: StateId,
        initialized: &[StateId],
    ) -> Result<SearchOutcome, McError> {
        let path = ctx.arena.path_to(target);
        for &id in &path {
            ctx.arena.acquire(id);
        }
        for id in self.stack.drain(..) {
            ctx.arena.release(id);
        }
        self.stack = path;
        self.exec = Execution::new();

        let restoring = ctx.config.befs_threshold == 0;
        for i in 1..self.stack.len() {
            let id = self.stack[i];
            let fresh = initialized.contains(&id);
            let t = ctx
                .arena
                .state(id)
                .incoming_transition()
                .cloned()
                .ok_or_else(|| {
                    McError::Internal(format!(
                        "state {} has a parent but no incoming transition",
                        ctx.arena.state(id).num()
                    ))
                })?;
            let pushed = if restoring && !fresh {
                self.exec.push_transition_restoring(t)
            } else {
                self.exec.push_transition(t)
            };
            if let Err(race) = pushed {
                if fresh {
                    let outcome = ctx.report_bug(
                        BugKind::DataRace(race),
                        &self.stack[..=i],
                        transitions_of(&self.exec),
                    )?;
                    if !outcome.is_continue() {
                        return Ok(outcome);
                    }
                }
            }
        }
        trace!(depth = self.stack.len(), "stack restored");
        Ok(SearchOutcome::Continue)
    }
}

/// Whether the reduction creates states ahead of time.
fn materializes(ctx: &ExplorationContext) -> bool {
    matches!(
        ctx.reduction.mode(),
        ReductionMode::BfsOdpor | ReductionMode::BefsOdpor
    )
}

/// Without a strategy, the search goes back to the deepest ancestor with work left.
fn walks_stack(ctx: &ExplorationContext) -> bool {
    !materializes(ctx) && ctx.config.strategy == StrategyKind::None
}

fn is_candidate(arena: &StateArena, id: StateId, max_depth: usize) -> bool {
    let s = arena.state(id);
    s.depth() < max_depth && (!s.is_initialized() || s.has_more_to_be_explored())
}

/// Valuation of the step the search would take from `id`. States not initialized
/// yet are valued by the step leading to them.
fn valuation_of(ctx: &ExplorationContext, id: StateId) -> Option<i32> {
    let s = ctx.arena.state(id);
    if s.is_initialized() {
        return ctx.strategy.best_transition(s, true).map(|(_, v)| v);
    }
    let t = s.incoming_transition()?;
    let parent = ctx.arena.state(s.parent()?);
    parent
        .actors()
        .get(&t.aid)
        .map(|actor| ctx.strategy.valuation(parent, actor))
}
