//! Search of the critical transition of a counter-example: the last step after
//! which every execution is incorrect.

use super::{trace_line, DfsExplorer, ExplorationContext, RestoreBase, SearchOutcome};
use crate::config::{ExplorerKind, ReductionMode};
use crate::error::McError;
use crate::reduction::build_reduction;
use crate::state::StateId;
use crate::transition::{Aid, Transition};
use std::sync::Arc;
use tracing::{debug, info};

/// Walks a counter-example backward. From each prefix, a nested depth-first search
/// looks for a correct execution; the first prefix that has one makes the next step
/// of the counter-example the critical transition.
pub struct CriticalTransitionExplorer {
    /// `stack[i]` is the state `trace[i]` was taken from
    stack: Vec<StateId>,
    trace: Vec<Arc<Transition>>,
}

impl CriticalTransitionExplorer {
    pub fn new(stack: &[StateId], trace: Vec<Arc<Transition>>) -> Self {
        CriticalTransitionExplorer {
            stack: stack.to_vec(),
            trace,
        }
    }

    pub fn run(&self, ctx: &mut ExplorationContext) -> Result<Option<Arc<Transition>>, McError> {
        info!("Start the critical transition search");
        let mode = match ctx.reduction.mode() {
            ReductionMode::BfsOdpor | ReductionMode::BefsOdpor => ReductionMode::Odpor,
            other => other,
        };
        let saved_reduction =
            std::mem::replace(&mut ctx.reduction, build_reduction(mode, ExplorerKind::Dfs));
        let saved_base = std::mem::take(&mut ctx.base);
        let saved_outputs = ctx.suspend_outputs();
        ctx.looking_for_critical = true;

        let found = self.search(ctx);

        ctx.looking_for_critical = false;
        ctx.resume_outputs(saved_outputs);
        ctx.base = saved_base;
        ctx.reduction = saved_reduction;

        let found = found?;
        match found {
            Some(i) => self.log_found(i),
            None => info!("No critical transition found. Every execution of the program is incorrect."),
        }
        Ok(found.map(|i| Arc::clone(&self.trace[i])))
    }

    /// Index in the trace of the critical transition.
    fn search(&self, ctx: &mut ExplorationContext) -> Result<Option<usize>, McError> {
        let len = self.trace.len().min(self.stack.len());
        for i in (0..len).rev() {
            if ctx.arena.contains(self.stack[i]) && ctx.arena.state(self.stack[i]).has_correct_descendent() {
                debug!(step = i, "a correct execution is already known from there");
                return Ok(Some(i));
            }
            let prefix: Vec<(Aid, u32)> = self.trace[..i]
                .iter()
                .map(|t| (t.aid, t.times_considered))
                .collect();
            debug!(step = i, "looking for a correct execution after the first {} steps", i);
            ctx.base = RestoreBase {
                checkpoint: None,
                prefix,
            };
            ctx.remote.restore_checker_side(None)?;
            ctx.remote.replay_sequence(&ctx.base.prefix, &[])?;

            if DfsExplorer::new().run(ctx)? == SearchOutcome::ReachedCorrectExecution {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn log_found(&self, critical: usize) {
        let title = "*** CRITICAL TRANSITION FOUND ***";
        let stars = "*".repeat(title.len());
        info!("{}", stars);
        info!("{}", title);
        info!("{}", stars);
        info!("Current knowledge of explored stack:");
        for (j, t) in self.trace.iter().enumerate() {
            let verdict = if j < critical { "  CORRECT" } else { "INCORRECT" };
            info!("  ({}) {}", verdict, trace_line(t));
        }
        info!("Found the critical transition: {}", trace_line(&self.trace[critical]));
    }
}
