//! Record traces: the `(actor, branch)` path of one execution, replayable from the
//! initial state of the app.

use super::{BugKind, ExplorationContext, SearchOutcome};
use crate::error::{ConfigError, McError};
use crate::transition::{Aid, Transition};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Path of an execution, printed as `1;2;3/1` (the branch is only shown when non-zero).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTrace {
    steps: Vec<(Aid, u32)>,
}

impl RecordTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transitions(transitions: &[Arc<Transition>]) -> Self {
        RecordTrace {
            steps: transitions
                .iter()
                .map(|t| (t.aid, t.times_considered))
                .collect(),
        }
    }

    pub fn push(&mut self, aid: Aid, times_considered: u32) {
        self.steps.push((aid, times_considered));
    }

    pub fn steps(&self) -> &[(Aid, u32)] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for RecordTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (aid, times)) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", aid)?;
            if *times > 0 {
                write!(f, "/{}", times)?;
            }
        }
        Ok(())
    }
}

impl FromStr for RecordTrace {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            key: "model-check/replay".to_string(),
            value: s.to_string(),
        };
        let mut trace = RecordTrace::new();
        for item in s.split(';').map(str::trim).filter(|i| !i.is_empty()) {
            let (aid, times) = match item.split_once('/') {
                Some((aid, times)) => (aid, times.parse().map_err(|_| invalid())?),
                None => (item, 0),
            };
            let aid: u32 = aid.parse().map_err(|_| invalid())?;
            trace.push(Aid(aid), times);
        }
        Ok(trace)
    }
}

/// Runs exactly the path of `trace` from the initial state of the app and reports
/// what happens at its end.
pub fn replay(ctx: &mut ExplorationContext, trace: &RecordTrace) -> Result<SearchOutcome, McError> {
    info!("Replaying the trace {}", trace);
    ctx.remote.restore_checker_side(None)?;
    let mut executed: Vec<Arc<Transition>> = Vec::with_capacity(trace.len());

    for (step, &(aid, times)) in trace.steps().iter().enumerate() {
        let actors = ctx.remote.get_actors_status(false)?;
        if !actors.iter().any(|a| a.aid == aid && a.enabled) {
            let kind = BugKind::NonDeterminism {
                message: format!(
                    "actor {} is not enabled at step {} of the replayed trace",
                    aid, step
                ),
            };
            return Ok(ctx.conclude_replay(kind, executed));
        }
        let t = match ctx.remote.handle_simcall(aid, times, true) {
            Ok(Some(t)) => t,
            Ok(None) => {
                return Err(McError::Internal(format!(
                    "no transition reported for actor {}",
                    aid
                )))
            }
            Err(e) => {
                let kind = BugKind::from_finding(e)?;
                return Ok(ctx.conclude_replay(kind, executed));
            }
        };
        info!("  Actor {} ==> simcall: {}", t.aid, t);
        executed.push(Arc::new(t));
        if let Err(e) = ctx.remote.wait_for_requests() {
            let kind = BugKind::from_finding(e)?;
            return Ok(ctx.conclude_replay(kind, executed));
        }
    }

    if ctx.remote.check_deadlock(ctx.config.verbose)? {
        return Ok(ctx.conclude_replay(BugKind::Deadlock, executed));
    }
    let actors = ctx.remote.get_actors_status(false)?;
    if actors.is_empty() {
        if let Err(e) = ctx.remote.finalize_app(false) {
            let kind = BugKind::from_finding(e)?;
            return Ok(ctx.conclude_replay(kind, executed));
        }
    }
    info!(
        "The replayed execution ended without error after {} transitions",
        executed.len()
    );
    Ok(SearchOutcome::ExhaustedCleanly)
}
