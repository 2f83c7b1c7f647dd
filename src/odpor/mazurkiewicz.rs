//! Costly check that no two explored maximal executions are equivalent.

use super::execution::{one_string_textual_trace, Execution, PartialExecution};
use crate::error::McError;
use crate::transition::Transition;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Every maximal execution explored so far, one per Mazurkiewicz class.
#[derive(Debug, Default)]
pub struct MazurkiewiczTraces {
    classes: Vec<PartialExecution>,
}

impl MazurkiewiczTraces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether `v` can be obtained from `u` by swapping adjacent independent steps.
    pub fn are_equivalent(u: &[Arc<Transition>], v: &[Arc<Transition>]) -> bool {
        if u.len() != v.len() {
            return false;
        }
        let mut rest: Vec<&Arc<Transition>> = v.iter().collect();
        for a in u {
            let mut found = None;
            for (i, b) in rest.iter().enumerate() {
                if b.aid == a.aid && b.type_() == a.type_() {
                    found = Some(i);
                    break;
                }
                if b.depends(a) {
                    debug!(
                        "not equivalent: a-->b in one trace and b-->a in the other\na := Actor {}: {}\nb := Actor {}: {}",
                        a.aid, a, b.aid, b
                    );
                    return false;
                }
            }
            match found {
                Some(i) => {
                    rest.remove(i);
                }
                None => return false,
            }
        }
        true
    }

    /// Records the maximal execution `exec`, failing if an equivalent one was
    /// recorded before.
    pub fn record_new_execution(&mut self, exec: &Execution) -> Result<(), McError> {
        let seq: PartialExecution = exec.events().map(|e| Arc::clone(e.transition())).collect();
        if let Some(previous) = self.classes.iter().find(|c| Self::are_equivalent(&seq, c)) {
            error!("Inserted a sequence that is equivalent with an already explored one!");
            error!("Previous sequence was:\n{}", one_string_textual_trace(previous));
            error!("New one is:\n{}", one_string_textual_trace(&seq));
            return Err(McError::Internal(
                "the reduction explored two equivalent executions".to_string(),
            ));
        }
        self.classes.push(seq);
        debug!(recorded = self.classes.len(), "recorded a new Mazurkiewicz trace");
        Ok(())
    }

    pub fn log_data(&self) {
        let mut by_size: BTreeMap<usize, usize> = BTreeMap::new();
        for trace in &self.classes {
            *by_size.entry(trace.len()).or_default() += 1;
        }
        info!("Mazurkiewicz stats:");
        for (size, nb) in by_size {
            info!("... There are {:5} traces of size {:5}", nb, size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{ActorTransition, Aid, ObjectAccessKind, ObjectAccessTransition, TransitionKind};

    fn dep(aid: u32) -> Arc<Transition> {
        Arc::new(Transition::new(
            Aid(aid),
            0,
            TransitionKind::ObjectAccess(ObjectAccessTransition {
                object: 1,
                access: ObjectAccessKind::Both,
                name: "o".to_string(),
            }),
        ))
    }

    fn indep(aid: u32) -> Arc<Transition> {
        Arc::new(Transition::new(Aid(aid), 0, TransitionKind::Actor(ActorTransition::Sleep)))
    }

    #[test]
    fn test_swapping_independent_steps() {
        assert!(MazurkiewiczTraces::are_equivalent(
            &[indep(1), indep(2)],
            &[indep(2), indep(1)]
        ));
        assert!(!MazurkiewiczTraces::are_equivalent(
            &[dep(1), dep(2)],
            &[dep(2), dep(1)]
        ));
        assert!(!MazurkiewiczTraces::are_equivalent(&[dep(1)], &[dep(1), dep(2)]));
    }

    #[test]
    fn test_record_rejects_equivalent_execution() {
        let mut traces = MazurkiewiczTraces::new();
        traces
            .record_new_execution(&Execution::from_partial(&[indep(1), indep(2)]))
            .unwrap();
        traces
            .record_new_execution(&Execution::from_partial(&[dep(1), dep(2)]))
            .unwrap();
        assert!(traces
            .record_new_execution(&Execution::from_partial(&[indep(2), indep(1)]))
            .is_err());
        assert_eq!(traces.len(), 2);
    }
}
