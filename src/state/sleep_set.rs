use crate::transition::{Aid, Transition};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::trace;

/// Actors whose next step need not be explored from a state, each with the
/// transition that put it to sleep.
#[derive(Debug, Clone, Default)]
pub struct SleepSet {
    sleeping: BTreeMap<Aid, Arc<Transition>>,
}

impl SleepSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep set of a child reached through `incoming`: every candidate that is
    /// independent with `incoming` keeps sleeping, the others wake up.
    pub fn inherit<'a>(
        candidates: impl IntoIterator<Item = &'a Arc<Transition>>,
        incoming: &Transition,
    ) -> Self {
        let mut sleeping = BTreeMap::new();
        for t in candidates {
            if incoming.depends(t) {
                trace!(
                    "transition >>{}<< leaves the sleep set, it is dependent with incoming >>{}<<",
                    t,
                    incoming
                );
                continue;
            }
            sleeping.entry(t.aid).or_insert_with(|| Arc::clone(t));
        }
        SleepSet { sleeping }
    }

    pub fn insert(&mut self, transition: Arc<Transition>) {
        self.sleeping.insert(transition.aid, transition);
    }

    pub fn contains(&self, aid: Aid) -> bool {
        self.sleeping.contains_key(&aid)
    }

    pub fn actors(&self) -> BTreeSet<Aid> {
        self.sleeping.keys().copied().collect()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Arc<Transition>> + '_ {
        self.sleeping.values()
    }

    pub fn len(&self) -> usize {
        self.sleeping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sleeping.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{ActorTransition, MutexOp, MutexTransition, TransitionKind};

    fn lock(aid: u32, mutex: u32) -> Arc<Transition> {
        Arc::new(Transition::new(
            Aid(aid),
            0,
            TransitionKind::Mutex(MutexTransition {
                op: MutexOp::AsyncLock,
                mutex,
                owner: None,
            }),
        ))
    }

    #[test]
    fn test_dependent_sleepers_wake_up() {
        let sleepers = [lock(1, 1), lock(2, 2)];
        let incoming = lock(3, 1);
        let sleep = SleepSet::inherit(sleepers.iter(), &incoming);
        assert!(!sleep.contains(Aid(1)));
        assert!(sleep.contains(Aid(2)));
    }

    #[test]
    fn test_same_actor_wakes_up() {
        let sleepers = [Arc::new(Transition::new(
            Aid(1),
            0,
            TransitionKind::Actor(ActorTransition::Sleep),
        ))];
        let incoming = Transition::new(Aid(1), 0, TransitionKind::Actor(ActorTransition::Sleep));
        assert!(SleepSet::inherit(sleepers.iter(), &incoming).is_empty());
    }
}
