//! Barrier, mutex, semaphore and condition-variable transitions.

use super::{Transition, TransitionKind, TransitionType};
use crate::odpor::execution::{EventHandle, Execution};
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BarrierOp {
    AsyncLock,
    Wait,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierTransition {
    pub op: BarrierOp,
    pub barrier: u32,
}

impl BarrierTransition {
    pub fn type_(&self) -> TransitionType {
        match self.op {
            BarrierOp::AsyncLock => TransitionType::BarrierAsyncLock,
            BarrierOp::Wait => TransitionType::BarrierWait,
        }
    }

    pub(crate) fn depends(&self, other: &Transition) -> bool {
        let TransitionKind::Barrier(o) = &other.kind else {
            // barriers are independent with non-barrier transitions
            return false;
        };
        if self.barrier != o.barrier {
            return false;
        }
        match (self.op, o.op) {
            // requests are not ordered in a barrier
            (BarrierOp::AsyncLock, BarrierOp::AsyncLock) | (BarrierOp::Wait, BarrierOp::Wait) => {
                false
            }
            // the last lock enables every wait
            _ => true,
        }
    }

    pub(crate) fn reversible_race(&self, later: &BarrierTransition) -> bool {
        match later.op {
            BarrierOp::AsyncLock => true,
            BarrierOp::Wait => self.op != BarrierOp::AsyncLock,
        }
    }

    pub(crate) fn describe(&self) -> String {
        format!("{}(barrier: {})", self.type_(), self.barrier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MutexOp {
    AsyncLock,
    Test,
    Trylock,
    Unlock,
    Wait,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexTransition {
    pub op: MutexOp,
    pub mutex: u32,
    pub owner: Option<super::Aid>,
}

impl MutexTransition {
    pub fn type_(&self) -> TransitionType {
        match self.op {
            MutexOp::AsyncLock => TransitionType::MutexAsyncLock,
            MutexOp::Test => TransitionType::MutexTest,
            MutexOp::Trylock => TransitionType::MutexTrylock,
            MutexOp::Unlock => TransitionType::MutexUnlock,
            MutexOp::Wait => TransitionType::MutexWait,
        }
    }

    /// `other` has a type greater or equal to ours and another actor.
    pub(crate) fn depends(&self, other: &Transition) -> bool {
        match &other.kind {
            TransitionKind::Mutex(o) => {
                let independent = matches!(
                    (self.op, o.op),
                    // LOCK indep TEST/WAIT: lock never enables a wait
                    (MutexOp::AsyncLock, MutexOp::Test | MutexOp::Wait)
                    // LOCK indep UNLOCK: push_back and pop_front commute
                    | (MutexOp::AsyncLock, MutexOp::Unlock)
                    // tests and waits never change the owner
                    | (MutexOp::Test | MutexOp::Wait, MutexOp::Test | MutexOp::Wait)
                    // a trylock fails while a request is queued
                    | (MutexOp::Test, MutexOp::Trylock)
                    | (MutexOp::Trylock, MutexOp::Wait)
                    // two unlocks are never enabled together
                    | (MutexOp::Unlock, MutexOp::Unlock)
                );
                !independent && self.mutex == o.mutex
            }
            // The async lock of a condvar releases the mutex, like an unlock
            TransitionKind::Condvar(c) if self.op == MutexOp::Wait => {
                c.op == CondvarOp::AsyncLock && c.mutex == self.mutex
            }
            _ => false,
        }
    }

    pub(crate) fn can_be_co_enabled(&self, other: &Transition) -> bool {
        match &other.kind {
            TransitionKind::Mutex(o) => {
                if self.mutex != o.mutex {
                    return true;
                }
                // whoever can unlock or wait owns the mutex
                !matches!(
                    (self.op, o.op),
                    (MutexOp::Unlock, MutexOp::Wait) | (MutexOp::Wait, MutexOp::Wait)
                )
            }
            TransitionKind::Condvar(c) if self.op == MutexOp::Wait && c.op == CondvarOp::AsyncLock => {
                c.mutex != self.mutex
            }
            _ => true,
        }
    }

    /// Keyed on the later transition only.
    pub(crate) fn reversible_race(later: &MutexTransition) -> bool {
        match later.op {
            MutexOp::AsyncLock | MutexOp::Test | MutexOp::Trylock | MutexOp::Unlock => true,
            // Only an unlock (or a condvar async lock) is dependent with a wait, and it enabled it
            MutexOp::Wait => false,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self.owner {
            Some(owner) => format!("{}(mutex: {}, owner: {})", self.type_(), self.mutex, owner),
            None => format!("{}(mutex: {}, owner: none)", self.type_(), self.mutex),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SemOp {
    AsyncLock,
    Unlock,
    Wait,
}

/// `capacity` is the semaphore value right after the step was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreTransition {
    pub op: SemOp,
    pub sem: u32,
    pub granted: bool,
    pub capacity: i32,
}

impl SemaphoreTransition {
    pub fn type_(&self) -> TransitionType {
        match self.op {
            SemOp::AsyncLock => TransitionType::SemAsyncLock,
            SemOp::Unlock => TransitionType::SemUnlock,
            SemOp::Wait => TransitionType::SemWait,
        }
    }

    pub(crate) fn depends(&self, other: &Transition) -> bool {
        let TransitionKind::Semaphore(o) = &other.kind else {
            return false;
        };
        let independent = matches!(
            (self.op, o.op),
            (SemOp::AsyncLock, SemOp::Unlock | SemOp::Wait)
                | (SemOp::Unlock, SemOp::Unlock)
                | (SemOp::Wait, SemOp::Wait)
        );
        !independent && self.sem == o.sem
    }

    pub(crate) fn reversible_race(
        &self,
        later: &SemaphoreTransition,
        exec: &Execution,
        this_handle: EventHandle,
        later_handle: EventHandle,
    ) -> bool {
        match later.op {
            SemOp::AsyncLock | SemOp::Unlock => true,
            SemOp::Wait => {
                assert_eq!(
                    self.op,
                    SemOp::Unlock,
                    "only an unlock can race with a semaphore wait"
                );
                is_sem_wait_fireable_without_unlock(exec, this_handle, later_handle)
            }
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self.op {
            SemOp::Wait => format!(
                "{}(semaphore: {}, capacity: {}, granted: {})",
                self.type_(),
                self.sem,
                self.capacity,
                if self.granted { "yes" } else { "no" }
            ),
            _ => format!(
                "{}(semaphore: {}, capacity: {})",
                self.type_(),
                self.sem,
                self.capacity
            ),
        }
    }
}

fn as_semaphore(t: &Transition) -> Option<&SemaphoreTransition> {
    match &t.kind {
        TransitionKind::Semaphore(s) => Some(s),
        _ => None,
    }
}

/// Whether the wait at `wait_handle` would still be enabled if the unlock at
/// `unlock_handle` were removed from the execution.
fn is_sem_wait_fireable_without_unlock(
    exec: &Execution,
    unlock_handle: EventHandle,
    wait_handle: EventHandle,
) -> bool {
    let Some(unlock) = as_semaphore(exec.transition_at(unlock_handle)) else {
        panic!("event {} is not a semaphore unlock", unlock_handle);
    };
    let sem_id = unlock.sem;
    let waiter = exec.actor_at(wait_handle);
    let mut initial_capacity = -1;
    let mut nb_lock = 0;
    let mut nb_unlock = 0;
    let mut own_lock_found = false;

    for e in (0..=wait_handle).rev() {
        let Some(sem) = as_semaphore(exec.transition_at(e)) else {
            continue;
        };
        if sem.op == SemOp::Wait || sem.sem != sem_id {
            continue;
        }
        // Locks issued after the one matching the wait do not matter
        if !own_lock_found && sem.op == SemOp::AsyncLock {
            if exec.actor_at(e) != waiter {
                continue;
            }
            own_lock_found = true;
        }
        initial_capacity = sem.capacity + if sem.op == SemOp::AsyncLock { 1 } else { -1 };
        if e == unlock_handle {
            continue;
        }
        match sem.op {
            SemOp::AsyncLock => nb_lock += 1,
            SemOp::Unlock => nb_unlock += 1,
            SemOp::Wait => {}
        }
    }

    trace!(
        initial_capacity,
        nb_lock,
        nb_unlock,
        "semaphore wait fireability without the unlock"
    );
    initial_capacity - nb_lock + nb_unlock >= 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CondvarOp {
    AsyncLock,
    Broadcast,
    Signal,
    Wait,
    NoMc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondvarTransition {
    pub op: CondvarOp,
    pub condvar: u32,
    pub mutex: u32,
    pub granted: bool,
    pub timeout: bool,
}

impl CondvarTransition {
    pub fn type_(&self) -> TransitionType {
        match self.op {
            CondvarOp::AsyncLock => TransitionType::CondvarAsyncLock,
            CondvarOp::Broadcast => TransitionType::CondvarBroadcast,
            CondvarOp::Signal => TransitionType::CondvarSignal,
            CondvarOp::Wait => TransitionType::CondvarWait,
            CondvarOp::NoMc => TransitionType::CondvarNoMc,
        }
    }

    pub(crate) fn depends(&self, other: &Transition) -> bool {
        let TransitionKind::Condvar(o) = &other.kind else {
            return false;
        };
        let same = self.condvar == o.condvar;
        match (self.op, o.op) {
            // async locks register as waiters, which signals wake up
            (CondvarOp::AsyncLock, CondvarOp::Signal | CondvarOp::Broadcast) => same,
            // signals can enable a wait
            (CondvarOp::Broadcast | CondvarOp::Signal, CondvarOp::Wait) => same,
            // operations without a model are ordered with everything on the condvar
            (_, CondvarOp::NoMc) => same,
            _ => false,
        }
    }

    pub(crate) fn can_be_co_enabled(&self, other: &Transition) -> bool {
        match &other.kind {
            // both would need to hold the mutex
            TransitionKind::Condvar(o)
                if self.op == CondvarOp::AsyncLock && o.op == CondvarOp::AsyncLock =>
            {
                self.mutex != o.mutex
            }
            _ => true,
        }
    }

    pub(crate) fn reversible_race(
        &self,
        later: &CondvarTransition,
        exec: &Execution,
        this_handle: EventHandle,
        later_handle: EventHandle,
    ) -> bool {
        if self.op == CondvarOp::NoMc || later.op == CondvarOp::NoMc {
            return true;
        }
        match self.op {
            CondvarOp::AsyncLock => match later.op {
                CondvarOp::Broadcast | CondvarOp::Signal => true,
                _ => panic!(
                    "{} was declared dependent with {}",
                    self.type_(),
                    later.type_()
                ),
            },
            CondvarOp::Broadcast | CondvarOp::Signal => match later.op {
                // async locks are always enabled
                CondvarOp::AsyncLock => true,
                CondvarOp::Wait => {
                    is_cv_wait_fireable_without_transition(exec, later_handle, this_handle)
                }
                _ => panic!(
                    "{} was declared dependent with {}",
                    self.type_(),
                    later.type_()
                ),
            },
            // if the wait could run in the first place, signals do not impact it
            CondvarOp::Wait => {
                assert!(
                    matches!(later.op, CondvarOp::Broadcast | CondvarOp::Signal),
                    "{} was declared dependent with {}",
                    self.type_(),
                    later.type_()
                );
                true
            }
            CondvarOp::NoMc => true,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self.op {
            CondvarOp::AsyncLock => format!(
                "{}(cond: {}, mutex: {})",
                self.type_(),
                self.condvar,
                self.mutex
            ),
            CondvarOp::Wait => format!(
                "{}(cond: {}, mutex: {}, granted: {}, timeout: {})",
                self.type_(),
                self.condvar,
                self.mutex,
                if self.granted { "yes" } else { "no" },
                if self.timeout { "yes" } else { "none" }
            ),
            _ => format!("{}(cond: {})", self.type_(), self.condvar),
        }
    }
}

fn as_condvar(t: &Transition) -> Option<&CondvarTransition> {
    match &t.kind {
        TransitionKind::Condvar(c)
            if matches!(
                c.op,
                CondvarOp::AsyncLock | CondvarOp::Broadcast | CondvarOp::Signal
            ) =>
        {
            Some(c)
        }
        _ => None,
    }
}

/// Whether the condvar wait at `cv_wait_handle` would still be enabled without the
/// event at `removed_handle`.
fn is_cv_wait_fireable_without_transition(
    exec: &Execution,
    cv_wait_handle: EventHandle,
    removed_handle: EventHandle,
) -> bool {
    let TransitionKind::Condvar(wait) = &exec.transition_at(cv_wait_handle).kind else {
        panic!("event {} is not a condvar operation", cv_wait_handle);
    };
    let cv_id = wait.condvar;
    let waiter = exec.actor_at(cv_wait_handle);
    let mut signal_after_lock = 0;
    let mut lock_handle = None;

    for e in (0..cv_wait_handle).rev() {
        if e == removed_handle {
            continue;
        }
        let Some(cv) = as_condvar(exec.transition_at(e)) else {
            continue;
        };
        if cv.condvar != cv_id {
            continue;
        }
        if exec.actor_at(e) == waiter {
            assert_eq!(
                cv.op,
                CondvarOp::AsyncLock,
                "a condvar wait of actor {} is not preceded by its async lock",
                waiter
            );
            lock_handle = Some(e);
            break;
        }
        match cv.op {
            // later async locks of others do not matter
            CondvarOp::AsyncLock => {}
            CondvarOp::Broadcast => return true,
            CondvarOp::Signal => signal_after_lock += 1,
            _ => unreachable!("filtered by as_condvar"),
        }
    }

    if signal_after_lock == 0 {
        return false;
    }
    let Some(lock_handle) = lock_handle else {
        return false;
    };

    // Every actor already waiting when the lock was issued must be signaled first
    let mut currently_waiting: i32 = 0;
    for e in 0..lock_handle {
        if e == removed_handle {
            continue;
        }
        let Some(cv) = as_condvar(exec.transition_at(e)) else {
            continue;
        };
        if cv.condvar != cv_id {
            continue;
        }
        match cv.op {
            CondvarOp::AsyncLock => currently_waiting += 1,
            CondvarOp::Broadcast => currently_waiting = 0,
            // a signal with nobody waiting is lost
            CondvarOp::Signal => currently_waiting = (currently_waiting - 1).max(0),
            _ => unreachable!("filtered by as_condvar"),
        }
    }

    signal_after_lock > currently_waiting
}
