//! Transitions and the dependency relation between them
//!
//! A transition is one atomic, typed action of an actor of the checked program, as
//! observed over the wire. Transition types are totally ordered:
//!
//! ```text
//! RANDOM < ACTOR_* < OBJECT_ACCESS < TESTANY/WAITANY < BARRIER_* < COMM_*
//!        < MUTEX_* < SEM_* < CONDVAR_* < UNKNOWN
//! ```
//!
//! `depends` always evaluates the pair with the smaller type first, so each family
//! only special-cases partners of a type greater or equal to its own.
//! `reversible_race` is asymmetric: it is called on the earlier event of an established
//! race with the later one as argument, and every pair that can race is handled
//! explicitly. An unhandled pair is a checker bug and panics.

pub mod actor;
pub mod any;
pub mod comm;
pub mod object_access;
pub mod synchro;

use crate::odpor::execution::{EventHandle, Execution};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use actor::ActorTransition;
pub use any::AnyTransition;
pub use comm::{CommOp, CommTransition};
pub use object_access::{ObjectAccessKind, ObjectAccessTransition};
pub use synchro::{
    BarrierOp, BarrierTransition, CondvarOp, CondvarTransition, MutexOp, MutexTransition, SemOp,
    SemaphoreTransition,
};

/// Actor identifier. Actor 0 is the maestro of the checked program and never appears
/// in actor lists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Aid(pub u32);

impl Aid {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transition types, declared in dependency-dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransitionType {
    Random,
    ActorJoin,
    ActorSleep,
    ActorCreate,
    ActorExit,
    ObjectAccess,
    TestAny,
    WaitAny,
    BarrierAsyncLock,
    BarrierWait,
    CommAsyncRecv,
    CommAsyncSend,
    CommIprobe,
    CommTest,
    CommWait,
    MutexAsyncLock,
    MutexTest,
    MutexTrylock,
    MutexUnlock,
    MutexWait,
    SemAsyncLock,
    SemUnlock,
    SemWait,
    CondvarAsyncLock,
    CondvarBroadcast,
    CondvarSignal,
    CondvarWait,
    CondvarNoMc,
    Unknown,
}

impl TransitionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionType::Random => "RANDOM",
            TransitionType::ActorJoin => "ACTOR_JOIN",
            TransitionType::ActorSleep => "ACTOR_SLEEP",
            TransitionType::ActorCreate => "ACTOR_CREATE",
            TransitionType::ActorExit => "ACTOR_EXIT",
            TransitionType::ObjectAccess => "OBJECT_ACCESS",
            TransitionType::TestAny => "TESTANY",
            TransitionType::WaitAny => "WAITANY",
            TransitionType::BarrierAsyncLock => "BARRIER_ASYNC_LOCK",
            TransitionType::BarrierWait => "BARRIER_WAIT",
            TransitionType::CommAsyncRecv => "COMM_ASYNC_RECV",
            TransitionType::CommAsyncSend => "COMM_ASYNC_SEND",
            TransitionType::CommIprobe => "COMM_IPROBE",
            TransitionType::CommTest => "COMM_TEST",
            TransitionType::CommWait => "COMM_WAIT",
            TransitionType::MutexAsyncLock => "MUTEX_ASYNC_LOCK",
            TransitionType::MutexTest => "MUTEX_TEST",
            TransitionType::MutexTrylock => "MUTEX_TRYLOCK",
            TransitionType::MutexUnlock => "MUTEX_UNLOCK",
            TransitionType::MutexWait => "MUTEX_WAIT",
            TransitionType::SemAsyncLock => "SEM_ASYNC_LOCK",
            TransitionType::SemUnlock => "SEM_UNLOCK",
            TransitionType::SemWait => "SEM_WAIT",
            TransitionType::CondvarAsyncLock => "CONDVAR_ASYNC_LOCK",
            TransitionType::CondvarBroadcast => "CONDVAR_BROADCAST",
            TransitionType::CondvarSignal => "CONDVAR_SIGNAL",
            TransitionType::CondvarWait => "CONDVAR_WAIT",
            TransitionType::CondvarNoMc => "CONDVAR_NOMC",
            TransitionType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a memory access recorded by the checked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemOpKind {
    Read,
    Write,
}

impl fmt::Display for MemOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemOpKind::Read => f.write_str("read"),
            MemOpKind::Write => f.write_str("write"),
        }
    }
}

/// One memory access performed by an actor between its previous transition and this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemOp {
    pub location: u64,
    pub kind: MemOpKind,
}

impl MemOp {
    pub fn read(location: u64) -> Self {
        MemOp {
            location,
            kind: MemOpKind::Read,
        }
    }

    pub fn write(location: u64) -> Self {
        MemOp {
            location,
            kind: MemOpKind::Write,
        }
    }
}

/// Payload of a transition, one variant per family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    Random { min: i32, max: i32 },
    Actor(ActorTransition),
    ObjectAccess(ObjectAccessTransition),
    Any(AnyTransition),
    Barrier(BarrierTransition),
    Comm(CommTransition),
    Mutex(MutexTransition),
    Semaphore(SemaphoreTransition),
    Condvar(CondvarTransition),
    /// Simcall the checker has no model for; dependent with everything
    Unknown,
}

/// An observed action of one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub aid: Aid,
    /// Which nondeterministic branch of the actor's pending simcall this is
    pub times_considered: u32,
    pub kind: TransitionKind,
    /// Memory accesses done by the actor since its previous transition
    pub mem_ops: Vec<MemOp>,
    /// Call site in the checked program, if known
    pub call_location: String,
}

impl Transition {
    pub fn new(aid: Aid, times_considered: u32, kind: TransitionKind) -> Self {
        Transition {
            aid,
            times_considered,
            kind,
            mem_ops: Vec::new(),
            call_location: String::new(),
        }
    }

    pub fn with_mem_ops(mut self, mem_ops: Vec<MemOp>) -> Self {
        self.mem_ops = mem_ops;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.call_location = location.into();
        self
    }

    pub fn type_(&self) -> TransitionType {
        match &self.kind {
            TransitionKind::Random { .. } => TransitionType::Random,
            TransitionKind::Actor(a) => a.type_(),
            TransitionKind::ObjectAccess(_) => TransitionType::ObjectAccess,
            TransitionKind::Any(a) => a.type_(),
            TransitionKind::Barrier(b) => b.type_(),
            TransitionKind::Comm(c) => c.type_(),
            TransitionKind::Mutex(m) => m.type_(),
            TransitionKind::Semaphore(s) => s.type_(),
            TransitionKind::Condvar(c) => c.type_(),
            TransitionKind::Unknown => TransitionType::Unknown,
        }
    }

    /// Whether executing `self` and `other` in either order may lead to different states.
    pub fn depends(&self, other: &Transition) -> bool {
        if other.type_() < self.type_() {
            return other.depends(self);
        }

        // Actions executed by the same actor are always dependent
        if self.aid == other.aid {
            return true;
        }

        // Joining an actor depends on everything that actor does
        if self.joins(other.aid) || other.joins(self.aid) {
            return true;
        }

        // The created actor cannot do anything before its creation
        if self.creates(other.aid) || other.creates(self.aid) {
            return true;
        }

        match &self.kind {
            TransitionKind::Random { .. } => false,
            TransitionKind::Actor(_) => false,
            TransitionKind::ObjectAccess(o) => o.depends(other),
            TransitionKind::Any(a) => a.depends(self.aid, other),
            TransitionKind::Barrier(b) => b.depends(other),
            TransitionKind::Comm(c) => c.depends(self.aid, other),
            TransitionKind::Mutex(m) => m.depends(other),
            TransitionKind::Semaphore(s) => s.depends(other),
            TransitionKind::Condvar(c) => c.depends(other),
            TransitionKind::Unknown => true,
        }
    }

    /// Whether `self` and `other` can be enabled at the same time.
    pub fn can_be_co_enabled(&self, other: &Transition) -> bool {
        if other.type_() < self.type_() {
            return other.can_be_co_enabled(self);
        }

        // Transitions of the same actor are never co-enabled
        if self.aid == other.aid {
            return false;
        }

        match &self.kind {
            TransitionKind::Mutex(m) => m.can_be_co_enabled(other),
            TransitionKind::Condvar(c) => c.can_be_co_enabled(other),
            _ => true,
        }
    }

    /// Given that `self` (at `this_handle`) races with the later `later` (at `later_handle`)
    /// in `exec`, whether the two can be swapped into a distinct, executable order.
    pub fn reversible_race(
        &self,
        later: &Transition,
        exec: &Execution,
        this_handle: EventHandle,
        later_handle: EventHandle,
    ) -> bool {
        if let TransitionKind::Actor(ActorTransition::Join { target, timeout }) = &later.kind {
            if *target == self.aid {
                // The join is enabled only once the target is gone, unless it can time out
                return *timeout;
            }
        }
        if let TransitionKind::Actor(ActorTransition::Join { target, timeout }) = &self.kind {
            if *target == later.aid {
                return *timeout;
            }
        }
        if self.creates(later.aid) || later.creates(self.aid) {
            return false;
        }

        match (&self.kind, &later.kind) {
            (TransitionKind::Random { .. }, _) | (_, TransitionKind::Random { .. }) => panic!(
                "random draws of distinct actors are independent and cannot race: {} / {}",
                self, later
            ),
            (TransitionKind::Actor(a), _) => a.reversible_race(self.aid, later),
            (_, TransitionKind::Actor(a)) => a.reversible_race_as_later(later.aid, self),
            (TransitionKind::ObjectAccess(_), TransitionKind::ObjectAccess(_)) => true,
            (TransitionKind::Any(a), _) => a.reversible_race(later),
            (_, TransitionKind::Any(a)) => a.reversible_race_as_later(self),
            (TransitionKind::Barrier(a), TransitionKind::Barrier(b)) => a.reversible_race(b),
            (TransitionKind::Comm(a), TransitionKind::Comm(b)) => a.reversible_race(b),
            (TransitionKind::Mutex(_), TransitionKind::Mutex(b)) => {
                MutexTransition::reversible_race(b)
            }
            (TransitionKind::Mutex(_), TransitionKind::Condvar(b)) => {
                // A mutex wait only races with the async lock of a condvar using that mutex;
                // that async lock is always enabled
                assert_eq!(b.op, CondvarOp::AsyncLock, "unexpected race {} / {}", self, later);
                true
            }
            (TransitionKind::Condvar(a), TransitionKind::Mutex(b)) => {
                // The condvar async lock released the mutex and enabled the wait
                assert_eq!(a.op, CondvarOp::AsyncLock, "unexpected race {} / {}", self, later);
                assert_eq!(b.op, MutexOp::Wait, "unexpected race {} / {}", self, later);
                false
            }
            (TransitionKind::Semaphore(a), TransitionKind::Semaphore(b)) => {
                a.reversible_race(b, exec, this_handle, later_handle)
            }
            (TransitionKind::Condvar(a), TransitionKind::Condvar(b)) => {
                a.reversible_race(b, exec, this_handle, later_handle)
            }
            (TransitionKind::Unknown, _) | (_, TransitionKind::Unknown) => true,
            _ => panic!(
                "reversible_race is not implemented between {} and {}",
                self.type_(),
                later.type_()
            ),
        }
    }

    /// Whether this transition is a join on `target`.
    pub fn joins(&self, target: Aid) -> bool {
        matches!(&self.kind, TransitionKind::Actor(ActorTransition::Join { target: t, .. }) if *t == target)
    }

    pub fn creates(&self, child: Aid) -> bool {
        matches!(&self.kind, TransitionKind::Actor(ActorTransition::Create { child: c }) if *c == child)
    }

    pub fn to_string_verbose(&self, verbose: bool) -> String {
        let body = match &self.kind {
            TransitionKind::Random { min, max } => format!(
                "Random([{};{}] ~> {})",
                min,
                max,
                i64::from(*min) + i64::from(self.times_considered)
            ),
            TransitionKind::Actor(a) => a.describe(),
            TransitionKind::ObjectAccess(o) => o.describe(),
            TransitionKind::Any(a) => a.describe(verbose),
            TransitionKind::Barrier(b) => b.describe(),
            TransitionKind::Comm(c) => c.describe(verbose),
            TransitionKind::Mutex(m) => m.describe(),
            TransitionKind::Semaphore(s) => s.describe(),
            TransitionKind::Condvar(c) => c.describe(),
            TransitionKind::Unknown => "UNKNOWN".to_string(),
        };
        if verbose && !self.mem_ops.is_empty() {
            let ops: Vec<String> = self
                .mem_ops
                .iter()
                .map(|op| format!("{}@{:#x}", op.kind, op.location))
                .collect();
            format!("{} [{}]", body, ops.join(", "))
        } else {
            body
        }
    }

    /// Attributes of the dot edge labelled with this transition.
    pub fn dot_string(&self) -> String {
        const COLORS: [&str; 13] = [
            "blue", "red", "green3", "goldenrod", "brown", "purple", "magenta", "turquoise4",
            "gray25", "forestgreen", "hotpink", "lightblue", "tan",
        ];
        let color = COLORS[self.aid.index().saturating_sub(1) % COLORS.len()];
        format!(
            "label = \"[({})] {}\", color = {}, fontcolor = {}",
            self.aid,
            self.type_(),
            color,
            color
        )
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_verbose(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutex(aid: u32, op: MutexOp, m: u32) -> Transition {
        Transition::new(
            Aid(aid),
            0,
            TransitionKind::Mutex(MutexTransition {
                op,
                mutex: m,
                owner: None,
            }),
        )
    }

    fn sleep(aid: u32) -> Transition {
        Transition::new(Aid(aid), 0, TransitionKind::Actor(ActorTransition::Sleep))
    }

    #[test]
    fn test_type_order_follows_families() {
        assert!(TransitionType::Random < TransitionType::ActorJoin);
        assert!(TransitionType::ActorExit < TransitionType::ObjectAccess);
        assert!(TransitionType::WaitAny < TransitionType::BarrierAsyncLock);
        assert!(TransitionType::CommWait < TransitionType::MutexAsyncLock);
        assert!(TransitionType::SemWait < TransitionType::CondvarAsyncLock);
        assert!(TransitionType::CondvarNoMc < TransitionType::Unknown);
    }

    #[test]
    fn test_same_actor_is_dependent() {
        assert!(sleep(1).depends(&sleep(1)));
        assert!(!sleep(1).depends(&sleep(2)));
    }

    #[test]
    fn test_join_depends_on_target() {
        let join = Transition::new(
            Aid(1),
            0,
            TransitionKind::Actor(ActorTransition::Join {
                target: Aid(2),
                timeout: false,
            }),
        );
        let random = Transition::new(Aid(2), 0, TransitionKind::Random { min: 0, max: 1 });
        assert!(join.depends(&random));
        assert!(random.depends(&join));
        assert!(!join.depends(&sleep(3)));
    }

    fn on(aid: u32, kind: TransitionKind) -> Transition {
        Transition::new(Aid(aid), 0, kind)
    }

    fn comm(op: CommOp, mbox: u32, id: Option<u64>) -> CommTransition {
        CommTransition {
            op,
            mbox,
            comm: id,
            sender: None,
            receiver: None,
            timeout: false,
        }
    }

    fn every_family() -> Vec<Transition> {
        let mut all = vec![
            on(1, TransitionKind::Random { min: 0, max: 3 }),
            on(2, TransitionKind::Random { min: 0, max: 1 }),
            on(
                1,
                TransitionKind::Actor(ActorTransition::Join {
                    target: Aid(2),
                    timeout: false,
                }),
            ),
            on(
                3,
                TransitionKind::Actor(ActorTransition::Join {
                    target: Aid(4),
                    timeout: true,
                }),
            ),
            on(1, TransitionKind::Actor(ActorTransition::Create { child: Aid(5) })),
            on(2, TransitionKind::Actor(ActorTransition::Create { child: Aid(3) })),
            on(5, TransitionKind::Actor(ActorTransition::Exit)),
            sleep(4),
            sleep(5),
            Transition::new(Aid(4), 0, TransitionKind::Unknown),
        ];
        for (aid, object) in [(1, 0x10), (2, 0x10), (3, 0x20)] {
            all.push(on(
                aid,
                TransitionKind::ObjectAccess(ObjectAccessTransition {
                    object,
                    access: ObjectAccessKind::Both,
                    name: "shared".to_string(),
                }),
            ));
        }
        for (aid, op, mbox, id) in [
            (1, CommOp::AsyncSend, 1, None),
            (2, CommOp::AsyncSend, 1, None),
            (3, CommOp::AsyncRecv, 1, None),
            (4, CommOp::AsyncRecv, 2, None),
            (5, CommOp::Iprobe, 1, None),
            (1, CommOp::Test, 1, Some(7)),
            (2, CommOp::Wait, 1, Some(7)),
            (3, CommOp::Wait, 2, Some(8)),
        ] {
            all.push(on(aid, TransitionKind::Comm(comm(op, mbox, id))));
        }
        let mut timed_wait = comm(CommOp::Wait, 1, Some(7));
        timed_wait.timeout = true;
        all.push(on(4, TransitionKind::Comm(timed_wait)));
        for (aid, wait) in [(4, false), (5, true)] {
            all.push(on(
                aid,
                TransitionKind::Any(AnyTransition {
                    wait,
                    timeout: false,
                    comms: vec![comm(CommOp::Wait, 1, Some(7)), comm(CommOp::Test, 2, None)],
                }),
            ));
        }
        for (aid, op, barrier) in [
            (1, BarrierOp::AsyncLock, 1),
            (2, BarrierOp::AsyncLock, 1),
            (3, BarrierOp::Wait, 1),
            (4, BarrierOp::Wait, 2),
        ] {
            all.push(on(aid, TransitionKind::Barrier(BarrierTransition { op, barrier })));
        }
        for (aid, op, m) in [
            (1, MutexOp::AsyncLock, 1),
            (2, MutexOp::AsyncLock, 1),
            (2, MutexOp::Unlock, 1),
            (3, MutexOp::Wait, 1),
            (3, MutexOp::Test, 2),
            (1, MutexOp::Trylock, 1),
        ] {
            all.push(mutex(aid, op, m));
        }
        for (aid, op, sem) in [
            (1, SemOp::AsyncLock, 1),
            (2, SemOp::AsyncLock, 1),
            (3, SemOp::Unlock, 1),
            (4, SemOp::Wait, 1),
            (5, SemOp::Wait, 2),
        ] {
            all.push(on(
                aid,
                TransitionKind::Semaphore(SemaphoreTransition {
                    op,
                    sem,
                    granted: false,
                    capacity: 1,
                }),
            ));
        }
        for (aid, op, condvar) in [
            (1, CondvarOp::AsyncLock, 1),
            (2, CondvarOp::Signal, 1),
            (3, CondvarOp::Broadcast, 1),
            (4, CondvarOp::Wait, 1),
            (5, CondvarOp::NoMc, 1),
            (4, CondvarOp::Signal, 2),
        ] {
            all.push(on(
                aid,
                TransitionKind::Condvar(CondvarTransition {
                    op,
                    condvar,
                    mutex: 1,
                    granted: false,
                    timeout: false,
                }),
            ));
        }
        all
    }

    #[test]
    fn test_dependency_is_order_independent() {
        let all = every_family();
        for a in &all {
            for b in &all {
                assert_eq!(a.depends(b), b.depends(a), "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn test_creation_orders_the_child() {
        let create = on(1, TransitionKind::Actor(ActorTransition::Create { child: Aid(5) }));
        let draw = on(5, TransitionKind::Random { min: 0, max: 1 });
        let exit = on(5, TransitionKind::Actor(ActorTransition::Exit));
        assert!(create.depends(&draw));
        assert!(draw.depends(&create));
        assert!(create.depends(&sleep(5)));
        assert!(exit.depends(&create));
        assert!(!create.depends(&sleep(4)));
        let exec = Execution::default();
        assert!(!create.reversible_race(&draw, &exec, 0, 1));
    }

    #[test]
    fn test_comm_dependency_rules() {
        let send = |aid, mbox| on(aid, TransitionKind::Comm(comm(CommOp::AsyncSend, mbox, None)));
        let recv = on(3, TransitionKind::Comm(comm(CommOp::AsyncRecv, 1, None)));
        let probe = on(5, TransitionKind::Comm(comm(CommOp::Iprobe, 1, None)));
        let test = on(1, TransitionKind::Comm(comm(CommOp::Test, 1, Some(7))));
        let wait = on(2, TransitionKind::Comm(comm(CommOp::Wait, 1, Some(7))));
        let mut timed = comm(CommOp::Wait, 1, Some(7));
        timed.timeout = true;
        let timed = on(4, TransitionKind::Comm(timed));

        assert!(send(1, 1).depends(&send(2, 1)));
        assert!(!send(1, 1).depends(&send(2, 2)));
        assert!(!send(1, 1).depends(&recv));
        assert!(probe.depends(&recv));
        assert!(!test.depends(&wait));
        assert!(test.depends(&timed));

        let wait_any = on(
            5,
            TransitionKind::Any(AnyTransition {
                wait: true,
                timeout: false,
                comms: vec![comm(CommOp::Wait, 1, Some(7))],
            }),
        );
        assert!(wait_any.depends(&timed));
        assert!(timed.depends(&wait_any));
        assert!(!wait_any.depends(&wait));
    }

    #[test]
    fn test_barrier_and_object_rules() {
        let barrier = |aid, op| on(aid, TransitionKind::Barrier(BarrierTransition { op, barrier: 1 }));
        assert!(barrier(3, BarrierOp::Wait).depends(&barrier(1, BarrierOp::AsyncLock)));
        assert!(!barrier(1, BarrierOp::AsyncLock).depends(&barrier(2, BarrierOp::AsyncLock)));
        let access = |aid, object| {
            on(
                aid,
                TransitionKind::ObjectAccess(ObjectAccessTransition {
                    object,
                    access: ObjectAccessKind::Enter,
                    name: "queue".to_string(),
                }),
            )
        };
        assert!(access(1, 0x10).depends(&access(2, 0x10)));
        assert!(!access(1, 0x10).depends(&access(2, 0x20)));
    }

    #[test]
    fn test_mutex_lock_rules() {
        let lock1 = mutex(1, MutexOp::AsyncLock, 1);
        let lock2 = mutex(2, MutexOp::AsyncLock, 1);
        let other = mutex(2, MutexOp::AsyncLock, 7);
        assert!(lock1.depends(&lock2));
        assert!(!lock1.depends(&other));
        assert!(!lock1.depends(&mutex(2, MutexOp::Unlock, 1)));
        assert!(!lock1.depends(&mutex(2, MutexOp::Wait, 1)));
        assert!(mutex(1, MutexOp::Unlock, 1).depends(&mutex(2, MutexOp::Wait, 1)));
        assert!(!mutex(1, MutexOp::Unlock, 1).depends(&mutex(2, MutexOp::Unlock, 1)));
    }

    #[test]
    fn test_reversibility_is_asymmetric() {
        let exec = Execution::default();
        let unlock = mutex(1, MutexOp::Unlock, 1);
        let wait = mutex(2, MutexOp::Wait, 1);
        assert!(!unlock.reversible_race(&wait, &exec, 0, 1));
        let lock1 = mutex(1, MutexOp::AsyncLock, 1);
        let lock2 = mutex(2, MutexOp::AsyncLock, 1);
        assert!(lock1.reversible_race(&lock2, &exec, 0, 1));
    }

    #[test]
    #[should_panic(expected = "cannot race")]
    fn test_random_race_is_fatal() {
        let exec = Execution::default();
        let a = Transition::new(Aid(1), 0, TransitionKind::Random { min: 0, max: 3 });
        let b = Transition::new(Aid(2), 0, TransitionKind::Random { min: 0, max: 3 });
        a.reversible_race(&b, &exec, 0, 1);
    }

    #[test]
    fn test_dot_string_mentions_type() {
        let t = mutex(2, MutexOp::AsyncLock, 1);
        assert!(t.dot_string().contains("MUTEX_ASYNC_LOCK"));
        assert!(t.dot_string().contains("[(2)]"));
    }
}
