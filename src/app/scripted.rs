//! A small deterministic actor program described in TOML.
//!
//! Each actor runs a list of operations. Simcall-like operations (communications,
//! synchronizations, random draws) block the actor until the checker schedules them;
//! some take two steps, a post and a wait. Memory operations and assertions run as
//! local steps between simcalls, and the memory accesses are reported with the
//! actor's next transition.
//!
//! ```toml
//! name = "producer-consumer"
//!
//! [[actors]]
//! name = "producer"
//! ops = [{ op = "send", mailbox = 1 }]
//!
//! [[actors]]
//! name = "consumer"
//! ops = [{ op = "recv", mailbox = 1 }]
//! ```

use super::CheckedProgram;
use crate::error::{ConfigError, McError};
use crate::remote::ActorStatus;
use crate::transition::{
    ActorTransition, Aid, BarrierOp, BarrierTransition, CommOp, CommTransition, CondvarOp,
    CondvarTransition, MemOp, MutexOp, MutexTransition, ObjectAccessKind, ObjectAccessTransition,
    SemOp, SemaphoreTransition, Transition, TransitionKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Post a send on the mailbox, then wait for a receiver
    Send { mailbox: u32 },
    /// Post a receive on the mailbox, then wait for a sender
    Recv { mailbox: u32 },
    /// Request the mutex, then wait until owning it
    Lock { mutex: u32 },
    Unlock { mutex: u32 },
    /// Decrement the semaphore, then wait until granted
    SemAcquire { sem: u32 },
    SemRelease { sem: u32 },
    /// Arrive at the barrier, then wait for everyone
    Barrier { barrier: u32 },
    /// Release the mutex and wait on the condition, then get the mutex back once signaled
    CondWait { cond: u32, mutex: u32 },
    Signal { cond: u32 },
    Broadcast { cond: u32 },
    /// Draw a value in `[min, max]` into the register
    Random { min: i32, max: i32 },
    Sleep,
    /// Wait for the termination of another actor, by id
    Join { actor: u32 },
    /// Use an object that must not be used concurrently
    Access { object: u64 },
    /// Local: load a shared location into the register
    Load { location: u64 },
    /// Local: store the register into a shared location
    Store { location: u64 },
    /// Local: write a constant into a shared location
    Write { location: u64, value: i64 },
    /// Local: increment the register
    Incr,
    /// Local: fail unless the location holds the value
    AssertEq { location: u64, value: i64 },
    /// Local: fail if the location holds the value
    AssertNe { location: u64, value: i64 },
}

impl Op {
    fn is_local(&self) -> bool {
        matches!(
            self,
            Op::Load { .. }
                | Op::Store { .. }
                | Op::Write { .. }
                | Op::Incr
                | Op::AssertEq { .. }
                | Op::AssertNe { .. }
        )
    }

    fn is_two_phase(&self) -> bool {
        matches!(
            self,
            Op::Send { .. }
                | Op::Recv { .. }
                | Op::Lock { .. }
                | Op::SemAcquire { .. }
                | Op::Barrier { .. }
                | Op::CondWait { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorScript {
    #[serde(default)]
    pub name: String,
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreDecl {
    pub id: u32,
    pub initial: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierDecl {
    pub id: u32,
    pub count: u32,
}

/// A whole program: its actors and the initial value of its synchronizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub semaphores: Vec<SemaphoreDecl>,
    #[serde(default)]
    pub barriers: Vec<BarrierDecl>,
    pub actors: Vec<ActorScript>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let scenario: Scenario =
            toml::from_str(content).map_err(|e| ConfigError::File(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let barriers: BTreeSet<u32> = self.barriers.iter().map(|b| b.id).collect();
        for script in &self.actors {
            for op in &script.ops {
                match op {
                    Op::Join { actor } if *actor == 0 || *actor as usize > self.actors.len() => {
                        return Err(ConfigError::InvalidValue {
                            key: "join".to_string(),
                            value: actor.to_string(),
                        })
                    }
                    Op::Barrier { barrier } if !barriers.contains(barrier) => {
                        return Err(ConfigError::InvalidValue {
                            key: "barrier".to_string(),
                            value: barrier.to_string(),
                        })
                    }
                    Op::Random { min, max } if min > max => {
                        return Err(ConfigError::InvalidValue {
                            key: "random".to_string(),
                            value: format!("{}..{}", min, max),
                        })
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ScriptedActor {
    name: String,
    pc: usize,
    /// 1 once the post of a two-phase op is done
    phase: u8,
    register: i64,
    comm: Option<u64>,
    pending_mem: Vec<MemOp>,
    /// Terminated, but still has memory accesses to report
    exiting: bool,
}

#[derive(Debug, Clone)]
struct Comm {
    mbox: u32,
    sender: Option<Aid>,
    receiver: Option<Aid>,
}

#[derive(Debug, Clone, Default)]
struct Mailbox {
    sends: VecDeque<u64>,
    recvs: VecDeque<u64>,
}

#[derive(Debug, Clone, Default)]
struct Semaphore {
    value: i32,
    granted: BTreeSet<Aid>,
    queue: VecDeque<Aid>,
}

#[derive(Debug, Clone, Default)]
struct Condition {
    waiters: VecDeque<(Aid, u32)>,
    signaled: BTreeSet<Aid>,
}

#[derive(Debug, Clone)]
pub struct ScriptedProgram {
    scenario: Arc<Scenario>,
    actors: BTreeMap<Aid, ScriptedActor>,
    memory: BTreeMap<u64, i64>,
    mailboxes: BTreeMap<u32, Mailbox>,
    comms: BTreeMap<u64, Comm>,
    next_comm: u64,
    /// Requesters in order; the front owns the mutex
    mutexes: BTreeMap<u32, VecDeque<Aid>>,
    semaphores: BTreeMap<u32, Semaphore>,
    barriers: BTreeMap<u32, u32>,
    conditions: BTreeMap<u32, Condition>,
}

impl ScriptedProgram {
    pub fn new(scenario: Arc<Scenario>) -> Self {
        let actors = scenario
            .actors
            .iter()
            .enumerate()
            .map(|(i, script)| {
                let name = if script.name.is_empty() {
                    format!("actor-{}", i + 1)
                } else {
                    script.name.clone()
                };
                (
                    Aid(i as u32 + 1),
                    ScriptedActor {
                        name,
                        pc: 0,
                        phase: 0,
                        register: 0,
                        comm: None,
                        pending_mem: Vec::new(),
                        exiting: false,
                    },
                )
            })
            .collect();
        let semaphores = scenario
            .semaphores
            .iter()
            .map(|s| {
                (
                    s.id,
                    Semaphore {
                        value: s.initial,
                        ..Default::default()
                    },
                )
            })
            .collect();
        ScriptedProgram {
            actors,
            memory: BTreeMap::new(),
            mailboxes: BTreeMap::new(),
            comms: BTreeMap::new(),
            next_comm: 1,
            mutexes: BTreeMap::new(),
            semaphores,
            barriers: BTreeMap::new(),
            conditions: BTreeMap::new(),
            scenario,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Value of a shared location.
    pub fn read_memory(&self, location: u64) -> i64 {
        self.memory.get(&location).copied().unwrap_or(0)
    }

    fn op_of(&self, aid: Aid) -> Option<&Op> {
        let actor = self.actors.get(&aid)?;
        self.scenario.actors[aid.index() - 1].ops.get(actor.pc)
    }

    fn mutex_owner(&self, mutex: u32) -> Option<Aid> {
        self.mutexes.get(&mutex).and_then(|q| q.front().copied())
    }

    fn semaphore_value(&self, sem: u32) -> i32 {
        self.semaphores.get(&sem).map_or(0, |s| s.value)
    }

    fn barrier_count(&self, barrier: u32) -> u32 {
        self.scenario
            .barriers
            .iter()
            .find(|b| b.id == barrier)
            .map_or(0, |b| b.count)
    }

    fn comm_transition(&self, aid: Aid, op: CommOp, mbox: u32, comm: Option<u64>) -> TransitionKind {
        let posted = comm.and_then(|c| self.comms.get(&c));
        let (sender, receiver) = match (posted, op) {
            (Some(c), _) => (c.sender, c.receiver),
            (None, CommOp::AsyncSend) => (Some(aid), None),
            (None, _) => (None, Some(aid)),
        };
        TransitionKind::Comm(CommTransition {
            op,
            mbox,
            comm,
            sender,
            receiver,
            timeout: false,
        })
    }

    fn is_enabled(&self, aid: Aid) -> bool {
        let Some(actor) = self.actors.get(&aid) else {
            return false;
        };
        if actor.exiting {
            return true;
        }
        let Some(op) = self.op_of(aid) else {
            return false;
        };
        match (op, actor.phase) {
            (Op::Send { .. } | Op::Recv { .. }, 1) => actor
                .comm
                .and_then(|c| self.comms.get(&c))
                .is_some_and(|c| c.sender.is_some() && c.receiver.is_some()),
            (Op::Lock { mutex }, 1) => self.mutex_owner(*mutex) == Some(aid),
            (Op::SemAcquire { sem }, 1) => self
                .semaphores
                .get(sem)
                .is_some_and(|s| s.granted.contains(&aid)),
            (Op::Barrier { barrier }, 1) => {
                self.barriers.get(barrier).copied().unwrap_or(0) >= self.barrier_count(*barrier)
            }
            (Op::CondWait { cond, mutex }, 1) => {
                self.conditions
                    .get(cond)
                    .is_some_and(|c| c.signaled.contains(&aid))
                    && self.mutex_owner(*mutex) == Some(aid)
            }
            (Op::Join { actor }, _) => !self.actors.contains_key(&Aid(*actor)),
            _ => true,
        }
    }

    fn max_considered_of(&self, aid: Aid) -> u32 {
        match self.op_of(aid) {
            Some(Op::Random { min, max }) if !self.actors[&aid].exiting => (max - min + 1) as u32,
            _ => 1,
        }
    }

    fn kind_of(&self, aid: Aid) -> Option<TransitionKind> {
        let actor = self.actors.get(&aid)?;
        if actor.exiting {
            return Some(TransitionKind::Actor(ActorTransition::Exit));
        }
        let op = self.op_of(aid)?;
        let kind = match (op, actor.phase) {
            (Op::Send { mailbox }, 0) => self.comm_transition(aid, CommOp::AsyncSend, *mailbox, None),
            (Op::Recv { mailbox }, 0) => self.comm_transition(aid, CommOp::AsyncRecv, *mailbox, None),
            (Op::Send { mailbox } | Op::Recv { mailbox }, _) => {
                self.comm_transition(aid, CommOp::Wait, *mailbox, actor.comm)
            }
            (Op::Lock { mutex }, phase) => TransitionKind::Mutex(MutexTransition {
                op: if phase == 0 { MutexOp::AsyncLock } else { MutexOp::Wait },
                mutex: *mutex,
                owner: self.mutex_owner(*mutex),
            }),
            (Op::Unlock { mutex }, _) => TransitionKind::Mutex(MutexTransition {
                op: MutexOp::Unlock,
                mutex: *mutex,
                owner: self.mutex_owner(*mutex),
            }),
            (Op::SemAcquire { sem }, 0) => {
                let value = self.semaphore_value(*sem);
                TransitionKind::Semaphore(SemaphoreTransition {
                    op: SemOp::AsyncLock,
                    sem: *sem,
                    granted: value > 0,
                    capacity: value - 1,
                })
            }
            (Op::SemAcquire { sem }, _) => TransitionKind::Semaphore(SemaphoreTransition {
                op: SemOp::Wait,
                sem: *sem,
                granted: self
                    .semaphores
                    .get(sem)
                    .is_some_and(|s| s.granted.contains(&aid)),
                capacity: self.semaphore_value(*sem),
            }),
            (Op::SemRelease { sem }, _) => TransitionKind::Semaphore(SemaphoreTransition {
                op: SemOp::Unlock,
                sem: *sem,
                granted: false,
                capacity: self.semaphore_value(*sem) + 1,
            }),
            (Op::Barrier { barrier }, phase) => TransitionKind::Barrier(BarrierTransition {
                op: if phase == 0 { BarrierOp::AsyncLock } else { BarrierOp::Wait },
                barrier: *barrier,
            }),
            (Op::CondWait { cond, mutex }, phase) => TransitionKind::Condvar(CondvarTransition {
                op: if phase == 0 { CondvarOp::AsyncLock } else { CondvarOp::Wait },
                condvar: *cond,
                mutex: *mutex,
                granted: phase == 1
                    && self
                        .conditions
                        .get(cond)
                        .is_some_and(|c| c.signaled.contains(&aid)),
                timeout: false,
            }),
            (Op::Signal { cond } | Op::Broadcast { cond }, _) => {
                TransitionKind::Condvar(CondvarTransition {
                    op: if matches!(op, Op::Signal { .. }) {
                        CondvarOp::Signal
                    } else {
                        CondvarOp::Broadcast
                    },
                    condvar: *cond,
                    mutex: 0,
                    granted: false,
                    timeout: false,
                })
            }
            (Op::Random { min, max }, _) => TransitionKind::Random {
                min: *min,
                max: *max,
            },
            (Op::Sleep, _) => TransitionKind::Actor(ActorTransition::Sleep),
            (Op::Join { actor }, _) => TransitionKind::Actor(ActorTransition::Join {
                target: Aid(*actor),
                timeout: false,
            }),
            (Op::Access { object }, _) => TransitionKind::ObjectAccess(ObjectAccessTransition {
                object: *object,
                access: ObjectAccessKind::Both,
                name: format!("object-{}", object),
            }),
            (local, _) => {
                debug!(%aid, ?local, "actor is not blocked on a simcall");
                return None;
            }
        };
        Some(kind)
    }

    fn advance(&mut self, aid: Aid) {
        let two_phase = self.op_of(aid).is_some_and(Op::is_two_phase);
        if let Some(actor) = self.actors.get_mut(&aid) {
            if two_phase && actor.phase == 0 {
                actor.phase = 1;
            } else {
                actor.phase = 0;
                actor.pc += 1;
            }
        }
    }

    fn post_comm(&mut self, aid: Aid, mbox: u32, sending: bool) -> u64 {
        let mailbox = self.mailboxes.entry(mbox).or_default();
        let partner = if sending {
            mailbox.recvs.pop_front()
        } else {
            mailbox.sends.pop_front()
        };
        if let Some(comm) = partner {
            if let Some(c) = self.comms.get_mut(&comm) {
                if sending {
                    c.sender = Some(aid);
                } else {
                    c.receiver = Some(aid);
                }
            }
            return comm;
        }
        let comm = self.next_comm;
        self.next_comm += 1;
        if sending {
            mailbox.sends.push_back(comm);
        } else {
            mailbox.recvs.push_back(comm);
        }
        self.comms.insert(
            comm,
            Comm {
                mbox,
                sender: sending.then_some(aid),
                receiver: (!sending).then_some(aid),
            },
        );
        comm
    }

    fn release_mutex(&mut self, aid: Aid, mutex: u32) -> Result<(), McError> {
        let queue = self.mutexes.entry(mutex).or_default();
        if queue.front() != Some(&aid) {
            return Err(McError::AssertionFailed(format!(
                "actor {} releases mutex {} it does not own",
                aid, mutex
            )));
        }
        queue.pop_front();
        Ok(())
    }

    fn wake_waiter(&mut self, cond: u32, waiter: (Aid, u32)) {
        let (aid, mutex) = waiter;
        self.conditions
            .entry(cond)
            .or_default()
            .signaled
            .insert(aid);
        self.mutexes.entry(mutex).or_default().push_back(aid);
    }

    /// Applies the effect of the pending op of `aid`, branch `times`.
    fn apply(&mut self, aid: Aid, times: u32) -> Result<(), McError> {
        if self.actors.get(&aid).is_some_and(|a| a.exiting) {
            self.actors.remove(&aid);
            return Ok(());
        }
        let Some(op) = self.op_of(aid).cloned() else {
            return Err(McError::Internal(format!("actor {} has no pending simcall", aid)));
        };
        let phase = self.actors[&aid].phase;
        match (op, phase) {
            (Op::Send { mailbox }, 0) | (Op::Recv { mailbox }, 0) => {
                let sending = matches!(self.op_of(aid), Some(Op::Send { .. }));
                let comm = self.post_comm(aid, mailbox, sending);
                if let Some(actor) = self.actors.get_mut(&aid) {
                    actor.comm = Some(comm);
                }
            }
            (Op::Send { .. } | Op::Recv { .. }, _) => {
                if let Some(actor) = self.actors.get_mut(&aid) {
                    actor.comm = None;
                }
            }
            (Op::Lock { mutex }, 0) => self.mutexes.entry(mutex).or_default().push_back(aid),
            (Op::Unlock { mutex }, _) => self.release_mutex(aid, mutex)?,
            (Op::SemAcquire { sem }, 0) => {
                let s = self.semaphores.entry(sem).or_default();
                s.value -= 1;
                if s.value >= 0 {
                    s.granted.insert(aid);
                } else {
                    s.queue.push_back(aid);
                }
            }
            (Op::SemAcquire { sem }, _) => {
                if let Some(s) = self.semaphores.get_mut(&sem) {
                    s.granted.remove(&aid);
                }
            }
            (Op::SemRelease { sem }, _) => {
                let s = self.semaphores.entry(sem).or_default();
                s.value += 1;
                if let Some(next) = s.queue.pop_front() {
                    s.granted.insert(next);
                }
            }
            (Op::Barrier { barrier }, 0) => *self.barriers.entry(barrier).or_default() += 1,
            (Op::CondWait { cond, mutex }, 0) => {
                self.release_mutex(aid, mutex)?;
                self.conditions
                    .entry(cond)
                    .or_default()
                    .waiters
                    .push_back((aid, mutex));
            }
            (Op::CondWait { cond, .. }, _) => {
                if let Some(c) = self.conditions.get_mut(&cond) {
                    c.signaled.remove(&aid);
                }
            }
            (Op::Signal { cond }, _) => {
                let waiter = self
                    .conditions
                    .get_mut(&cond)
                    .and_then(|c| c.waiters.pop_front());
                if let Some(waiter) = waiter {
                    self.wake_waiter(cond, waiter);
                }
            }
            (Op::Broadcast { cond }, _) => {
                let waiters: Vec<(Aid, u32)> = self
                    .conditions
                    .get_mut(&cond)
                    .map(|c| c.waiters.drain(..).collect())
                    .unwrap_or_default();
                for waiter in waiters {
                    self.wake_waiter(cond, waiter);
                }
            }
            (Op::Random { min, .. }, _) => {
                if let Some(actor) = self.actors.get_mut(&aid) {
                    actor.register = i64::from(min) + i64::from(times);
                }
            }
            _ => {}
        }
        self.advance(aid);
        Ok(())
    }

    /// Runs the local ops of one actor. Returns false once the actor is gone.
    fn run_actor_locally(&mut self, aid: Aid) -> Result<(), McError> {
        loop {
            let Some(actor) = self.actors.get(&aid) else {
                return Ok(());
            };
            if actor.exiting {
                return Ok(());
            }
            let Some(op) = self.op_of(aid).cloned() else {
                if actor.pending_mem.is_empty() {
                    debug!(%aid, "actor terminated");
                    self.actors.remove(&aid);
                } else if let Some(actor) = self.actors.get_mut(&aid) {
                    actor.exiting = true;
                }
                return Ok(());
            };
            if !op.is_local() {
                return Ok(());
            }
            let register = actor.register;
            let mut access = None;
            match op {
                Op::Load { location } => {
                    let value = self.read_memory(location);
                    if let Some(actor) = self.actors.get_mut(&aid) {
                        actor.register = value;
                    }
                    access = Some(MemOp::read(location));
                }
                Op::Store { location } => {
                    self.memory.insert(location, register);
                    access = Some(MemOp::write(location));
                }
                Op::Write { location, value } => {
                    self.memory.insert(location, value);
                    access = Some(MemOp::write(location));
                }
                Op::Incr => {
                    if let Some(actor) = self.actors.get_mut(&aid) {
                        actor.register += 1;
                    }
                }
                Op::AssertEq { location, value } => {
                    let actual = self.read_memory(location);
                    if actual != value {
                        return Err(McError::AssertionFailed(format!(
                            "actor {}: location {} holds {} instead of {}",
                            aid, location, actual, value
                        )));
                    }
                }
                Op::AssertNe { location, value } => {
                    if self.read_memory(location) == value {
                        return Err(McError::AssertionFailed(format!(
                            "actor {}: location {} must not hold {}",
                            aid, location, value
                        )));
                    }
                }
                _ => unreachable!("only local ops run between simcalls"),
            }
            if let Some(actor) = self.actors.get_mut(&aid) {
                actor.pending_mem.extend(access);
                actor.pc += 1;
            }
        }
    }
}

impl CheckedProgram for ScriptedProgram {
    fn actors(&self) -> Vec<ActorStatus> {
        self.actors
            .keys()
            .map(|&aid| ActorStatus {
                aid,
                enabled: self.is_enabled(aid),
                max_considered: self.max_considered_of(aid),
                transitions: Vec::new(),
            })
            .collect()
    }

    fn pending_transition(&self, aid: Aid, times: u32) -> Option<Transition> {
        let kind = self.kind_of(aid)?;
        let actor = &self.actors[&aid];
        Some(
            Transition::new(aid, times, kind)
                .with_mem_ops(actor.pending_mem.clone())
                .with_location(format!("{}:{}", actor.name, actor.pc + 1)),
        )
    }

    fn execute(&mut self, aid: Aid, times: u32) -> Result<Transition, McError> {
        if !self.is_enabled(aid) {
            return Err(McError::Internal(format!(
                "actor {} was scheduled while disabled",
                aid
            )));
        }
        if times >= self.max_considered_of(aid) {
            return Err(McError::Internal(format!(
                "actor {} has no branch {}",
                aid, times
            )));
        }
        let mut executed = self
            .pending_transition(aid, times)
            .ok_or_else(|| McError::Internal(format!("actor {} has no pending simcall", aid)))?;
        let was_send = matches!(
            &executed.kind,
            TransitionKind::Comm(CommTransition {
                op: CommOp::AsyncSend | CommOp::AsyncRecv,
                ..
            })
        );
        self.apply(aid, times)?;
        if let Some(actor) = self.actors.get_mut(&aid) {
            actor.pending_mem.clear();
        }
        // The comm only gets an id once posted
        if was_send {
            if let TransitionKind::Comm(comm) = &mut executed.kind {
                let posted = self.actors.get(&aid).and_then(|a| a.comm);
                if let Some(c) = posted.and_then(|id| self.comms.get(&id).map(|c| (id, c))) {
                    comm.comm = Some(c.0);
                    comm.sender = c.1.sender;
                    comm.receiver = c.1.receiver;
                    debug_assert_eq!(c.1.mbox, comm.mbox);
                }
            }
        }
        Ok(executed)
    }

    fn run_local_steps(&mut self) -> Result<(), McError> {
        let aids: Vec<Aid> = self.actors.keys().copied().collect();
        for aid in aids {
            self.run_actor_locally(aid)?;
        }
        Ok(())
    }

    fn max_pid(&self) -> u32 {
        self.scenario.actors.len() as u32
    }

    fn describe_actors(&self) -> Vec<String> {
        self.actors
            .iter()
            .map(|(&aid, actor)| {
                let pending = self
                    .pending_transition(aid, 0)
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "nothing".to_string());
                format!(
                    "Actor {} ({}) is {}, pending: {}",
                    aid,
                    actor.name,
                    if self.is_enabled(aid) { "enabled" } else { "blocked" },
                    pending
                )
            })
            .collect()
    }

    fn box_clone(&self) -> Box<dyn CheckedProgram> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::TransitionType;

    fn program(toml: &str) -> ScriptedProgram {
        let mut p = ScriptedProgram::new(Arc::new(Scenario::from_toml_str(toml).unwrap()));
        p.run_local_steps().unwrap();
        p
    }

    #[test]
    fn test_send_recv_pairs_comms() {
        let mut p = program(
            r#"
            [[actors]]
            ops = [{ op = "send", mailbox = 1 }]
            [[actors]]
            ops = [{ op = "recv", mailbox = 1 }]
            "#,
        );
        let send = p.execute(Aid(1), 0).unwrap();
        assert_eq!(send.type_(), TransitionType::CommAsyncSend);
        assert!(!p.is_enabled(Aid(1)), "the wait needs a receiver");
        let recv = p.execute(Aid(2), 0).unwrap();
        let TransitionKind::Comm(c) = &recv.kind else {
            panic!("not a comm");
        };
        assert_eq!(c.sender, Some(Aid(1)));
        assert!(p.is_enabled(Aid(1)));
        p.execute(Aid(1), 0).unwrap();
        p.execute(Aid(2), 0).unwrap();
        p.run_local_steps().unwrap();
        assert!(p.actors().is_empty());
    }

    #[test]
    fn test_unmatched_receive_deadlocks() {
        let mut p = program(
            r#"
            [[actors]]
            ops = [{ op = "recv", mailbox = 3 }]
            "#,
        );
        assert!(!p.is_deadlocked());
        p.execute(Aid(1), 0).unwrap();
        p.run_local_steps().unwrap();
        assert!(p.is_deadlocked());
        assert_eq!(
            p.pending_transition(Aid(1), 0).unwrap().type_(),
            TransitionType::CommWait
        );
    }

    #[test]
    fn test_memory_accesses_ride_on_the_exit() {
        let p = program(
            r#"
            [[actors]]
            ops = [{ op = "write", location = 7, value = 1 }]
            "#,
        );
        let exit = p.pending_transition(Aid(1), 0).unwrap();
        assert_eq!(exit.type_(), TransitionType::ActorExit);
        assert_eq!(exit.mem_ops, vec![MemOp::write(7)]);
    }

    #[test]
    fn test_random_branch_feeds_the_assertion() {
        let toml = r#"
            [[actors]]
            ops = [
              { op = "random", min = 0, max = 1 },
              { op = "store", location = 1 },
              { op = "assert_ne", location = 1, value = 1 },
            ]
        "#;
        let mut p = program(toml);
        assert_eq!(p.actors()[0].max_considered, 2);
        p.execute(Aid(1), 0).unwrap();
        assert!(p.run_local_steps().is_ok());

        let mut p = program(toml);
        p.execute(Aid(1), 1).unwrap();
        assert!(matches!(p.run_local_steps(), Err(McError::AssertionFailed(_))));
    }

    #[test]
    fn test_mutex_ownership() {
        let mut p = program(
            r#"
            [[actors]]
            ops = [{ op = "lock", mutex = 1 }, { op = "unlock", mutex = 1 }]
            [[actors]]
            ops = [{ op = "lock", mutex = 1 }, { op = "unlock", mutex = 1 }]
            "#,
        );
        p.execute(Aid(2), 0).unwrap();
        p.execute(Aid(1), 0).unwrap();
        assert!(!p.is_enabled(Aid(1)));
        p.execute(Aid(2), 0).unwrap();
        p.execute(Aid(2), 0).unwrap();
        assert!(p.is_enabled(Aid(1)));
    }

    #[test]
    fn test_invalid_join_target() {
        let err = Scenario::from_toml_str(
            r#"
            [[actors]]
            ops = [{ op = "join", actor = 4 }]
            "#,
        );
        assert!(matches!(err, Err(ConfigError::InvalidValue { .. })));
    }
}
