use super::channel::Channel;
use super::protocol::{encode_replay, Message};
use super::{ActorStatus, ReplayedStep};
use crate::error::{McError, ProtocolError};
use crate::transition::{Aid, Transition};
use std::sync::Arc;
use tracing::trace;

/// The checker's end of the connection to one app process.
#[derive(Debug)]
pub struct CheckerSide {
    channel: Channel,
    pid: i32,
    /// Process that must reap this one
    parent_pid: i32,
}

impl CheckerSide {
    pub fn new(channel: Channel, pid: i32, parent_pid: i32) -> Self {
        CheckerSide {
            channel,
            pid,
            parent_pid,
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn parent_pid(&self) -> i32 {
        self.parent_pid
    }

    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    /// Waits until the app reports that every actor is blocked again.
    pub fn expect_waiting(&mut self) -> Result<(), McError> {
        match self.channel.receive()? {
            Message::Waiting => Ok(()),
            Message::AssertionFailed { message } => Err(McError::AssertionFailed(message)),
            other => Err(other.unexpected("WAITING")),
        }
    }

    pub fn wait_for_requests(&mut self) -> Result<(), McError> {
        self.channel.send(&Message::Continue)?;
        self.expect_waiting()
    }

    pub fn handle_simcall(
        &mut self,
        aid: Aid,
        times_considered: u32,
        want_transition: bool,
    ) -> Result<Option<Transition>, McError> {
        self.channel.send(&Message::SimcallExecute {
            aid,
            times_considered,
            want_transition,
        })?;
        self.receive_simcall_reply(aid)
    }

    fn receive_simcall_reply(&mut self, expected: Aid) -> Result<Option<Transition>, McError> {
        match self.channel.receive()? {
            Message::SimcallExecuteReply { aid, transition } if aid == expected => Ok(transition),
            Message::SimcallExecuteReply { aid, .. } => Err(ProtocolError::WrongActor {
                expected: expected.0,
                received: aid.0,
            }
            .into()),
            Message::AssertionFailed { message } => Err(McError::AssertionFailed(message)),
            other => Err(other.unexpected("SIMCALL_EXECUTE_REPLY")),
        }
    }

    pub fn get_actors_status(&mut self, want_transitions: bool) -> Result<Vec<ActorStatus>, McError> {
        self.channel
            .send(&Message::ActorsStatus { want_transitions })?;
        self.receive_status(want_transitions)
    }

    fn receive_status(&mut self, want_transitions: bool) -> Result<Vec<ActorStatus>, McError> {
        let count = match self.channel.receive()? {
            Message::ActorsStatusReplyCount { count } => count,
            other => return Err(other.unexpected("ACTORS_STATUS_REPLY_COUNT")),
        };
        let mut actors = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.channel.receive()? {
                Message::ActorsStatusReplyTransition {
                    aid,
                    enabled,
                    max_considered,
                } => actors.push(ActorStatus {
                    aid,
                    enabled,
                    max_considered,
                    transitions: Vec::new(),
                }),
                other => return Err(other.unexpected("ACTORS_STATUS_REPLY_TRANSITION")),
            }
        }
        if want_transitions {
            for actor in &mut actors {
                for _ in 0..actor.max_considered {
                    match self.channel.receive()? {
                        Message::ActorTransition { transition } => {
                            actor.transitions.push(transition)
                        }
                        other => return Err(other.unexpected("ACTOR_TRANSITION")),
                    }
                }
            }
        }
        trace!(actors = actors.len(), "received actor statuses");
        Ok(actors)
    }

    pub fn check_deadlock(&mut self, verbose: bool) -> Result<bool, McError> {
        self.channel.send(&Message::DeadlockCheck { verbose })?;
        match self.channel.receive()? {
            Message::DeadlockCheckReply { deadlock } => Ok(deadlock),
            other => Err(other.unexpected("DEADLOCK_CHECK_REPLY")),
        }
    }

    pub fn replay(
        &mut self,
        silent: &[(Aid, u32)],
        with_status: &[(Aid, u32)],
    ) -> Result<Vec<ReplayedStep>, McError> {
        self.channel.send(&Message::Replay {
            steps: encode_replay(silent, with_status),
            want_transitions: true,
        })?;
        let mut steps = Vec::with_capacity(with_status.len());
        for &(aid, _) in with_status {
            steps.push(self.receive_step(aid, true)?);
        }
        self.expect_waiting()?;
        Ok(steps)
    }

    fn receive_step(&mut self, aid: Aid, want_transitions: bool) -> Result<ReplayedStep, McError> {
        let transition = self
            .receive_simcall_reply(aid)?
            .ok_or_else(|| McError::Internal(format!("no transition replied for actor {}", aid)))?;
        Ok(ReplayedStep {
            transition: Arc::new(transition),
            actors: self.receive_status(want_transitions)?,
        })
    }

    pub fn go_one_way(
        &mut self,
        random_seed: Option<u64>,
        want_transitions: bool,
    ) -> Result<Vec<ReplayedStep>, McError> {
        self.channel.send(&Message::GoOneWay {
            random: random_seed.is_some(),
            seed: random_seed.unwrap_or(0),
            want_transitions,
        })?;
        let mut steps = Vec::new();
        loop {
            match self.channel.receive()? {
                Message::Waiting => return Ok(steps),
                Message::AssertionFailed { message } => {
                    return Err(McError::AssertionFailed(message))
                }
                Message::SimcallExecuteReply { aid, transition } => {
                    let transition = transition.ok_or_else(|| {
                        McError::Internal(format!("no transition replied for actor {}", aid))
                    })?;
                    steps.push(ReplayedStep {
                        transition: Arc::new(transition),
                        actors: self.receive_status(want_transitions)?,
                    });
                }
                other => return Err(other.unexpected("SIMCALL_EXECUTE_REPLY or WAITING")),
            }
        }
    }

    /// Asks the app to fork a copy that connects to `socket_name`.
    pub fn fork(&mut self, socket_name: &str) -> Result<(), McError> {
        self.channel.send(&Message::Fork {
            socket_name: socket_name.to_string(),
        })
    }

    /// Reaps a child of this app. Returns its raw wait status.
    pub fn wait_child(&mut self, pid: i32) -> Result<i32, McError> {
        self.channel.send(&Message::WaitChild { pid })?;
        match self.channel.receive()? {
            Message::WaitChildReply { status } => Ok(status),
            other => Err(other.unexpected("WAIT_CHILD_REPLY")),
        }
    }

    pub fn get_maxpid(&mut self) -> Result<u32, McError> {
        self.channel.send(&Message::ActorsMaxpid)?;
        match self.channel.receive()? {
            Message::ActorsMaxpidReply { maxpid } => Ok(maxpid),
            other => Err(other.unexpected("ACTORS_MAXPID_REPLY")),
        }
    }

    pub fn finalize(&mut self, terminate_asap: bool) -> Result<(), McError> {
        self.channel.send(&Message::Finalize { terminate_asap })?;
        match self.channel.receive()? {
            Message::FinalizeReply => Ok(()),
            other => Err(other.unexpected("FINALIZE_REPLY")),
        }
    }
}
