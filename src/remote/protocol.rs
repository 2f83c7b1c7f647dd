//! Messages exchanged between the checker and the checked program.
//!
//! Every message is a variant of [`Message`], serialized with bincode and framed as
//! `[u32 LE payload length][payload]` on the stream socket.

use crate::error::{McError, ProtocolError};
use crate::transition::{Aid, Transition};
use serde::{Deserialize, Serialize};

/// Environment variable giving the checked program the fd of its control socket
pub const SOCKET_FD_ENV: &str = "SIMGRID_MC_SOCKET_FD";

/// Length prefix size
pub const FRAME_HEADER_LEN: usize = 4;

/// Frames larger than this are rejected
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Separates the two lists of a REPLAY payload
pub const REPLAY_SENTINEL: (u32, u32) = (u32::MAX, u32::MAX);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    // Checker to app
    /// Run the local steps, then report WAITING
    Continue,
    DeadlockCheck {
        verbose: bool,
    },
    SimcallExecute {
        aid: Aid,
        times_considered: u32,
        want_transition: bool,
    },
    ActorsStatus {
        want_transitions: bool,
    },
    ActorsMaxpid,
    /// Two `(aid, times_considered)` lists separated by [`REPLAY_SENTINEL`]
    Replay {
        steps: Vec<(u32, u32)>,
        want_transitions: bool,
    },
    GoOneWay {
        random: bool,
        seed: u64,
        want_transitions: bool,
    },
    Fork {
        socket_name: String,
    },
    WaitChild {
        pid: i32,
    },
    Finalize {
        terminate_asap: bool,
    },

    // App to checker
    /// Every actor is blocked on a simcall
    Waiting,
    AssertionFailed {
        message: String,
    },
    SimcallExecuteReply {
        aid: Aid,
        transition: Option<Transition>,
    },
    ActorsStatusReplyCount {
        count: u32,
    },
    ActorsStatusReplyTransition {
        aid: Aid,
        enabled: bool,
        max_considered: u32,
    },
    ActorTransition {
        transition: Transition,
    },
    ActorsMaxpidReply {
        maxpid: u32,
    },
    DeadlockCheckReply {
        deadlock: bool,
    },
    ForkReply {
        pid: i32,
    },
    WaitChildReply {
        status: i32,
    },
    FinalizeReply,
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::Continue => "CONTINUE",
            Message::DeadlockCheck { .. } => "DEADLOCK_CHECK",
            Message::SimcallExecute { .. } => "SIMCALL_EXECUTE",
            Message::ActorsStatus { .. } => "ACTORS_STATUS",
            Message::ActorsMaxpid => "ACTORS_MAXPID",
            Message::Replay { .. } => "REPLAY",
            Message::GoOneWay { .. } => "GO_ONE_WAY",
            Message::Fork { .. } => "FORK",
            Message::WaitChild { .. } => "WAIT_CHILD",
            Message::Finalize { .. } => "FINALIZE",
            Message::Waiting => "WAITING",
            Message::AssertionFailed { .. } => "ASSERTION_FAILED",
            Message::SimcallExecuteReply { .. } => "SIMCALL_EXECUTE_REPLY",
            Message::ActorsStatusReplyCount { .. } => "ACTORS_STATUS_REPLY_COUNT",
            Message::ActorsStatusReplyTransition { .. } => "ACTORS_STATUS_REPLY_TRANSITION",
            Message::ActorTransition { .. } => "ACTOR_TRANSITION",
            Message::ActorsMaxpidReply { .. } => "ACTORS_MAXPID_REPLY",
            Message::DeadlockCheckReply { .. } => "DEADLOCK_CHECK_REPLY",
            Message::ForkReply { .. } => "FORK_REPLY",
            Message::WaitChildReply { .. } => "WAIT_CHILD_REPLY",
            Message::FinalizeReply => "FINALIZE_REPLY",
        }
    }

    /// Error for receiving `self` where `expected` was due.
    pub fn unexpected(&self, expected: &'static str) -> McError {
        McError::Protocol(ProtocolError::UnexpectedMessage {
            expected,
            received: self.name().to_string(),
        })
    }
}

/// Serializes `msg` into one frame.
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>, McError> {
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::Oversized(payload.len()).into());
    }
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Reads the payload length of a frame header.
pub fn decode_header(header: [u8; FRAME_HEADER_LEN]) -> Result<usize, McError> {
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::Oversized(len).into());
    }
    Ok(len)
}

/// Decodes the first frame of `data`. Returns `None` while the frame is incomplete,
/// or the message and the number of bytes it used.
pub fn decode_frame(data: &[u8]) -> Result<Option<(Message, usize)>, McError> {
    if data.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }
    let len = decode_header([data[0], data[1], data[2], data[3]])?;
    let total = FRAME_HEADER_LEN + len;
    if data.len() < total {
        return Ok(None);
    }
    let msg = bincode::deserialize(&data[FRAME_HEADER_LEN..total])?;
    Ok(Some((msg, total)))
}

/// Packs the two REPLAY lists into one payload.
pub fn encode_replay(silent: &[(Aid, u32)], with_status: &[(Aid, u32)]) -> Vec<(u32, u32)> {
    let mut steps = Vec::with_capacity(silent.len() + with_status.len() + 1);
    steps.extend(silent.iter().map(|&(aid, times)| (aid.0, times)));
    steps.push(REPLAY_SENTINEL);
    steps.extend(with_status.iter().map(|&(aid, times)| (aid.0, times)));
    steps
}

/// Splits a REPLAY payload back into its two lists.
pub fn decode_replay(steps: &[(u32, u32)]) -> Result<(Vec<(Aid, u32)>, Vec<(Aid, u32)>), McError> {
    let split = steps
        .iter()
        .position(|&s| s == REPLAY_SENTINEL)
        .ok_or_else(|| ProtocolError::ReplayEncoding("missing list separator".to_string()))?;
    let to_pairs = |part: &[(u32, u32)]| -> Result<Vec<(Aid, u32)>, McError> {
        part.iter()
            .map(|&(aid, times)| {
                if aid == u32::MAX || times == u32::MAX {
                    Err(ProtocolError::ReplayEncoding(format!(
                        "unexpected separator-like step ({}, {})",
                        aid, times
                    ))
                    .into())
                } else {
                    Ok((Aid(aid), times))
                }
            })
            .collect()
    };
    Ok((to_pairs(&steps[..split])?, to_pairs(&steps[split + 1..])?))
}
