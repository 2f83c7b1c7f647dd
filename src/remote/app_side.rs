use super::channel::Channel;
use super::protocol::{decode_replay, Message, SOCKET_FD_ENV};
use crate::app::CheckedProgram;
use crate::error::{ConfigError, McError};
use crate::rng::DeterministicRng;
use crate::transition::Aid;
use std::os::fd::FromRawFd;
use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixStream};
use tracing::{debug, error, info, warn};

enum Flow {
    Serve,
    Exit,
}

/// Serves a [`CheckedProgram`] to the checker over the control socket.
///
/// The app only moves when told to. Between two commands, every actor is blocked on
/// its next simcall.
pub struct AppSide {
    channel: Channel,
    program: Box<dyn CheckedProgram>,
    /// Assertion failure raised by a simcall, reported at the next CONTINUE
    pending_failure: Option<String>,
}

impl AppSide {
    pub fn new(channel: Channel, program: Box<dyn CheckedProgram>) -> Self {
        AppSide {
            channel,
            program,
            pending_failure: None,
        }
    }

    /// Connects to the checker through the socket it passed in the environment.
    pub fn from_env(program: Box<dyn CheckedProgram>) -> Result<Self, McError> {
        let raw = std::env::var(SOCKET_FD_ENV)
            .map_err(|_| ConfigError::File(format!("{} is not set", SOCKET_FD_ENV)))?;
        let fd: i32 = raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: SOCKET_FD_ENV.to_string(),
            value: raw.clone(),
        })?;
        // SAFETY: the checker hands us this descriptor for our exclusive use
        let stream = unsafe { UnixStream::from_raw_fd(fd) };
        Ok(Self::new(Channel::new(stream), program))
    }

    /// Serves commands until the checker finalizes the app.
    pub fn run(&mut self) -> Result<(), McError> {
        self.report_waiting()?;
        loop {
            let msg = self.channel.receive()?;
            debug!(message = msg.name(), "app received command");
            if let Flow::Exit = self.handle(msg)? {
                return Ok(());
            }
        }
    }

    fn handle(&mut self, msg: Message) -> Result<Flow, McError> {
        match msg {
            Message::Continue => self.report_waiting()?,
            Message::SimcallExecute {
                aid,
                times_considered,
                want_transition,
            } => {
                let transition = match self.program.execute(aid, times_considered) {
                    Ok(t) => want_transition.then_some(t),
                    Err(McError::AssertionFailed(message)) => {
                        self.pending_failure = Some(message);
                        None
                    }
                    Err(e) => return Err(e),
                };
                self.channel
                    .send(&Message::SimcallExecuteReply { aid, transition })?;
            }
            Message::ActorsStatus { want_transitions } => {
                self.pack_status(want_transitions)?;
                self.channel.flush()?;
            }
            Message::ActorsMaxpid => self.channel.send(&Message::ActorsMaxpidReply {
                maxpid: self.program.max_pid(),
            })?,
            Message::DeadlockCheck { verbose } => {
                let deadlock = self.program.is_deadlocked();
                if deadlock && verbose {
                    for line in self.program.describe_actors() {
                        info!("{}", line);
                    }
                }
                self.channel
                    .send(&Message::DeadlockCheckReply { deadlock })?;
            }
            Message::Replay {
                steps,
                want_transitions,
            } => self.replay(&steps, want_transitions)?,
            Message::GoOneWay {
                random,
                seed,
                want_transitions,
            } => self.go_one_way(random.then_some(seed), want_transitions)?,
            Message::Fork { socket_name } => self.fork(&socket_name)?,
            Message::WaitChild { pid } => {
                let mut status = 0;
                // SAFETY: plain waitpid on a child of this process
                let ret = unsafe { libc::waitpid(pid, &mut status, 0) };
                if ret < 0 {
                    return Err(std::io::Error::last_os_error().into());
                }
                self.channel.send(&Message::WaitChildReply { status })?;
            }
            Message::Finalize { terminate_asap } => {
                if !terminate_asap {
                    self.program.finalize();
                }
                self.channel.send(&Message::FinalizeReply)?;
                return Ok(Flow::Exit);
            }
            other => return Err(other.unexpected("a checker command")),
        }
        Ok(Flow::Serve)
    }

    /// Runs the local steps, then tells the checker whether they went fine.
    fn report_waiting(&mut self) -> Result<(), McError> {
        let outcome = match self.pending_failure.take() {
            Some(message) => Err(McError::AssertionFailed(message)),
            None => self.program.run_local_steps(),
        };
        match outcome {
            Ok(()) => self.channel.send(&Message::Waiting),
            Err(McError::AssertionFailed(message)) => {
                error!(%message, "assertion failed in the checked program");
                self.channel.send(&Message::AssertionFailed { message })
            }
            Err(e) => Err(e),
        }
    }

    fn pack_status(&mut self, want_transitions: bool) -> Result<(), McError> {
        let actors = self.program.actors_status(want_transitions);
        self.channel.pack(&Message::ActorsStatusReplyCount {
            count: actors.len() as u32,
        })?;
        for actor in &actors {
            self.channel.pack(&Message::ActorsStatusReplyTransition {
                aid: actor.aid,
                enabled: actor.enabled,
                max_considered: actor.max_considered,
            })?;
        }
        if want_transitions {
            for actor in actors {
                if actor.transitions.len() != actor.max_considered as usize {
                    return Err(McError::Internal(format!(
                        "actor {} announces {} branches but describes {}",
                        actor.aid,
                        actor.max_considered,
                        actor.transitions.len()
                    )));
                }
                for transition in actor.transitions {
                    self.channel.pack(&Message::ActorTransition { transition })?;
                }
            }
        }
        Ok(())
    }

    /// Executes one step and reports it, with the statuses that follow it.
    /// Returns false when an assertion failed instead.
    fn reported_step(&mut self, aid: Aid, times: u32, want: bool) -> Result<bool, McError> {
        let transition = self.program.execute(aid, times);
        let transition = match transition.and_then(|t| {
            self.program.run_local_steps()?;
            Ok(t)
        }) {
            Ok(t) => t,
            Err(McError::AssertionFailed(message)) => {
                self.channel.send(&Message::AssertionFailed { message })?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        self.channel.pack(&Message::SimcallExecuteReply {
            aid,
            transition: Some(transition),
        })?;
        self.pack_status(want)?;
        self.channel.flush()?;
        Ok(true)
    }

    fn replay(&mut self, steps: &[(u32, u32)], want_transitions: bool) -> Result<(), McError> {
        let (silent, with_status) = decode_replay(steps)?;
        for (aid, times) in silent {
            let result = self
                .program
                .execute(aid, times)
                .and_then(|_| self.program.run_local_steps());
            match result {
                Ok(()) => {}
                Err(McError::AssertionFailed(message)) => {
                    return self.channel.send(&Message::AssertionFailed { message })
                }
                Err(e) => return Err(e),
            }
        }
        for (aid, times) in with_status {
            if !self.reported_step(aid, times, want_transitions)? {
                return Ok(());
            }
        }
        self.channel.send(&Message::Waiting)
    }

    fn go_one_way(&mut self, seed: Option<u64>, want_transitions: bool) -> Result<(), McError> {
        let mut rng = seed.map(DeterministicRng::new);
        loop {
            let enabled: Vec<Aid> = self
                .program
                .actors()
                .into_iter()
                .filter(|a| a.enabled)
                .map(|a| a.aid)
                .collect();
            let pick = match rng.as_mut() {
                Some(rng) => rng.choose(&enabled).copied(),
                None => enabled.first().copied(),
            };
            let Some(aid) = pick else {
                break;
            };
            if !self.reported_step(aid, 0, want_transitions)? {
                return Ok(());
            }
        }
        self.channel.send(&Message::Waiting)
    }

    /// Forks a copy of this app that connects back to the checker on `socket_name`.
    /// The parent stays in its command loop and does not answer.
    fn fork(&mut self, socket_name: &str) -> Result<(), McError> {
        // SAFETY: the app is single-threaded while serving commands
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            let err = std::io::Error::last_os_error();
            warn!(%err, "fork failed");
            return Err(err.into());
        }
        if pid == 0 {
            let addr = SocketAddr::from_abstract_name(socket_name.as_bytes())?;
            let stream = UnixStream::connect_addr(&addr)?;
            self.channel = Channel::new(stream);
            // SAFETY: getpid cannot fail
            let pid = unsafe { libc::getpid() };
            self.channel.send(&Message::ForkReply { pid })?;
        }
        Ok(())
    }
}
