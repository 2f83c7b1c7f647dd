use super::channel::Channel;
use super::checker_side::CheckerSide;
use super::protocol::{Message, SOCKET_FD_ENV};
use super::{ActorStatus, CheckpointId, RemoteApp, ReplayedStep};
use crate::config::CheckerConfig;
use crate::error::{CrashStatus, McError, ProtocolError};
use crate::transition::{Aid, Transition};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::os::fd::AsRawFd;
use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixListener, UnixStream};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a forked app gets to connect back
const FORK_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives the checked program as separate processes.
///
/// The first process is kept paused in the initial state. Each restoration forks a
/// fresh copy of it (or of a checkpoint), so that nothing needs to be undone in the
/// app. With `no_fork`, the program is started again from scratch instead.
pub struct ProcessApp {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    use_ptrace: bool,
    no_fork: bool,
    root: Option<CheckerSide>,
    current: Option<CheckerSide>,
    checkpoints: BTreeMap<CheckpointId, CheckerSide>,
    next_checkpoint: CheckpointId,
    next_socket: u64,
}

impl ProcessApp {
    /// Starts the program and brings a first copy of it to its initial state.
    pub fn spawn(program: PathBuf, args: Vec<String>, config: &CheckerConfig) -> Result<Self, McError> {
        // Forks of forks are reparented to us when their parent dies
        // SAFETY: prctl with integer arguments only
        unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, 1, 0, 0, 0) };
        let mut app = ProcessApp {
            program,
            args,
            env: config.setenv.clone(),
            use_ptrace: config.use_ptrace,
            no_fork: config.no_fork,
            root: None,
            current: None,
            checkpoints: BTreeMap::new(),
            next_checkpoint: 1,
            next_socket: 0,
        };
        if app.no_fork {
            app.current = Some(app.start_process()?);
        } else {
            app.root = Some(app.start_process()?);
            app.restore_checker_side(None)?;
        }
        Ok(app)
    }

    fn start_process(&self) -> Result<CheckerSide, McError> {
        let (checker, app) = UnixStream::pair()?;
        let fd = app.as_raw_fd();
        let use_ptrace = self.use_ptrace;
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .env(SOCKET_FD_ENV, fd.to_string());
        // SAFETY: only async-signal-safe calls between fork and exec
        unsafe {
            command.pre_exec(move || {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                let null = std::ptr::null_mut::<libc::c_void>();
                if use_ptrace && libc::ptrace(libc::PTRACE_TRACEME, 0, null, null) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        let child = command.spawn()?;
        drop(app);
        let pid = child.id() as i32;
        info!(pid, program = %self.program.display(), "checked program started");
        if use_ptrace {
            // Stopped at exec; ask to be told of the exit, then let it run
            let status = waitpid_retrying(pid)?;
            if !libc::WIFSTOPPED(status) {
                return Err(crash_status(status).map_or_else(
                    || McError::Internal(format!("traced app {} exited before its exec", pid)),
                    McError::ProgramCrash,
                ));
            }
            // SAFETY: ptrace on our own traced child, stopped at its exec
            check_os(unsafe {
                libc::ptrace(
                    libc::PTRACE_SETOPTIONS,
                    pid,
                    std::ptr::null_mut::<libc::c_void>(),
                    libc::PTRACE_O_TRACEEXIT as libc::c_long,
                )
            })?;
            // SAFETY: same stopped tracee
            check_os(unsafe {
                libc::ptrace(
                    libc::PTRACE_CONT,
                    pid,
                    std::ptr::null_mut::<libc::c_void>(),
                    0 as libc::c_long,
                )
            })?;
        }
        // SAFETY: getpid cannot fail
        let me = unsafe { libc::getpid() };
        let mut side = CheckerSide::new(Channel::new(checker), pid, me);
        side.expect_waiting()?;
        Ok(side)
    }

    /// Forks the app of `from` (the root when `None`) into a new connected side.
    fn fork_from(&mut self, from: Option<CheckpointId>) -> Result<CheckerSide, McError> {
        // SAFETY: getpid cannot fail
        let me = unsafe { libc::getpid() };
        let socket_name = format!("stateless-mc-{}-{}", me, self.next_socket);
        self.next_socket += 1;
        let addr = SocketAddr::from_abstract_name(socket_name.as_bytes())?;
        let listener = UnixListener::bind_addr(&addr)?;
        listener.set_nonblocking(true)?;

        let parent = match from {
            Some(id) => self
                .checkpoints
                .get_mut(&id)
                .ok_or_else(|| McError::Internal(format!("unknown checkpoint {}", id)))?,
            None => self
                .root
                .as_mut()
                .ok_or_else(|| McError::Internal("no root app to fork from".to_string()))?,
        };
        let parent_pid = parent.pid();
        parent.fork(&socket_name)?;

        let deadline = Instant::now() + FORK_CONNECT_TIMEOUT;
        let stream = loop {
            match listener.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(McError::Timeout(format!(
                            "forked app did not connect to {}",
                            socket_name
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) => return Err(e.into()),
            }
        };
        stream.set_nonblocking(false)?;
        let mut channel = Channel::new(stream);
        let pid = match channel.receive()? {
            Message::ForkReply { pid } => pid,
            other => return Err(other.unexpected("FORK_REPLY")),
        };
        debug!(pid, parent_pid, "forked app connected");
        Ok(CheckerSide::new(channel, pid, parent_pid))
    }

    /// Kills the app of `side` and collects its wait status.
    fn terminate(&mut self, side: CheckerSide) -> Result<i32, McError> {
        // SAFETY: signalling a process we started
        unsafe { libc::kill(side.pid(), libc::SIGKILL) };
        self.reap(&side)
    }

    fn reap(&mut self, side: &CheckerSide) -> Result<i32, McError> {
        // SAFETY: getpid cannot fail
        let me = unsafe { libc::getpid() };
        let pid = side.pid();
        if side.parent_pid() != me {
            let parent = self
                .root
                .iter_mut()
                .chain(self.checkpoints.values_mut())
                .chain(self.current.iter_mut())
                .find(|s| s.pid() == side.parent_pid());
            if let Some(parent) = parent {
                return parent.wait_child(pid);
            }
        }
        reap_direct(pid)
    }

    fn current(&mut self) -> Result<&mut CheckerSide, McError> {
        self.current
            .as_mut()
            .ok_or_else(|| McError::Internal("no app is currently running".to_string()))
    }

    /// Turns a closed channel into the crash that caused it.
    fn diagnose<T>(&mut self, result: Result<T, McError>) -> Result<T, McError> {
        match result {
            Err(McError::Protocol(ProtocolError::Closed | ProtocolError::Truncated { .. })) => {
                let Some(side) = self.current.take() else {
                    return Err(ProtocolError::Closed.into());
                };
                let status = self.reap(&side)?;
                match crash_status(status) {
                    Some(crash) => {
                        warn!(pid = side.pid(), %crash, "checked program died");
                        Err(McError::ProgramCrash(crash))
                    }
                    None => Err(ProtocolError::Closed.into()),
                }
            }
            other => other,
        }
    }
}

/// Waits for one of our own children, going through a ptrace exit stop if any.
fn reap_direct(pid: i32) -> Result<i32, McError> {
    loop {
        let status = waitpid_retrying(pid)?;
        if libc::WIFSTOPPED(status) {
            let exit_event = libc::SIGTRAP | (libc::PTRACE_EVENT_EXIT << 8);
            if status >> 8 == exit_event {
                let mut msg: libc::c_ulong = 0;
                // SAFETY: the tracee is stopped at its exit event
                check_os(unsafe {
                    libc::ptrace(
                        libc::PTRACE_GETEVENTMSG,
                        pid,
                        std::ptr::null_mut::<libc::c_void>(),
                        &mut msg as *mut libc::c_ulong,
                    )
                })?;
                debug!(pid, status = msg, "traced app exiting");
            }
            // SAFETY: resuming our stopped tracee
            check_os(unsafe {
                libc::ptrace(
                    libc::PTRACE_CONT,
                    pid,
                    std::ptr::null_mut::<libc::c_void>(),
                    0 as libc::c_long,
                )
            })?;
            continue;
        }
        return Ok(status);
    }
}

/// Waits for a state change of the child `pid`, retrying when interrupted.
fn waitpid_retrying(pid: i32) -> Result<i32, McError> {
    let mut status = 0;
    loop {
        // SAFETY: waitpid only writes the status
        if unsafe { libc::waitpid(pid, &mut status, 0) } >= 0 {
            return Ok(status);
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != ErrorKind::Interrupted {
            return Err(err.into());
        }
    }
}

/// Maps the negative return of a libc call to the error left in errno.
fn check_os(ret: libc::c_long) -> Result<libc::c_long, McError> {
    if ret < 0 {
        Err(std::io::Error::last_os_error().into())
    } else {
        Ok(ret)
    }
}

/// What a wait status says about an unexpected termination.
pub fn crash_status(status: i32) -> Option<CrashStatus> {
    if libc::WIFSIGNALED(status) {
        Some(CrashStatus::Signaled {
            signal: libc::WTERMSIG(status),
            core_dumped: libc::WCOREDUMP(status),
        })
    } else if libc::WIFEXITED(status) && libc::WEXITSTATUS(status) != 0 {
        Some(CrashStatus::Exited {
            code: libc::WEXITSTATUS(status),
        })
    } else {
        None
    }
}

impl RemoteApp for ProcessApp {
    fn get_actors_status(&mut self, want_transitions: bool) -> Result<Vec<ActorStatus>, McError> {
        let result = self.current()?.get_actors_status(want_transitions);
        self.diagnose(result)
    }

    fn handle_simcall(
        &mut self,
        aid: Aid,
        times_considered: u32,
        want_transition: bool,
    ) -> Result<Option<Transition>, McError> {
        let result = self
            .current()?
            .handle_simcall(aid, times_considered, want_transition);
        self.diagnose(result)
    }

    fn wait_for_requests(&mut self) -> Result<(), McError> {
        let result = self.current()?.wait_for_requests();
        self.diagnose(result)
    }

    fn check_deadlock(&mut self, verbose: bool) -> Result<bool, McError> {
        let result = self.current()?.check_deadlock(verbose);
        self.diagnose(result)
    }

    fn replay_sequence(
        &mut self,
        silent: &[(Aid, u32)],
        with_status: &[(Aid, u32)],
    ) -> Result<Vec<ReplayedStep>, McError> {
        let result = self.current()?.replay(silent, with_status);
        self.diagnose(result)
    }

    fn go_one_way(
        &mut self,
        random_seed: Option<u64>,
        want_transitions: bool,
    ) -> Result<Vec<ReplayedStep>, McError> {
        let result = self.current()?.go_one_way(random_seed, want_transitions);
        self.diagnose(result)
    }

    fn clone_checker_side(&mut self) -> Result<CheckpointId, McError> {
        if self.no_fork {
            return Err(McError::Internal(
                "checkpoints need forking, which is disabled".to_string(),
            ));
        }
        let current = self.current.take();
        let result = match current {
            Some(side) => {
                let id = self.next_checkpoint;
                self.next_checkpoint += 1;
                // The current app is the one being forked
                self.checkpoints.insert(id, side);
                match self.fork_from(Some(id)) {
                    Ok(copy) => {
                        // Keep running the copy, the original stays paused
                        self.current = Some(copy);
                        Ok(id)
                    }
                    Err(e) => {
                        self.current = self.checkpoints.remove(&id);
                        Err(e)
                    }
                }
            }
            None => Err(McError::Internal("no app to checkpoint".to_string())),
        };
        self.diagnose(result)
    }

    fn restore_checker_side(&mut self, from: Option<CheckpointId>) -> Result<(), McError> {
        if let Some(old) = self.current.take() {
            self.terminate(old)?;
        }
        if self.no_fork {
            if from.is_some() {
                return Err(McError::Internal(
                    "checkpoints need forking, which is disabled".to_string(),
                ));
            }
            self.current = Some(self.start_process()?);
            return Ok(());
        }
        let side = self.fork_from(from)?;
        self.current = Some(side);
        Ok(())
    }

    fn release_checkpoint(&mut self, id: CheckpointId) {
        if let Some(side) = self.checkpoints.remove(&id) {
            if let Err(e) = self.terminate(side) {
                warn!(checkpoint = id, error = %e, "could not reap checkpoint");
            }
        }
    }

    fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    fn finalize_app(&mut self, terminate_asap: bool) -> Result<(), McError> {
        let Some(mut side) = self.current.take() else {
            return Ok(());
        };
        side.finalize(terminate_asap)?;
        let status = self.reap(&side)?;
        if let Some(crash) = crash_status(status) {
            return Err(McError::ProgramCrash(crash));
        }
        Ok(())
    }

    fn get_maxpid(&mut self) -> Result<u32, McError> {
        let result = self.current()?.get_maxpid();
        self.diagnose(result)
    }
}

impl Drop for ProcessApp {
    fn drop(&mut self) {
        // Children first, while their parents are still there to reap them
        if let Some(side) = self.current.take() {
            if let Err(e) = self.terminate(side) {
                debug!(error = %e, "could not reap app");
            }
        }
        let ids: Vec<CheckpointId> = self.checkpoints.keys().rev().copied().collect();
        for id in ids {
            self.release_checkpoint(id);
        }
        if let Some(root) = self.root.take() {
            if let Err(e) = self.terminate(root) {
                debug!(error = %e, "could not reap root app");
            }
        }
    }
}
