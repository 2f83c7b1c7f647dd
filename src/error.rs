//! Error types shared by the checker layers.
//!
//! Findings surfaced by the checked program (assertion failures, crashes) travel
//! through the same `McError` channel as I/O and protocol failures, so that every
//! layer can use `?`. The exploration driver is the only place that turns the
//! finding variants into bug reports and decides the process exit status.

use std::io::Error as IoError;

/// How the checked process terminated when it was not asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashStatus {
    /// Killed by a signal
    Signaled { signal: i32, core_dumped: bool },
    /// Exited on its own with a non-zero code
    Exited { code: i32 },
}

impl std::fmt::Display for CrashStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrashStatus::Signaled {
                signal,
                core_dumped,
            } => {
                write!(f, "killed by signal {}", signal)?;
                if *core_dumped {
                    write!(f, " (core dumped)")?;
                }
                Ok(())
            }
            CrashStatus::Exited { code } => write!(f, "exited with code {}", code),
        }
    }
}

/// Violations of the checker/app wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A message of another type arrived
    UnexpectedMessage {
        expected: &'static str,
        received: String,
    },
    /// The app answered for another actor than the one requested
    WrongActor { expected: u32, received: u32 },
    /// A frame announced more bytes than the peer sent
    Truncated { expected: usize, actual: usize },
    /// A frame exceeds the maximal accepted size
    Oversized(usize),
    /// REPLAY lists are malformed
    ReplayEncoding(String),
    /// The peer closed the channel
    Closed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::UnexpectedMessage { expected, received } => write!(
                f,
                "unexpected message: expected {} but received {}",
                expected, received
            ),
            ProtocolError::WrongActor { expected, received } => write!(
                f,
                "app replied for actor {} while actor {} was requested",
                received, expected
            ),
            ProtocolError::Truncated { expected, actual } => write!(
                f,
                "truncated frame: expected {} bytes, got {}",
                expected, actual
            ),
            ProtocolError::Oversized(len) => write!(f, "frame of {} bytes is too large", len),
            ProtocolError::ReplayEncoding(msg) => write!(f, "invalid REPLAY payload: {}", msg),
            ProtocolError::Closed => write!(f, "channel closed by peer"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Invalid or inconsistent checker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `--cfg` flag that does not look like `model-check/<key>:<value>`
    Malformed(String),
    /// Known key, value that does not parse
    InvalidValue { key: String, value: String },
    /// Key this checker does not know
    UnknownKey(String),
    /// Two settings that cannot be combined
    Incompatible(String),
    /// TOML file could not be read or parsed
    File(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Malformed(flag) => write!(f, "malformed configuration flag: {}", flag),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value '{}' for configuration key {}", value, key)
            }
            ConfigError::UnknownKey(key) => write!(f, "unknown configuration key: {}", key),
            ConfigError::Incompatible(msg) => write!(f, "incompatible configuration: {}", msg),
            ConfigError::File(msg) => write!(f, "configuration file error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Crate-level error.
#[derive(Debug)]
pub enum McError {
    /// I/O error on the channel, a socket or a dot file
    Io(IoError),
    /// bincode could not encode or decode a message
    Codec(String),
    /// Wire protocol violation
    Protocol(ProtocolError),
    /// Bad configuration
    Config(ConfigError),
    /// Out of file descriptors, sockets or processes
    ResourceExhausted(String),
    /// The checked process did not answer in time
    Timeout(String),
    /// The checked program reported a failed assertion
    AssertionFailed(String),
    /// The checked process died without being asked to
    ProgramCrash(CrashStatus),
    /// Replaying a step did not produce the transition recorded for it
    NonDeterminism(String),
    /// Checker-side invariant broken at runtime
    Internal(String),
}

impl McError {
    /// Whether this error is a finding about the checked program rather than a checker failure
    pub fn is_finding(&self) -> bool {
        matches!(
            self,
            McError::AssertionFailed(_) | McError::ProgramCrash(_) | McError::NonDeterminism(_)
        )
    }
}

impl std::fmt::Display for McError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            McError::Io(e) => write!(f, "I/O error: {}", e),
            McError::Codec(msg) => write!(f, "codec error: {}", msg),
            McError::Protocol(e) => write!(f, "protocol error: {}", e),
            McError::Config(e) => write!(f, "{}", e),
            McError::ResourceExhausted(msg) => write!(f, "resource exhausted: {}", msg),
            McError::Timeout(msg) => write!(f, "timeout: {}", msg),
            McError::AssertionFailed(msg) => write!(f, "assertion failed: {}", msg),
            McError::ProgramCrash(status) => write!(f, "checked program crashed: {}", status),
            McError::NonDeterminism(msg) => write!(f, "non-deterministic execution: {}", msg),
            McError::Internal(msg) => write!(f, "internal checker error: {}", msg),
        }
    }
}

impl std::error::Error for McError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            McError::Io(e) => Some(e),
            McError::Protocol(e) => Some(e),
            McError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for McError {
    fn from(e: IoError) -> Self {
        match e.raw_os_error() {
            Some(libc::EMFILE) | Some(libc::ENFILE) => McError::ResourceExhausted(format!(
                "{} (raise the limit with `ulimit -n`)",
                e
            )),
            _ => McError::Io(e),
        }
    }
}

impl From<ProtocolError> for McError {
    fn from(e: ProtocolError) -> Self {
        McError::Protocol(e)
    }
}

impl From<ConfigError> for McError {
    fn from(e: ConfigError) -> Self {
        McError::Config(e)
    }
}

impl From<bincode::Error> for McError {
    fn from(e: bincode::Error) -> Self {
        McError::Codec(e.to_string())
    }
}

/// Process exit status of the checker binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Safety = 1,
    Liveness = 2,
    Deadlock = 3,
    NonTermination = 4,
    NonDeterminism = 5,
    DataRace = 6,
    ProgramCrash = 63,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emfile_maps_to_resource_exhausted() {
        let err: McError = IoError::from_raw_os_error(libc::EMFILE).into();
        assert!(matches!(err, McError::ResourceExhausted(_)));
        assert!(err.to_string().contains("ulimit"));
    }

    #[test]
    fn test_findings_are_flagged() {
        assert!(McError::AssertionFailed("x".into()).is_finding());
        assert!(McError::ProgramCrash(CrashStatus::Exited { code: 2 }).is_finding());
        assert!(!McError::Internal("x".into()).is_finding());
    }

    #[test]
    fn test_crash_status_display() {
        let status = CrashStatus::Signaled {
            signal: 11,
            core_dumped: true,
        };
        assert_eq!(status.to_string(), "killed by signal 11 (core dumped)");
    }
}
