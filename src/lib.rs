//! Stateless model checking of concurrent programs.
//!
//! The checker drives a program made of actors, one transition at a time, and
//! explores its interleavings. Reductions (DPOR, SDPOR, ODPOR and its best-first
//! variants) skip interleavings equivalent to already explored ones. The checked
//! program runs either in a separate process, served over a Unix socket, or in the
//! checker's own process.

pub mod app;
pub mod config;
pub mod error;
pub mod explo;
pub mod observability;
pub mod odpor;
pub mod reduction;
pub mod remote;
pub mod rng;
pub mod state;
pub mod strategy;
pub mod transition;

pub use config::{CheckerConfig, ExplorerKind, ReductionMode, StrategyKind};
pub use error::{ExitStatus, McError};
pub use explo::{BugKind, BugReport, ExplorationContext, ExplorationStats, SearchOutcome};
pub use remote::{InProcessApp, ProcessApp, RemoteApp};
