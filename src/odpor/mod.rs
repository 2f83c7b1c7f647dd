//! Executions, clock vectors and wakeup trees: the building blocks of the
//! dynamic partial-order reductions.

pub mod clock_vector;
pub mod execution;
pub mod mazurkiewicz;
pub mod wakeup_tree;

pub use clock_vector::ClockVector;
pub use execution::{
    one_string_textual_trace, textual_trace, DataRace, Event, EventHandle, Execution,
    PartialExecution,
};
pub use mazurkiewicz::MazurkiewiczTraces;
pub use wakeup_tree::{InsertionResult, NodeId, WakeupTree};
