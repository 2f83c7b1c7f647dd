use super::comm::{CommOp, CommTransition};
use super::{Aid, Transition, TransitionKind, TransitionType};
use serde::{Deserialize, Serialize};

/// Test or wait on a set of comms at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnyTransition {
    pub wait: bool,
    pub timeout: bool,
    pub comms: Vec<CommTransition>,
}

impl AnyTransition {
    pub fn type_(&self) -> TransitionType {
        if self.wait {
            TransitionType::WaitAny
        } else {
            TransitionType::TestAny
        }
    }

    fn as_comm_op(&self) -> CommOp {
        if self.wait {
            CommOp::Wait
        } else {
            CommOp::Test
        }
    }

    /// Dependent with anything one of the watched comms depends on.
    pub(crate) fn depends(&self, _aid: Aid, other: &Transition) -> bool {
        match &other.kind {
            TransitionKind::Comm(o) => self.comms.iter().any(|c| c.depends_on_comm(o)),
            TransitionKind::Any(o) => self
                .comms
                .iter()
                .any(|c| o.comms.iter().any(|d| c.depends_on_comm(d))),
            _ => false,
        }
    }

    pub(crate) fn reversible_race(&self, later: &Transition) -> bool {
        match &later.kind {
            TransitionKind::Comm(c) => c.reversible_after(self.as_comm_op()),
            TransitionKind::Any(a) => !a.wait || a.timeout,
            _ => panic!("{} cannot race with {}", self.type_(), later),
        }
    }

    pub(crate) fn reversible_race_as_later(&self, earlier: &Transition) -> bool {
        if !self.wait || self.timeout {
            return true;
        }
        match &earlier.kind {
            // The earlier post completed one of the watched comms
            TransitionKind::Comm(c) => !matches!(c.op, CommOp::AsyncRecv | CommOp::AsyncSend),
            _ => panic!("{} cannot race with {}", earlier, self.type_()),
        }
    }

    pub(crate) fn describe(&self, verbose: bool) -> String {
        let comms: Vec<String> = self.comms.iter().map(|c| c.describe(verbose)).collect();
        format!(
            "{}({})",
            if self.wait { "WaitAny" } else { "TestAny" },
            comms.join(", ")
        )
    }
}
