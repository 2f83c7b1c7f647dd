use super::{Aid, Transition, TransitionKind, TransitionType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommOp {
    AsyncRecv,
    AsyncSend,
    Iprobe,
    Test,
    Wait,
}

/// Mailbox communication step. `comm` is unknown for a pending receive or send that
/// has not been posted yet; the matching partners are known once the comm is paired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommTransition {
    pub op: CommOp,
    pub mbox: u32,
    pub comm: Option<u64>,
    pub sender: Option<Aid>,
    pub receiver: Option<Aid>,
    pub timeout: bool,
}

impl CommTransition {
    pub fn type_(&self) -> TransitionType {
        match self.op {
            CommOp::AsyncRecv => TransitionType::CommAsyncRecv,
            CommOp::AsyncSend => TransitionType::CommAsyncSend,
            CommOp::Iprobe => TransitionType::CommIprobe,
            CommOp::Test => TransitionType::CommTest,
            CommOp::Wait => TransitionType::CommWait,
        }
    }

    fn same_comm(&self, other: &CommTransition) -> bool {
        match (self.comm, other.comm) {
            (Some(a), Some(b)) => a == b,
            // Not posted yet: anything on the mailbox may end up paired with it
            _ => self.mbox == other.mbox,
        }
    }

    /// Dependency between two comm steps of distinct actors, whatever their order.
    pub(crate) fn depends_on_comm(&self, other: &CommTransition) -> bool {
        let (a, b) = if other.op < self.op {
            (other, self)
        } else {
            (self, other)
        };
        match (a.op, b.op) {
            (CommOp::AsyncRecv, CommOp::AsyncRecv) | (CommOp::AsyncSend, CommOp::AsyncSend) => {
                a.mbox == b.mbox
            }
            // Posting on both ends of a mailbox commutes: the pairing is the same either way
            (CommOp::AsyncRecv, CommOp::AsyncSend) => false,
            (CommOp::AsyncRecv | CommOp::AsyncSend, CommOp::Iprobe) => a.mbox == b.mbox,
            (CommOp::AsyncRecv | CommOp::AsyncSend, CommOp::Test | CommOp::Wait) => {
                a.same_comm(b)
            }
            (CommOp::Iprobe, _) => false,
            (CommOp::Test, CommOp::Test) => false,
            (CommOp::Test, CommOp::Wait) => b.timeout && a.same_comm(b),
            (CommOp::Wait, CommOp::Wait) => (a.timeout || b.timeout) && a.same_comm(b),
            _ => unreachable!("comm ops are ordered above"),
        }
    }

    pub(crate) fn depends(&self, _aid: Aid, other: &Transition) -> bool {
        match &other.kind {
            TransitionKind::Comm(o) => self.depends_on_comm(o),
            _ => false,
        }
    }

    /// Reversibility of a race between an earlier step of kind `earlier` and `self` as the later one.
    pub(crate) fn reversible_after(&self, earlier: CommOp) -> bool {
        match self.op {
            // Posting, probing and testing are always enabled
            CommOp::AsyncRecv | CommOp::AsyncSend | CommOp::Iprobe | CommOp::Test => true,
            CommOp::Wait if self.timeout => true,
            // The earlier post paired the comm and enabled the wait
            CommOp::Wait => !matches!(earlier, CommOp::AsyncRecv | CommOp::AsyncSend),
        }
    }

    pub(crate) fn reversible_race(&self, later: &CommTransition) -> bool {
        later.reversible_after(self.op)
    }

    pub(crate) fn describe(&self, verbose: bool) -> String {
        let name = match self.op {
            CommOp::AsyncRecv => "iRecv",
            CommOp::AsyncSend => "iSend",
            CommOp::Iprobe => "Iprobe",
            CommOp::Test => "Test",
            CommOp::Wait => "Wait",
        };
        let mut out = format!("{}(mbox: {}", name, self.mbox);
        if let Some(comm) = self.comm {
            out.push_str(&format!(", comm: {}", comm));
        }
        if verbose || matches!(self.op, CommOp::Test | CommOp::Wait) {
            if let (Some(s), Some(r)) = (self.sender, self.receiver) {
                out.push_str(&format!(", {} -> {}", s, r));
            }
        }
        if self.timeout {
            out.push_str(", timeout");
        }
        out.push(')');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comm(op: CommOp, mbox: u32, comm: Option<u64>) -> CommTransition {
        CommTransition {
            op,
            mbox,
            comm,
            sender: Some(Aid(1)),
            receiver: Some(Aid(2)),
            timeout: false,
        }
    }

    #[test]
    fn test_send_and_recv_commute() {
        let send = comm(CommOp::AsyncSend, 0, Some(1));
        let recv = comm(CommOp::AsyncRecv, 0, Some(1));
        assert!(!send.depends_on_comm(&recv));
        assert!(!recv.depends_on_comm(&send));
    }

    #[test]
    fn test_post_and_wait_on_same_comm() {
        let send = comm(CommOp::AsyncSend, 0, Some(1));
        let wait = comm(CommOp::Wait, 0, Some(1));
        let other_wait = comm(CommOp::Wait, 0, Some(2));
        assert!(send.depends_on_comm(&wait));
        assert!(wait.depends_on_comm(&send));
        assert!(!send.depends_on_comm(&other_wait));
        assert!(!send.reversible_race(&wait));
        assert!(wait.reversible_race(&comm(CommOp::AsyncSend, 0, Some(1))));
    }

    #[test]
    fn test_waits_without_timeout_commute() {
        let a = comm(CommOp::Wait, 0, Some(1));
        let mut b = comm(CommOp::Wait, 0, Some(1));
        assert!(!a.depends_on_comm(&b));
        b.timeout = true;
        assert!(a.depends_on_comm(&b));
    }
}
