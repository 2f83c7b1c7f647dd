use super::{ExplorationStrategy, StrategyData};
use crate::state::{ActorState, State};
use crate::transition::{CommOp, Transition, TransitionKind};

/// Steers the exploration by how communications get paired.
///
/// The maximizing flavor first runs the sends and receives that match a pending
/// partner on their mailbox, the minimizing flavor delays them.
#[derive(Debug, Clone, Copy)]
pub struct MatchCommStrategy {
    maximize: bool,
}

impl MatchCommStrategy {
    pub fn maximizing() -> Self {
        MatchCommStrategy { maximize: true }
    }

    pub fn minimizing() -> Self {
        MatchCommStrategy { maximize: false }
    }

    /// Whether `t` pairs with a comm already posted on its mailbox, or `None` for
    /// anything that is not a send or a receive.
    fn matches_pending(data: &StrategyData, t: &Transition) -> Option<bool> {
        let TransitionKind::Comm(comm) = &t.kind else {
            return None;
        };
        let balance = data.mailbox_balance.get(&comm.mbox).copied().unwrap_or(0);
        match comm.op {
            CommOp::AsyncSend => Some(balance < 0),
            CommOp::AsyncRecv => Some(balance > 0),
            _ => None,
        }
    }
}

impl ExplorationStrategy for MatchCommStrategy {
    fn name(&self) -> &'static str {
        if self.maximize {
            "max_match_comm"
        } else {
            "min_match_comm"
        }
    }

    fn wants_transitions(&self) -> bool {
        true
    }

    fn child_data(&self, parent: &StrategyData, incoming: &Transition) -> StrategyData {
        let mut data = parent.clone();
        if let TransitionKind::Comm(comm) = &incoming.kind {
            let delta = match comm.op {
                CommOp::AsyncSend => 1,
                CommOp::AsyncRecv => -1,
                _ => 0,
            };
            if delta != 0 {
                *data.mailbox_balance.entry(comm.mbox).or_default() += delta;
            }
        }
        data
    }

    fn valuation(&self, state: &State, actor: &ActorState) -> i32 {
        let base = state.strategy_data().unmatched_comms();
        let Some(t) = actor.next_transition() else {
            return base;
        };
        match Self::matches_pending(state.strategy_data(), t) {
            Some(matches) if matches == self.maximize => base - 1,
            Some(_) => base + 1,
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{Aid, CommTransition};

    fn comm(op: CommOp, mbox: u32) -> Transition {
        Transition::new(
            Aid(1),
            0,
            TransitionKind::Comm(CommTransition {
                op,
                mbox,
                comm: None,
                sender: None,
                receiver: None,
                timeout: false,
            }),
        )
    }

    #[test]
    fn test_balance_follows_posted_comms() {
        let strategy = MatchCommStrategy::maximizing();
        let data = strategy.child_data(&StrategyData::default(), &comm(CommOp::AsyncRecv, 4));
        assert_eq!(data.mailbox_balance.get(&4), Some(&-1));
        assert_eq!(data.unmatched_comms(), 1);
        assert_eq!(
            MatchCommStrategy::matches_pending(&data, &comm(CommOp::AsyncSend, 4)),
            Some(true)
        );
        assert_eq!(
            MatchCommStrategy::matches_pending(&data, &comm(CommOp::AsyncSend, 5)),
            Some(false)
        );
        let data = strategy.child_data(&data, &comm(CommOp::AsyncSend, 4));
        assert_eq!(data.unmatched_comms(), 0);
    }
}
