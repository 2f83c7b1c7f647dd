use super::ExplorationStrategy;
use crate::rng::DeterministicRng;
use crate::state::{ActorState, State};

/// Random valuations, drawn once per (state, actor) pair from the exploration seed.
#[derive(Debug, Clone, Copy)]
pub struct UniformStrategy {
    seed: u64,
}

impl UniformStrategy {
    pub fn new(seed: u64) -> Self {
        UniformStrategy { seed }
    }
}

impl ExplorationStrategy for UniformStrategy {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn valuation(&self, state: &State, actor: &ActorState) -> i32 {
        let mut rng = DeterministicRng::new(
            self.seed ^ state.num().rotate_left(32) ^ u64::from(actor.aid().0),
        );
        rng.gen_range(0, 256) as i32
    }
}
