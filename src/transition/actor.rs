use super::{Aid, Transition, TransitionType};
use serde::{Deserialize, Serialize};

/// Actor lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorTransition {
    Join { target: Aid, timeout: bool },
    Sleep,
    Create { child: Aid },
    Exit,
}

impl ActorTransition {
    pub fn type_(&self) -> TransitionType {
        match self {
            ActorTransition::Join { .. } => TransitionType::ActorJoin,
            ActorTransition::Sleep => TransitionType::ActorSleep,
            ActorTransition::Create { .. } => TransitionType::ActorCreate,
            ActorTransition::Exit => TransitionType::ActorExit,
        }
    }

    pub(crate) fn reversible_race(&self, aid: Aid, later: &Transition) -> bool {
        match self {
            ActorTransition::Create { child } if later.aid == *child => false,
            _ => panic!(
                "{} of actor {} cannot race with {}",
                self.type_(),
                aid,
                later
            ),
        }
    }

    pub(crate) fn reversible_race_as_later(&self, aid: Aid, earlier: &Transition) -> bool {
        match self {
            // Only reachable through an actor creating its own creator, which cannot happen
            ActorTransition::Create { child } if earlier.aid == *child => false,
            _ => panic!(
                "{} cannot race with the later {} of actor {}",
                earlier,
                self.type_(),
                aid
            ),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            ActorTransition::Join { target, timeout } => format!(
                "ActorJoin(target: {}, timeout: {})",
                target,
                if *timeout { "yes" } else { "none" }
            ),
            ActorTransition::Sleep => "ActorSleep()".to_string(),
            ActorTransition::Create { child } => format!("ActorCreate(child: {})", child),
            ActorTransition::Exit => "ActorExit()".to_string(),
        }
    }
}
