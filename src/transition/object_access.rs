use super::{Transition, TransitionKind};
use serde::{Deserialize, Serialize};

/// Which side of a non-reentrant object access was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectAccessKind {
    Enter,
    Exit,
    Both,
}

/// Access to an object that must not be used concurrently (e.g. a non thread-safe container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAccessTransition {
    pub object: u64,
    pub access: ObjectAccessKind,
    pub name: String,
}

impl ObjectAccessTransition {
    pub(crate) fn depends(&self, other: &Transition) -> bool {
        match &other.kind {
            TransitionKind::ObjectAccess(o) => o.object == self.object,
            _ => false,
        }
    }

    pub(crate) fn describe(&self) -> String {
        let access = match self.access {
            ObjectAccessKind::Enter => "ENTER",
            ObjectAccessKind::Exit => "EXIT",
            ObjectAccessKind::Both => "BOTH",
        };
        format!("ObjectAccess({} {} @ {:#x})", access, self.name, self.object)
    }
}
