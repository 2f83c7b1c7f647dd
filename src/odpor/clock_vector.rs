use crate::transition::Aid;

/// Per-actor index of the latest event that happens-before a point of an execution.
///
/// Actors without such an event have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockVector {
    clocks: Vec<Option<usize>>,
}

impl ClockVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aid: Aid) -> Option<usize> {
        self.clocks.get(aid.index()).copied().flatten()
    }

    pub fn set(&mut self, aid: Aid, event: usize) {
        if self.clocks.len() <= aid.index() {
            self.clocks.resize(aid.index() + 1, None);
        }
        self.clocks[aid.index()] = Some(event);
    }

    /// Number of actor slots, including the empty ones.
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.iter().all(Option::is_none)
    }

    /// Component-wise maximum, stored in `self`.
    pub fn max_emplace_left(&mut self, other: &ClockVector) {
        if self.clocks.len() < other.clocks.len() {
            self.clocks.resize(other.clocks.len(), None);
        }
        for (mine, theirs) in self.clocks.iter_mut().zip(other.clocks.iter()) {
            *mine = match (*mine, *theirs) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }
    }

    /// Entries that are set, in actor order.
    pub fn iter(&self) -> impl Iterator<Item = (Aid, usize)> + '_ {
        self.clocks
            .iter()
            .enumerate()
            .filter_map(|(aid, c)| c.map(|c| (Aid(aid as u32), c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_entries() {
        let mut cv = ClockVector::new();
        assert_eq!(cv.get(Aid(3)), None);
        cv.set(Aid(3), 7);
        assert_eq!(cv.get(Aid(3)), Some(7));
        assert_eq!(cv.get(Aid(1)), None);
        assert_eq!(cv.len(), 4);
    }

    #[test]
    fn test_max_emplace_left() {
        let mut a = ClockVector::new();
        a.set(Aid(1), 4);
        a.set(Aid(2), 1);
        let mut b = ClockVector::new();
        b.set(Aid(2), 3);
        b.set(Aid(5), 0);

        a.max_emplace_left(&b);
        assert_eq!(a.get(Aid(1)), Some(4));
        assert_eq!(a.get(Aid(2)), Some(3));
        assert_eq!(a.get(Aid(5)), Some(0));
        assert_eq!(a.iter().count(), 3);
    }
}
