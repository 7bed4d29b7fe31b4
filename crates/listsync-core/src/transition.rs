use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

static NEXT_TRANSITION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically increasing transition identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionId(u64);

impl TransitionId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(NEXT_TRANSITION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Minimal edit script turning one snapshot's rows into another's.
///
/// Apply `removed` in the stored (descending) order, then `inserted` in the
/// stored (ascending) order, then `updated`, whose indices are final positions.
#[derive(Debug, Clone)]
pub struct Transition<R> {
    id: TransitionId,
    pub removed: Vec<usize>,
    pub inserted: Vec<(usize, R)>,
    pub updated: Vec<(usize, R)>,
    pub animated: bool,
}

/// Serializable shape of a transition, without the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSummary {
    pub id: TransitionId,
    pub removed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub animated: bool,
}

impl<R> Transition<R> {
    pub fn new(
        removed: Vec<usize>,
        inserted: Vec<(usize, R)>,
        updated: Vec<(usize, R)>,
        animated: bool,
    ) -> Self {
        debug_assert!(
            removed.windows(2).all(|pair| pair[0] > pair[1]),
            "removed indices must be strictly descending"
        );
        debug_assert!(
            inserted.windows(2).all(|pair| pair[0].0 < pair[1].0),
            "inserted indices must be strictly ascending"
        );
        Self {
            id: TransitionId::next(),
            removed,
            inserted,
            updated,
            animated,
        }
    }

    /// Transition that changes nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new(), false)
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty() && self.updated.is_empty()
    }

    pub fn summary(&self) -> TransitionSummary {
        TransitionSummary {
            id: self.id,
            removed: self.removed.len(),
            inserted: self.inserted.len(),
            updated: self.updated.len(),
            animated: self.animated,
        }
    }

    /// Same edit script with every row passed through `f`; the id is kept.
    pub fn map_rows<T>(self, mut f: impl FnMut(R) -> T) -> Transition<T> {
        Transition {
            id: self.id,
            removed: self.removed,
            inserted: self
                .inserted
                .into_iter()
                .map(|(index, row)| (index, f(row)))
                .collect(),
            updated: self
                .updated
                .into_iter()
                .map(|(index, row)| (index, f(row)))
                .collect(),
            animated: self.animated,
        }
    }

    /// Apply the edit script to a plain vector of rows.
    ///
    /// Panics if an index is out of range; callers that cannot trust the
    /// transition validate first.
    pub fn apply_to(self, rows: &mut Vec<R>) {
        for index in self.removed {
            rows.remove(index);
        }
        for (index, row) in self.inserted {
            rows.insert(index, row);
        }
        for (index, row) in self.updated {
            rows[index] = row;
        }
    }
}

impl<R> fmt::Display for Transition<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted: {}, updated: {}, removed: {}, animated: {}",
            self.inserted.len(),
            self.updated.len(),
            self.removed.len(),
            self.animated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let a = Transition::<()>::empty();
        let b = Transition::<()>::empty();
        assert!(b.id() > a.id());
    }

    #[test]
    fn applies_in_remove_insert_update_order() {
        let mut rows = vec!["a", "b", "c", "d"];
        Transition::new(vec![3, 1], vec![(0, "z"), (3, "y")], vec![(1, "A")], true)
            .apply_to(&mut rows);
        assert_eq!(rows, vec!["z", "A", "c", "y"]);
    }

    #[test]
    fn map_rows_keeps_identity_and_indices() {
        let transition = Transition::new(vec![0], vec![(0, 1u8)], vec![(1, 2u8)], true);
        let id = transition.id();
        let mapped = transition.map_rows(|value| value.to_string());
        assert_eq!(mapped.id(), id);
        assert_eq!(mapped.inserted, vec![(0, "1".to_owned())]);
        assert_eq!(mapped.updated, vec![(1, "2".to_owned())]);
    }

    #[test]
    fn describes_counts() {
        let transition = Transition::new(vec![2, 0], vec![(0, ())], Vec::new(), true);
        assert_eq!(
            transition.to_string(),
            "inserted: 1, updated: 0, removed: 2, animated: true"
        );
        assert!(!transition.is_empty());
        assert!(Transition::<()>::empty().is_empty());
    }

    #[test]
    fn summary_counts_each_edit_kind() {
        let transition = Transition::new(vec![1], vec![(0, ()), (2, ())], vec![(1, ())], false);
        let summary = transition.summary();
        assert_eq!(summary.id, transition.id());
        assert_eq!((summary.removed, summary.inserted, summary.updated), (1, 2, 1));
        assert!(!summary.animated);
    }
}
