use std::{collections::HashSet, ops::Deref, sync::Arc};

use crate::entry::Entry;

/// Ordered, uniquely keyed sequence of entries: "the list as of now".
///
/// Backed by `Arc<[E]>`, so cloning is O(1) and a snapshot can be handed to a
/// worker while the store already holds its successor.
#[derive(Debug)]
pub struct Snapshot<E> {
    entries: Arc<[E]>,
}

impl<E> Clone for Snapshot<E> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<E> Default for Snapshot<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E> Snapshot<E> {
    /// Snapshot with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&E> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.entries
    }

    /// Whether both snapshots share the same backing allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<E: Entry> Snapshot<E> {
    /// Build a snapshot from entries already in display order.
    ///
    /// Ordering and id uniqueness are asserted in debug builds only.
    pub fn new(entries: Vec<E>) -> Self {
        debug_assert!(is_sorted_by_key(&entries), "snapshot entries are not ordered");
        debug_assert!(has_unique_ids(&entries), "snapshot contains duplicate stable ids");
        Self {
            entries: Arc::from(entries),
        }
    }

    /// Build a snapshot from entries in arbitrary order.
    ///
    /// The sort is stable, so entries with equal keys keep their input order.
    pub fn from_unordered(mut entries: Vec<E>) -> Self {
        entries.sort_by_cached_key(|entry| entry.sort_key());
        Self::new(entries)
    }

    /// Index of the entry carrying `id`, if present.
    pub fn position_of(&self, id: &E::Id) -> Option<usize> {
        self.entries.iter().position(|entry| &entry.stable_id() == id)
    }

    /// Snapshot holding only the first `len` entries.
    pub fn prefix(&self, len: usize) -> Self {
        if len >= self.len() {
            return self.clone();
        }
        Self {
            entries: Arc::from(&self.entries[..len]),
        }
    }

    /// Stable ids in display order.
    pub fn ids(&self) -> Vec<E::Id> {
        self.entries.iter().map(Entry::stable_id).collect()
    }
}

impl<E> Deref for Snapshot<E> {
    type Target = [E];

    fn deref(&self) -> &[E] {
        &self.entries
    }
}

impl<'a, E> IntoIterator for &'a Snapshot<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<E: Entry> From<Vec<E>> for Snapshot<E> {
    fn from(entries: Vec<E>) -> Self {
        Self::new(entries)
    }
}

impl<E: PartialEq> PartialEq for Snapshot<E> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.entries[..] == other.entries[..]
    }
}

impl<E: Eq> Eq for Snapshot<E> {}

fn is_sorted_by_key<E: Entry>(entries: &[E]) -> bool {
    entries
        .windows(2)
        .all(|pair| pair[0].sort_key() <= pair[1].sort_key())
}

pub(crate) fn has_unique_ids<E: Entry>(entries: &[E]) -> bool {
    let mut seen = HashSet::with_capacity(entries.len());
    entries.iter().all(|entry| seen.insert(entry.stable_id()))
}
