use std::{fmt::Debug, hash::Hash, sync::Arc};

/// Immutable, identity-keyed backing record for one logical list row.
///
/// A changed payload for the same [`Entry::stable_id`] is expressed as a new
/// value; entries are never mutated in place once placed in a snapshot.
pub trait Entry: Clone + Send + Sync + 'static {
    /// Identity that survives across snapshots independent of position.
    type Id: Eq + Hash + Clone + Debug + Send + Sync;
    /// Primary ordering key. Ties keep insertion order.
    type Key: Ord;

    /// Identity of this row.
    fn stable_id(&self) -> Self::Id;

    /// Ordering key of this row.
    fn sort_key(&self) -> Self::Key;
}

/// Pluggable mapping from entries to rendered rows.
///
/// Both methods must be pure functions of their inputs: if `same_payload`
/// reports two entries equal, the rows `make_row` builds for them must be
/// visually indistinguishable.
pub trait RowFactory<E: Entry> {
    /// Opaque renderable row handed to the list view.
    type Row;

    /// Build the row for one entry.
    fn make_row(&self, entry: &E) -> Self::Row;

    /// Whether two entries with the same stable id render identically.
    fn same_payload(&self, old: &E, new: &E) -> bool;
}

impl<E: Entry, F: RowFactory<E> + ?Sized> RowFactory<E> for &F {
    type Row = F::Row;

    fn make_row(&self, entry: &E) -> Self::Row {
        (**self).make_row(entry)
    }

    fn same_payload(&self, old: &E, new: &E) -> bool {
        (**self).same_payload(old, new)
    }
}

impl<E: Entry, F: RowFactory<E> + ?Sized> RowFactory<E> for Arc<F> {
    type Row = F::Row;

    fn make_row(&self, entry: &E) -> Self::Row {
        (**self).make_row(entry)
    }

    fn same_payload(&self, old: &E, new: &E) -> bool {
        (**self).same_payload(old, new)
    }
}

/// Row factory built from a closure, comparing payloads with `PartialEq`.
#[derive(Clone)]
pub struct EqRows<M> {
    make: M,
}

impl<M> EqRows<M> {
    pub fn new(make: M) -> Self {
        Self { make }
    }
}

impl<E, M, R> RowFactory<E> for EqRows<M>
where
    E: Entry + PartialEq,
    M: Fn(&E) -> R,
{
    type Row = R;

    fn make_row(&self, entry: &E) -> R {
        (self.make)(entry)
    }

    fn same_payload(&self, old: &E, new: &E) -> bool {
        old == new
    }
}

/// Row factory built from a pair of closures.
#[derive(Clone)]
pub struct FnRows<M, Q> {
    make: M,
    same: Q,
}

impl<M, Q> FnRows<M, Q> {
    pub fn new(make: M, same: Q) -> Self {
        Self { make, same }
    }
}

impl<E, M, Q, R> RowFactory<E> for FnRows<M, Q>
where
    E: Entry,
    M: Fn(&E) -> R,
    Q: Fn(&E, &E) -> bool,
{
    type Row = R;

    fn make_row(&self, entry: &E) -> R {
        (self.make)(entry)
    }

    fn same_payload(&self, old: &E, new: &E) -> bool {
        (self.same)(old, new)
    }
}

/// An entry paired with the immutable appearance it was built under.
///
/// Two `Styled` values are equal only when both the entry and the appearance
/// are equal, so swapping the appearance re-renders every row without any
/// ambient theme state.
#[derive(Debug)]
pub struct Styled<E, A> {
    pub entry: E,
    pub appearance: Arc<A>,
}

impl<E: Clone, A> Clone for Styled<E, A> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            appearance: Arc::clone(&self.appearance),
        }
    }
}

impl<E, A> Styled<E, A> {
    pub fn new(entry: E, appearance: Arc<A>) -> Self {
        Self { entry, appearance }
    }

    /// Wrap every entry of a list with the same appearance.
    pub fn wrap_all(entries: impl IntoIterator<Item = E>, appearance: &Arc<A>) -> Vec<Self> {
        entries
            .into_iter()
            .map(|entry| Self::new(entry, Arc::clone(appearance)))
            .collect()
    }
}

impl<E: PartialEq, A: PartialEq> PartialEq for Styled<E, A> {
    fn eq(&self, other: &Self) -> bool {
        self.entry == other.entry
            && (Arc::ptr_eq(&self.appearance, &other.appearance)
                || self.appearance == other.appearance)
    }
}

impl<E: Eq, A: Eq> Eq for Styled<E, A> {}

impl<E, A> Entry for Styled<E, A>
where
    E: Entry,
    A: Send + Sync + 'static,
{
    type Id = E::Id;
    type Key = E::Key;

    fn stable_id(&self) -> Self::Id {
        self.entry.stable_id()
    }

    fn sort_key(&self) -> Self::Key {
        self.entry.sort_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{diff::reconcile, snapshot::Snapshot};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Note {
        id: u32,
        text: &'static str,
    }

    impl Entry for Note {
        type Id = u32;
        type Key = u32;

        fn stable_id(&self) -> u32 {
            self.id
        }

        fn sort_key(&self) -> u32 {
            self.id
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Theme {
        dark: bool,
    }

    #[test]
    fn eq_rows_compares_whole_entry() {
        let rows = EqRows::new(|note: &Note| note.text.to_owned());
        let a = Note { id: 1, text: "a" };
        let b = Note { id: 1, text: "b" };
        assert!(rows.same_payload(&a, &a.clone()));
        assert!(!rows.same_payload(&a, &b));
        assert_eq!(rows.make_row(&b), "b");
    }

    #[test]
    fn fn_rows_uses_custom_equality() {
        let rows = FnRows::new(
            |note: &Note| note.id,
            |old: &Note, new: &Note| old.text.len() == new.text.len(),
        );
        assert!(rows.same_payload(&Note { id: 1, text: "a" }, &Note { id: 1, text: "b" }));
        assert_eq!(rows.make_row(&Note { id: 7, text: "" }), 7);
    }

    #[test]
    fn styled_equality_tracks_appearance() {
        let light = Arc::new(Theme { dark: false });
        let dark = Arc::new(Theme { dark: true });
        let note = Note { id: 3, text: "x" };

        let a = Styled::new(note.clone(), Arc::clone(&light));
        let b = Styled::new(note.clone(), Arc::new(Theme { dark: false }));
        let c = Styled::new(note, dark);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.stable_id(), c.stable_id());
    }

    #[test]
    fn styled_entries_reconcile_without_cloning_appearance() {
        let theme = Arc::new(Theme { dark: false });
        let old = Snapshot::new(Styled::wrap_all(
            [Note { id: 1, text: "a" }, Note { id: 2, text: "b" }],
            &theme,
        ));
        let night = Arc::new(Theme { dark: true });
        let new = Snapshot::new(Styled::wrap_all(
            [Note { id: 2, text: "b" }, Note { id: 3, text: "c" }],
            &night,
        ));

        let rows = EqRows::new(|styled: &Styled<Note, Theme>| {
            (styled.entry.text, styled.appearance.dark)
        });
        let transition = reconcile(&old, &new, &rows);

        assert_eq!(transition.removed, vec![0]);
        assert_eq!(transition.inserted, vec![(1, ("c", true))]);
        assert_eq!(transition.updated, vec![(0, ("b", true))]);

        let copy = new[0].clone();
        assert!(Arc::ptr_eq(&copy.appearance, &night));
    }

    #[test]
    fn wrap_all_shares_one_appearance() {
        let theme = Arc::new(Theme { dark: true });
        let wrapped = Styled::wrap_all(
            [Note { id: 1, text: "a" }, Note { id: 2, text: "b" }],
            &theme,
        );
        assert_eq!(wrapped.len(), 2);
        assert!(Arc::ptr_eq(&wrapped[0].appearance, &wrapped[1].appearance));
    }
}
