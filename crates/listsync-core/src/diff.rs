//! Identity-keyed diff between two snapshots.
//!
//! The engine never emits explicit moves. An entry whose position relative to
//! the other surviving entries changed is removed and re-inserted; an entry
//! whose index merely shifted because of neighbouring insertions or removals
//! produces no edit at all.

use std::collections::HashMap;

use crate::{
    entry::{Entry, RowFactory},
    snapshot::{Snapshot, has_unique_ids},
    transition::Transition,
};

/// Per-pass knobs for [`reconcile_with`].
#[derive(Clone, Copy, Default)]
pub struct ReconcileOptions<'a> {
    /// First application for the screen; suppresses animation of update-only passes.
    pub cold_start: bool,
    /// Polled before each row is built. Once it returns `true` the pass is abandoned.
    pub cancelled: Option<&'a (dyn Fn() -> bool + Sync)>,
}

impl<'a> ReconcileOptions<'a> {
    pub fn cold_start(mut self, cold_start: bool) -> Self {
        self.cold_start = cold_start;
        self
    }

    pub fn cancelled_by(mut self, cancelled: &'a (dyn Fn() -> bool + Sync)) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.is_some_and(|cancelled| cancelled())
    }
}

/// Compute the edit script turning `old` into `new`.
pub fn reconcile<E, F>(old: &Snapshot<E>, new: &Snapshot<E>, rows: &F) -> Transition<F::Row>
where
    E: Entry,
    F: RowFactory<E>,
{
    reconcile_with(old, new, rows, ReconcileOptions::default()).unwrap_or_else(Transition::empty)
}

/// [`reconcile`] with cold-start and cancellation control.
///
/// Returns `None` when the pass was cancelled before it finished building rows.
pub fn reconcile_with<E, F>(
    old: &Snapshot<E>,
    new: &Snapshot<E>,
    rows: &F,
    options: ReconcileOptions<'_>,
) -> Option<Transition<F::Row>>
where
    E: Entry,
    F: RowFactory<E>,
{
    debug_assert!(has_unique_ids(old), "old snapshot contains duplicate stable ids");
    debug_assert!(has_unique_ids(new), "new snapshot contains duplicate stable ids");

    // Later duplicates overwrite earlier ones; only the winner can be matched.
    let old_index: HashMap<E::Id, usize> = old
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.stable_id(), index))
        .collect();
    let new_index: HashMap<E::Id, usize> = new
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.stable_id(), index))
        .collect();

    // (old index, new index) for every matched id, in old order.
    let mut survivors: Vec<(usize, usize)> = Vec::with_capacity(old.len().min(new.len()));
    for (old_pos, entry) in old.iter().enumerate() {
        let id = entry.stable_id();
        if old_index.get(&id) != Some(&old_pos) {
            continue;
        }
        if let Some(&new_pos) = new_index.get(&id) {
            survivors.push((old_pos, new_pos));
        }
    }

    let in_order = survivors.windows(2).all(|pair| pair[0].1 < pair[1].1);
    let keep = if in_order {
        vec![true; survivors.len()]
    } else {
        let targets: Vec<usize> = survivors.iter().map(|&(_, new_pos)| new_pos).collect();
        longest_increasing_run(&targets)
    };

    let mut kept_old = vec![false; old.len()];
    let mut kept_new: Vec<Option<usize>> = vec![None; new.len()];
    for (&(old_pos, new_pos), keep) in survivors.iter().zip(keep) {
        if keep {
            kept_old[old_pos] = true;
            kept_new[new_pos] = Some(old_pos);
        }
    }

    let removed: Vec<usize> = (0..old.len()).rev().filter(|&pos| !kept_old[pos]).collect();

    let mut inserted = Vec::new();
    let mut updated = Vec::new();
    for (new_pos, entry) in new.iter().enumerate() {
        match kept_new[new_pos] {
            Some(old_pos) => {
                if rows.same_payload(&old[old_pos], entry) {
                    continue;
                }
                if options.is_cancelled() {
                    return None;
                }
                updated.push((new_pos, rows.make_row(entry)));
            }
            None => {
                if options.is_cancelled() {
                    return None;
                }
                inserted.push((new_pos, rows.make_row(entry)));
            }
        }
    }

    let update_only = removed.is_empty() && inserted.is_empty() && !updated.is_empty();
    let animated = !(options.cold_start && update_only);

    Some(Transition::new(removed, inserted, updated, animated))
}

/// The two halves of a cold population, see [`initial_batches`].
#[derive(Debug)]
pub struct InitialBatches<R> {
    /// Inserts the first `first_len` rows.
    pub first: Transition<R>,
    /// Inserts the remaining rows, when there are any.
    pub rest: Option<Transition<R>>,
    pub first_len: usize,
}

/// Rows for the first `first_batch` entries of a cold population.
///
/// Returns the prefix snapshot the view shows once the transition is applied.
pub fn leading_batch<E, F>(
    new: &Snapshot<E>,
    rows: &F,
    first_batch: usize,
) -> (Snapshot<E>, Transition<F::Row>)
where
    E: Entry,
    F: RowFactory<E>,
{
    let prefix = new.prefix(first_batch.max(1));
    let transition = Transition::new(
        Vec::new(),
        prefix
            .iter()
            .enumerate()
            .map(|(index, entry)| (index, rows.make_row(entry)))
            .collect(),
        Vec::new(),
        false,
    );
    (prefix, transition)
}

/// Split the population of an empty list into a small leading transition and
/// the remainder, so the visible rows can be committed before the rest are built.
///
/// Applying `first` then `rest` to an empty list is equivalent to applying
/// `reconcile(&Snapshot::empty(), new, rows)`.
pub fn initial_batches<E, F>(new: &Snapshot<E>, rows: &F, first_batch: usize) -> InitialBatches<F::Row>
where
    E: Entry,
    F: RowFactory<E>,
{
    let (prefix, first) = leading_batch(new, rows, first_batch);
    let first_len = prefix.len();
    let rest = (first_len < new.len()).then(|| {
        Transition::new(
            Vec::new(),
            new[first_len..]
                .iter()
                .enumerate()
                .map(|(offset, entry)| (first_len + offset, rows.make_row(entry)))
                .collect(),
            Vec::new(),
            false,
        )
    });

    InitialBatches {
        first,
        rest,
        first_len,
    }
}

/// Mask of positions forming one longest strictly increasing subsequence.
fn longest_increasing_run(values: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut parent: Vec<Option<usize>> = vec![None; values.len()];

    for (pos, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&tail| values[tail] < value);
        if slot > 0 {
            parent[pos] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(pos);
        } else {
            tails[slot] = pos;
        }
    }

    let mut keep = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(pos) = cursor {
        keep[pos] = true;
        cursor = parent[pos];
    }
    keep
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use super::*;
    use crate::entry::EqRows;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        id: char,
        rank: u32,
        payload: &'static str,
    }

    impl Entry for Item {
        type Id = char;
        type Key = u32;

        fn stable_id(&self) -> char {
            self.id
        }

        fn sort_key(&self) -> u32 {
            self.rank
        }
    }

    fn item(id: char, rank: u32) -> Item {
        Item {
            id,
            rank,
            payload: "p",
        }
    }

    fn rows() -> EqRows<impl Fn(&Item) -> String> {
        EqRows::new(|item: &Item| format!("{}:{}", item.id, item.payload))
    }

    fn snapshot(items: Vec<Item>) -> Snapshot<Item> {
        Snapshot::new(items)
    }

    #[test]
    fn unchanged_snapshot_yields_empty_transition() {
        let old = snapshot(vec![item('A', 1), item('B', 2)]);
        let new = snapshot(vec![item('A', 1), item('B', 2)]);
        let transition = reconcile(&old, &new, &rows());
        assert!(transition.is_empty());
    }

    #[test]
    fn replaced_tail_is_removed_and_inserted() {
        let old = snapshot(vec![item('A', 1), item('B', 2)]);
        let new = snapshot(vec![item('A', 1), item('C', 3)]);
        let transition = reconcile(&old, &new, &rows());
        assert_eq!(transition.removed, vec![1]);
        assert_eq!(transition.inserted, vec![(1, "C:p".to_owned())]);
        assert!(transition.updated.is_empty());
    }

    #[test]
    fn insertion_before_existing_entry_does_not_touch_it() {
        let old = snapshot(vec![item('A', 1)]);
        let new = snapshot(vec![item('Z', 0), item('A', 1)]);
        let transition = reconcile(&old, &new, &rows());
        assert_eq!(transition.inserted, vec![(0, "Z:p".to_owned())]);
        assert!(transition.removed.is_empty());
        assert!(transition.updated.is_empty());
    }

    #[test]
    fn payload_change_is_an_update_at_new_index() {
        let old = snapshot(vec![Item {
            id: 'A',
            rank: 1,
            payload: "p1",
        }]);
        let new = snapshot(vec![Item {
            id: 'A',
            rank: 1,
            payload: "p2",
        }]);
        let transition = reconcile(&old, &new, &rows());
        assert_eq!(transition.updated, vec![(0, "A:p2".to_owned())]);
        assert!(transition.removed.is_empty());
        assert!(transition.inserted.is_empty());
    }

    #[test]
    fn removals_are_emitted_descending() {
        let old = snapshot(vec![item('A', 1), item('B', 2), item('C', 3)]);
        let new = snapshot(vec![item('C', 3)]);
        let transition = reconcile(&old, &new, &rows());
        assert_eq!(transition.removed, vec![1, 0]);
        assert!(transition.inserted.is_empty());
    }

    #[test]
    fn index_shift_alone_is_not_an_update() {
        let old = snapshot(vec![item('A', 1), item('B', 2), item('C', 3)]);
        let new = snapshot(vec![item('B', 2), item('C', 3)]);
        let transition = reconcile(&old, &new, &rows());
        assert_eq!(transition.removed, vec![0]);
        assert!(transition.updated.is_empty());
        assert!(transition.inserted.is_empty());
    }

    #[test]
    fn reordered_entry_becomes_remove_and_insert() {
        let old = snapshot(vec![item('A', 1), item('B', 2), item('C', 3), item('D', 4)]);
        // A's sort key moved it to the end.
        let new = snapshot(vec![item('B', 2), item('C', 3), item('D', 4), item('A', 5)]);
        let transition = reconcile(&old, &new, &rows());
        assert_eq!(transition.removed, vec![0]);
        assert_eq!(transition.inserted, vec![(3, "A:p".to_owned())]);
        assert!(transition.updated.is_empty());

        let mut view: Vec<String> = old.iter().map(|it| rows().make_row(it)).collect();
        transition.apply_to(&mut view);
        assert_eq!(view, vec!["B:p", "C:p", "D:p", "A:p"]);
    }

    #[test]
    fn cold_start_update_only_pass_is_not_animated() {
        let old = snapshot(vec![item('A', 1)]);
        let new = snapshot(vec![Item {
            id: 'A',
            rank: 1,
            payload: "q",
        }]);
        let cold = reconcile_with(&old, &new, &rows(), ReconcileOptions::default().cold_start(true))
            .expect("pass is never cancelled");
        assert!(!cold.animated);

        let warm = reconcile(&old, &new, &rows());
        assert!(warm.animated);

        let grow = reconcile_with(
            &Snapshot::empty(),
            &new,
            &rows(),
            ReconcileOptions::default().cold_start(true),
        )
        .expect("pass is never cancelled");
        assert!(grow.animated);
    }

    #[test]
    fn cancelled_pass_produces_nothing() {
        let built = AtomicUsize::new(0);
        let counting = EqRows::new(|item: &Item| {
            built.fetch_add(1, Ordering::SeqCst);
            item.id
        });
        let new = snapshot(vec![item('A', 1), item('B', 2), item('C', 3)]);
        let cancel_after_first = || built.load(Ordering::SeqCst) >= 1;
        let result = reconcile_with(
            &Snapshot::empty(),
            &new,
            &counting,
            ReconcileOptions::default().cancelled_by(&cancel_after_first),
        );
        assert!(result.is_none());
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn initial_batches_compose_to_full_population() {
        let new = snapshot((0..5).map(|n| item((b'a' + n as u8) as char, n)).collect());
        let batches = initial_batches(&new, &rows(), 2);
        assert_eq!(batches.first_len, 2);
        assert_eq!(batches.first.inserted.len(), 2);

        let mut view = Vec::new();
        batches.first.apply_to(&mut view);
        batches
            .rest
            .expect("three rows remain")
            .apply_to(&mut view);

        let mut expected = Vec::new();
        reconcile(&Snapshot::empty(), &new, &rows()).apply_to(&mut expected);
        assert_eq!(view, expected);
    }

    #[test]
    fn leading_batch_reports_prefix() {
        let new = snapshot(vec![item('a', 1), item('b', 2), item('c', 3)]);
        let (prefix, transition) = leading_batch(&new, &rows(), 0);
        assert_eq!(prefix.ids(), vec!['a']);
        assert_eq!(transition.inserted, vec![(0, "a:p".to_owned())]);
        assert!(!transition.animated);
    }

    #[test]
    fn initial_batches_without_remainder() {
        let new = snapshot(vec![item('a', 1)]);
        let batches = initial_batches(&new, &rows(), 10);
        assert_eq!(batches.first_len, 1);
        assert!(batches.rest.is_none());
    }

    #[test]
    fn longest_run_prefers_fewest_moves() {
        assert_eq!(longest_increasing_run(&[3, 0, 1, 2]), vec![false, true, true, true]);
        assert_eq!(longest_increasing_run(&[]), Vec::<bool>::new());
        let mask = longest_increasing_run(&[2, 0, 3, 1, 4]);
        assert_eq!(mask.iter().filter(|kept| **kept).count(), 3);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn release_builds_shadow_duplicate_ids() {
        let old = snapshot(vec![item('A', 1), item('A', 2)]);
        let new = snapshot(vec![item('A', 2)]);
        let transition = reconcile(&old, &new, &rows());
        assert_eq!(transition.removed, vec![0]);
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Loose {
        id: u8,
        payload: u8,
    }

    impl Entry for Loose {
        type Id = u8;
        // Unit key: any order is a valid snapshot order.
        type Key = ();

        fn stable_id(&self) -> u8 {
            self.id
        }

        fn sort_key(&self) {}
    }

    fn loose_snapshot() -> impl Strategy<Value = Snapshot<Loose>> {
        prop::collection::vec((0u8..24, 0u8..3), 0..18).prop_map(|pairs| {
            let mut seen = std::collections::HashSet::new();
            Snapshot::new(
                pairs
                    .into_iter()
                    .filter(|(id, _)| seen.insert(*id))
                    .map(|(id, payload)| Loose { id, payload })
                    .collect(),
            )
        })
    }

    proptest! {
        #[test]
        fn applying_transition_reproduces_new(old in loose_snapshot(), new in loose_snapshot()) {
            let rows = EqRows::new(|entry: &Loose| entry.clone());
            let transition = reconcile(&old, &new, &rows);
            let mut view: Vec<Loose> = old.to_vec();

            for &index in &transition.removed {
                prop_assert!(index < view.len());
                view.remove(index);
            }
            for (index, row) in &transition.inserted {
                prop_assert!(*index <= view.len());
                view.insert(*index, row.clone());
            }
            for (index, row) in &transition.updated {
                prop_assert!(*index < view.len());
                view[*index] = row.clone();
            }
            prop_assert_eq!(&view[..], new.as_slice());
        }

        #[test]
        fn same_snapshot_is_a_no_op(snapshot in loose_snapshot()) {
            let rows = EqRows::new(|entry: &Loose| entry.id);
            prop_assert!(reconcile(&snapshot, &snapshot.clone(), &rows).is_empty());
        }

        #[test]
        fn equal_payloads_never_update(old in loose_snapshot(), new in loose_snapshot()) {
            let rows = EqRows::new(|entry: &Loose| entry.id);
            let transition = reconcile(&old, &new, &rows);
            for (index, id) in &transition.updated {
                let fresh = &new[*index];
                prop_assert_eq!(fresh.id, *id);
                let stale = old.iter().find(|entry| entry.id == *id);
                prop_assert!(stale.is_some_and(|stale| stale != fresh));
            }
        }
    }
}
