//! UI-thread side: applies transitions to a virtualized list view.

use listsync_core::{Transition, TransitionId, TransitionSummary};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::{
    error::{CommitError, EditKind},
    slot::TransitionReceiver,
};

/// Index-addressed list primitives exposed by the rendering layer.
pub trait ListView {
    type Row;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, index: usize, row: Self::Row);

    fn remove(&mut self, index: usize) -> Self::Row;

    /// Replace the row at `index`, returning the previous one.
    fn replace(&mut self, index: usize, row: Self::Row) -> Self::Row;

    /// Called before the first edit of a transition.
    fn begin_updates(&mut self) {}

    /// Incremental-update hook, called once every edit of a transition is applied.
    fn end_updates(&mut self, _animated: bool) {}
}

/// Plain vector-backed list view.
#[derive(Debug, Clone)]
pub struct VecListView<R> {
    rows: Vec<R>,
    update_batches: u64,
    last_animated: Option<bool>,
}

impl<R> Default for VecListView<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> VecListView<R> {
    pub fn new() -> Self {
        Self::from_rows(Vec::new())
    }

    pub fn from_rows(rows: Vec<R>) -> Self {
        Self {
            rows,
            update_batches: 0,
            last_animated: None,
        }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }

    /// Number of completed `begin_updates`/`end_updates` pairs.
    pub fn update_batches(&self) -> u64 {
        self.update_batches
    }

    /// `animated` flag of the most recent update batch.
    pub fn last_animated(&self) -> Option<bool> {
        self.last_animated
    }
}

impl<R> ListView for VecListView<R> {
    type Row = R;

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn insert(&mut self, index: usize, row: R) {
        self.rows.insert(index, row);
    }

    fn remove(&mut self, index: usize) -> R {
        self.rows.remove(index)
    }

    fn replace(&mut self, index: usize, row: R) -> R {
        std::mem::replace(&mut self.rows[index], row)
    }

    fn end_updates(&mut self, animated: bool) {
        self.update_batches += 1;
        self.last_animated = Some(animated);
    }
}

/// Result of offering a transition to the commit stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitOutcome {
    Applied(TransitionSummary),
    /// Already applied, or older than the last applied transition.
    Skipped(TransitionId),
}

/// Handle returned by [`CommitStage::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&TransitionSummary) + Send>;

/// Single consumer that owns the list view and applies transitions whole.
pub struct CommitStage<V: ListView> {
    view: V,
    last_applied: Option<TransitionId>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl<V: ListView> CommitStage<V> {
    pub fn new(view: V) -> Self {
        Self {
            view,
            last_applied: None,
            listeners: Vec::new(),
            next_listener: 1,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    pub fn last_applied(&self) -> Option<TransitionId> {
        self.last_applied
    }

    /// Register a callback invoked after every applied transition.
    pub fn add_listener(
        &mut self,
        listener: impl FnMut(&TransitionSummary) + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a callback. Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Apply one transition to the owned view.
    ///
    /// Indices are taken as given. They are checked against the view length
    /// up front, so a refused transition leaves the view untouched.
    pub fn apply(&mut self, transition: Transition<V::Row>) -> Result<CommitOutcome, CommitError> {
        let id = transition.id();
        if self.last_applied.is_some_and(|last| id <= last) {
            trace!(%id, "skipping already applied transition");
            return Ok(CommitOutcome::Skipped(id));
        }

        validate(&transition, self.view.len())?;
        let summary = transition.summary();

        self.view.begin_updates();
        for index in transition.removed {
            self.view.remove(index);
        }
        for (index, row) in transition.inserted {
            self.view.insert(index, row);
        }
        for (index, row) in transition.updated {
            self.view.replace(index, row);
        }
        self.view.end_updates(transition.animated);
        self.last_applied = Some(id);

        debug!(
            %id,
            removed = summary.removed,
            inserted = summary.inserted,
            updated = summary.updated,
            rows = self.view.len(),
            "transition committed"
        );
        for (_, listener) in &mut self.listeners {
            listener(&summary);
        }
        Ok(CommitOutcome::Applied(summary))
    }

    /// Apply transitions on the calling thread until the slot closes.
    pub fn run_blocking<E>(&mut self, receiver: &TransitionReceiver<E, V::Row>) -> Result<(), CommitError> {
        while let Some(transition) = receiver.blocking_recv() {
            if let Err(err) = self.apply(transition) {
                error!(error = %err, "refusing transition; list view is out of sync");
                return Err(err);
            }
        }
        debug!("commit loop exiting: transition slot closed");
        Ok(())
    }

    /// Async variant of [`Self::run_blocking`] for single-threaded executors.
    pub async fn run<E>(&mut self, receiver: &TransitionReceiver<E, V::Row>) -> Result<(), CommitError> {
        while let Some(transition) = receiver.recv().await {
            if let Err(err) = self.apply(transition) {
                error!(error = %err, "refusing transition; list view is out of sync");
                return Err(err);
            }
        }
        debug!("commit loop exiting: transition slot closed");
        Ok(())
    }
}

fn validate<R>(transition: &Transition<R>, len: usize) -> Result<(), CommitError> {
    if !transition.removed.windows(2).all(|pair| pair[0] > pair[1]) {
        return Err(CommitError::Unordered {
            kind: EditKind::Remove,
        });
    }
    if !transition
        .inserted
        .windows(2)
        .all(|pair| pair[0].0 < pair[1].0)
    {
        return Err(CommitError::Unordered {
            kind: EditKind::Insert,
        });
    }

    let mut len = len;
    for &index in &transition.removed {
        if index >= len {
            return Err(CommitError::IndexOutOfRange {
                kind: EditKind::Remove,
                index,
                len,
            });
        }
        len -= 1;
    }
    for &(index, _) in &transition.inserted {
        if index > len {
            return Err(CommitError::IndexOutOfRange {
                kind: EditKind::Insert,
                index,
                len,
            });
        }
        len += 1;
    }
    for &(index, _) in &transition.updated {
        if index >= len {
            return Err(CommitError::IndexOutOfRange {
                kind: EditKind::Update,
                index,
                len,
            });
        }
    }
    Ok(())
}
