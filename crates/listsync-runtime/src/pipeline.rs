//! Recomputation pipeline: domain state -> snapshot swap -> reconcile -> slot.
//!
//! One producer task runs per screen. It is the only writer of the screen's
//! [`AtomicSnapshot`], so every diff is taken against the snapshot the view
//! will actually show once all earlier transitions are committed.

use std::sync::Arc;

use listsync_core::{
    AtomicSnapshot, Entry, ReconcileOptions, RowFactory, Snapshot, Transition, leading_batch,
    reconcile_with,
};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    error::{SlotError, SourceError},
    slot::{Publish, TransitionReceiver, TransitionSender, transition_slot},
    source::DomainSource,
};

/// Tuning for one pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// When set, a cold population first commits only this many rows.
    pub first_batch_rows: Option<usize>,
    /// When `false`, every transition is delivered with `animated = false`.
    pub animate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            first_batch_rows: None,
            animate: true,
        }
    }
}

/// Lifecycle of the producer task, observable from the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Task spawned, no domain state seen yet.
    Starting,
    /// Last processed domain state, counted from 1.
    Running { generation: u64 },
    /// The domain source failed; the list was cleared to its empty state.
    Failed(SourceError),
    /// The domain source ended normally; the list keeps its last state.
    Finished,
    /// The screen was torn down.
    Cancelled,
}

/// Handle owning a screen's producer task and snapshot store.
///
/// Dropping the handle tears the pipeline down.
pub struct ListPipeline<E: Entry, R> {
    store: Arc<AtomicSnapshot<E>>,
    sender: TransitionSender<E, R>,
    cancel: CancellationToken,
    status: watch::Receiver<PipelineStatus>,
    task: JoinHandle<()>,
}

impl<E, R> ListPipeline<E, R>
where
    E: Entry,
    R: Send + 'static,
{
    /// Spawn the producer task on `runtime` and return the consumer half.
    pub fn spawn<S, B, F>(
        config: PipelineConfig,
        source: S,
        build: B,
        rows: F,
        runtime: &tokio::runtime::Handle,
    ) -> (Self, TransitionReceiver<E, R>)
    where
        S: DomainSource,
        B: Fn(&S::State) -> Snapshot<E> + Send + 'static,
        F: RowFactory<E, Row = R> + Send + 'static,
    {
        info!(
            first_batch_rows = config.first_batch_rows,
            animate = config.animate,
            "spawning list pipeline"
        );

        let store = Arc::new(AtomicSnapshot::default());
        let (sender, receiver) = transition_slot();
        let cancel = CancellationToken::new();
        let (status_tx, status) = watch::channel(PipelineStatus::Starting);

        let worker = Worker {
            config,
            store: Arc::clone(&store),
            sender: sender.clone(),
            cancel: cancel.clone(),
            status: status_tx,
            build,
            rows,
            generation: 0,
        };
        let task = runtime.spawn(worker.run(source));

        (
            Self {
                store,
                sender,
                cancel,
                status,
                task,
            },
            receiver,
        )
    }

    /// Last snapshot handed to the diff engine.
    pub fn snapshot(&self) -> Snapshot<E> {
        self.store.read()
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn status_receiver(&self) -> watch::Receiver<PipelineStatus> {
        self.status.clone()
    }

    /// Whether a transition is still waiting for the commit stage.
    pub fn has_pending(&self) -> bool {
        self.sender.has_pending()
    }

    /// Slot traffic counters.
    pub fn slot_stats(&self) -> crate::slot::SlotStats {
        self.sender.stats()
    }

    /// Stop recomputing, discard undelivered transitions, and clear the store.
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        debug!("shutting down list pipeline");
        self.cancel.cancel();
        self.sender.close();
        self.store.reset();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<E: Entry, R> Drop for ListPipeline<E, R> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.sender.close();
        self.store.reset();
        self.task.abort();
    }
}

struct Worker<E: Entry, R, B, F> {
    config: PipelineConfig,
    store: Arc<AtomicSnapshot<E>>,
    sender: TransitionSender<E, R>,
    cancel: CancellationToken,
    status: watch::Sender<PipelineStatus>,
    build: B,
    rows: F,
    generation: u64,
}

impl<E, R, B, F> Worker<E, R, B, F>
where
    E: Entry,
    F: RowFactory<E, Row = R>,
{
    async fn run<S>(mut self, mut source: S)
    where
        S: DomainSource,
        B: Fn(&S::State) -> Snapshot<E>,
    {
        debug!("list pipeline worker started");
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.status.send_replace(PipelineStatus::Cancelled);
                    break;
                }
                next = source.next_state() => next,
            };

            match next {
                Some(Ok(state)) => {
                    self.generation += 1;
                    let candidate = (self.build)(&state);
                    trace!(
                        generation = self.generation,
                        entries = candidate.len(),
                        "domain state received"
                    );
                    if self.recompute(candidate).is_err() {
                        debug!("transition slot closed; stopping worker");
                        self.store.reset();
                        self.status.send_replace(PipelineStatus::Cancelled);
                        break;
                    }
                    self.status.send_if_modified(|status| {
                        if matches!(status, PipelineStatus::Cancelled) {
                            return false;
                        }
                        *status = PipelineStatus::Running {
                            generation: self.generation,
                        };
                        true
                    });
                }
                Some(Err(err)) => {
                    warn!(error = %err, "domain source failed; clearing list");
                    let previous = self.store.swap(Snapshot::empty());
                    let cold = self.generation == 0;
                    if self
                        .deliver(previous, Snapshot::empty(), None, cold, self.config.animate)
                        .is_err()
                    {
                        debug!("transition slot closed before empty state was delivered");
                    }
                    self.status.send_replace(PipelineStatus::Failed(err));
                    break;
                }
                None => {
                    info!(generation = self.generation, "domain source finished");
                    self.status.send_replace(PipelineStatus::Finished);
                    break;
                }
            }
        }
        debug!("list pipeline worker exiting");
    }

    fn recompute(&mut self, candidate: Snapshot<E>) -> Result<(), SlotError> {
        if self.cancel.is_cancelled() {
            return Err(SlotError::Closed);
        }

        let previous = self.store.swap(candidate.clone());
        let cold = self.generation == 1;

        if let Some(first_batch) = self.config.first_batch_rows
            && previous.is_empty()
            && candidate.len() > first_batch.max(1)
            && !self.sender.has_pending()
        {
            let (prefix, first) = leading_batch(&candidate, &self.rows, first_batch);
            debug!(
                first = prefix.len(),
                total = candidate.len(),
                "populating list in two batches"
            );
            self.deliver(previous, prefix.clone(), Some(first), cold, false)?;
            return self.deliver(prefix, candidate, None, cold, false);
        }

        self.deliver(previous, candidate, None, cold, self.config.animate)
    }

    /// Publish a transition ending at `target`.
    ///
    /// `idle_base` is what the view shows when nothing is pending. A `ready`
    /// transition is only used if it was computed from that base.
    fn deliver(
        &self,
        idle_base: Snapshot<E>,
        target: Snapshot<E>,
        mut ready: Option<Transition<R>>,
        cold: bool,
        animate: bool,
    ) -> Result<(), SlotError> {
        let cancel = &self.cancel;
        let cancelled = || cancel.is_cancelled();
        loop {
            let (expected, base) = match self.sender.pending_base() {
                Some((seq, base)) => {
                    ready = None;
                    (Some(seq), base)
                }
                None => (None, idle_base.clone()),
            };

            let transition = match ready.take() {
                Some(transition) => transition,
                None => {
                    let options = ReconcileOptions::default()
                        .cold_start(cold)
                        .cancelled_by(&cancelled);
                    match reconcile_with(&base, &target, &self.rows, options) {
                        Some(transition) => transition,
                        None => return Err(SlotError::Closed),
                    }
                }
            };
            let mut transition = transition;
            if !animate {
                transition.animated = false;
            }

            let summary = transition.summary();
            match self.sender.publish(expected, base, transition)? {
                Publish::Conflict => {
                    trace!("pending transition was taken mid-computation; recomputing");
                    continue;
                }
                outcome => {
                    debug!(
                        id = %summary.id,
                        removed = summary.removed,
                        inserted = summary.inserted,
                        updated = summary.updated,
                        animated = summary.animated,
                        ?outcome,
                        "transition ready"
                    );
                    return Ok(());
                }
            }
        }
    }
}
