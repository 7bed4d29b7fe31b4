//! Single-slot, latest-wins transition channel.
//!
//! At most one transition waits for the consumer. Each pending item remembers
//! the snapshot it was computed from, so a producer that supersedes it can
//! reconcile from that base and keep the view consistent.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use listsync_core::{Snapshot, Transition};
use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tracing::trace;

use crate::error::SlotError;

struct Pending<E, R> {
    seq: u64,
    base: Snapshot<E>,
    transition: Transition<R>,
}

struct SlotState<E, R> {
    pending: Option<Pending<E, R>>,
    next_seq: u64,
    closed: bool,
    stats: SlotStats,
}

/// Counters describing slot traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    /// Transitions handed to the consumer.
    pub delivered: u64,
    /// Pending transitions replaced before the consumer took them.
    pub superseded: u64,
}

struct Shared<E, R> {
    state: Mutex<SlotState<E, R>>,
    ready: Condvar,
    notify: Notify,
}

/// Outcome of [`TransitionSender::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The slot was empty; the transition now waits for the consumer.
    Queued,
    /// A stale pending transition was abandoned in favour of this one.
    Replaced,
    /// The pending item changed since the base was read; recompute and retry.
    Conflict,
}

/// Producer half.
pub struct TransitionSender<E, R> {
    shared: Arc<Shared<E, R>>,
}

/// Consumer half, owned by the commit thread.
pub struct TransitionReceiver<E, R> {
    shared: Arc<Shared<E, R>>,
}

impl<E, R> Clone for TransitionSender<E, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Create a connected sender/receiver pair.
pub fn transition_slot<E, R>() -> (TransitionSender<E, R>, TransitionReceiver<E, R>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(SlotState {
            pending: None,
            next_seq: 1,
            closed: false,
            stats: SlotStats::default(),
        }),
        ready: Condvar::new(),
        notify: Notify::new(),
    });
    (
        TransitionSender {
            shared: Arc::clone(&shared),
        },
        TransitionReceiver { shared },
    )
}

impl<E, R> TransitionSender<E, R> {
    /// Sequence number and base snapshot of the transition still waiting, if any.
    pub fn pending_base(&self) -> Option<(u64, Snapshot<E>)> {
        self.shared
            .state
            .lock()
            .pending
            .as_ref()
            .map(|pending| (pending.seq, pending.base.clone()))
    }

    pub fn has_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// Offer a transition computed from `base`.
    ///
    /// `expected` must be the sequence number returned by [`Self::pending_base`]
    /// when `base` was chosen (`None` if nothing was pending). If the pending
    /// item changed in the meantime the slot is left as is and
    /// [`Publish::Conflict`] is returned.
    pub fn publish(
        &self,
        expected: Option<u64>,
        base: Snapshot<E>,
        transition: Transition<R>,
    ) -> Result<Publish, SlotError> {
        let outcome = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(SlotError::Closed);
            }
            let current = state.pending.as_ref().map(|pending| pending.seq);
            if current != expected {
                return Ok(Publish::Conflict);
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            let replaced = state
                .pending
                .replace(Pending {
                    seq,
                    base,
                    transition,
                })
                .is_some();
            if replaced {
                state.stats.superseded += 1;
                Publish::Replaced
            } else {
                Publish::Queued
            }
        };

        trace!(?outcome, "transition published");
        self.shared.ready.notify_one();
        self.shared.notify.notify_one();
        Ok(outcome)
    }

    /// Close the slot, dropping anything pending. Later publishes fail.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.pending = None;
        }
        self.shared.ready.notify_all();
        self.shared.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn stats(&self) -> SlotStats {
        self.shared.state.lock().stats
    }
}

impl<E, R> TransitionReceiver<E, R> {
    /// Take the pending transition without waiting.
    pub fn try_recv(&self) -> Option<Transition<R>> {
        take(&mut self.shared.state.lock())
    }

    /// Wait for the next transition; `None` once the slot is closed.
    pub async fn recv(&self) -> Option<Transition<R>> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.state.lock();
                if let Some(transition) = take(&mut state) {
                    return Some(transition);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Block the calling thread until the next transition arrives.
    pub fn blocking_recv(&self) -> Option<Transition<R>> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(transition) = take(&mut state) {
                return Some(transition);
            }
            if state.closed {
                return None;
            }
            self.shared.ready.wait(&mut state);
        }
    }

    /// [`Self::blocking_recv`] bounded by `timeout`.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing pending.
    pub fn blocking_recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<Transition<R>>, SlotError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(transition) = take(&mut state) {
                return Ok(Some(transition));
            }
            if state.closed {
                return Err(SlotError::Closed);
            }
            // Spurious wakeups loop back until the deadline passes.
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                if let Some(transition) = take(&mut state) {
                    return Ok(Some(transition));
                }
                if state.closed {
                    return Err(SlotError::Closed);
                }
                return Ok(None);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

fn take<E, R>(state: &mut SlotState<E, R>) -> Option<Transition<R>> {
    let pending = state.pending.take()?;
    state.stats.delivered += 1;
    Some(pending.transition)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use listsync_core::Entry;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Id(u8);

    impl Entry for Id {
        type Id = u8;
        type Key = u8;

        fn stable_id(&self) -> u8 {
            self.0
        }

        fn sort_key(&self) -> u8 {
            self.0
        }
    }

    fn insert_one(row: &'static str) -> Transition<&'static str> {
        Transition::new(Vec::new(), vec![(0, row)], Vec::new(), true)
    }

    #[test]
    fn newer_transition_replaces_pending_one() {
        let (tx, rx) = transition_slot::<Id, &'static str>();
        assert_eq!(
            tx.publish(None, Snapshot::empty(), insert_one("a")),
            Ok(Publish::Queued)
        );

        let (seq, base) = tx.pending_base().expect("first transition is pending");
        assert!(base.is_empty());
        assert_eq!(
            tx.publish(Some(seq), base, insert_one("b")),
            Ok(Publish::Replaced)
        );

        let delivered = rx.try_recv().expect("latest transition is delivered");
        assert_eq!(delivered.inserted, vec![(0, "b")]);
        assert!(rx.try_recv().is_none());
        assert_eq!(
            tx.stats(),
            SlotStats {
                delivered: 1,
                superseded: 1
            }
        );
    }

    #[test]
    fn publish_conflicts_when_pending_was_taken() {
        let (tx, rx) = transition_slot::<Id, &'static str>();
        tx.publish(None, Snapshot::empty(), insert_one("a"))
            .expect("slot is open");
        let (seq, base) = tx.pending_base().expect("pending");

        assert!(rx.try_recv().is_some());
        assert_eq!(
            tx.publish(Some(seq), base, insert_one("b")),
            Ok(Publish::Conflict)
        );
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn close_discards_pending_and_rejects_publishes() {
        let (tx, rx) = transition_slot::<Id, &'static str>();
        tx.publish(None, Snapshot::empty(), insert_one("a"))
            .expect("slot is open");
        tx.close();

        assert!(rx.try_recv().is_none());
        assert!(rx.blocking_recv().is_none());
        assert_eq!(
            tx.publish(None, Snapshot::empty(), insert_one("b")),
            Err(SlotError::Closed)
        );
    }

    #[test]
    fn blocking_receiver_wakes_on_publish() {
        let (tx, rx) = transition_slot::<Id, &'static str>();
        let consumer = thread::spawn(move || rx.blocking_recv().map(|t| t.inserted));

        tx.publish(None, Snapshot::empty(), insert_one("a"))
            .expect("slot is open");
        let received = consumer.join().expect("consumer thread should not panic");
        assert_eq!(received, Some(vec![(0, "a")]));
    }

    #[test]
    fn timeout_reports_idle_slot() {
        let (_tx, rx) = transition_slot::<Id, &'static str>();
        let result = rx
            .blocking_recv_timeout(Duration::from_millis(5))
            .expect("slot is open");
        assert!(result.is_none());
    }

    #[test]
    fn timeout_waits_out_the_full_duration() {
        let (_tx, rx) = transition_slot::<Id, &'static str>();
        let started = Instant::now();
        let result = rx
            .blocking_recv_timeout(Duration::from_millis(30))
            .expect("slot is open");
        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn timeout_receive_picks_up_late_publish() {
        let (tx, rx) = transition_slot::<Id, &'static str>();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.publish(None, Snapshot::empty(), insert_one("late"))
                .expect("slot is open");
            tx
        });

        let received = rx
            .blocking_recv_timeout(Duration::from_secs(5))
            .expect("slot is open")
            .expect("publish lands before the deadline");
        assert_eq!(received.inserted, vec![(0, "late")]);

        let tx = producer.join().expect("producer thread should not panic");
        tx.close();
        assert!(matches!(
            rx.blocking_recv_timeout(Duration::from_millis(5)),
            Err(SlotError::Closed)
        ));
    }

    #[tokio::test]
    async fn async_receiver_ends_after_close() {
        let (tx, rx) = transition_slot::<Id, &'static str>();
        let waiter = tokio::spawn(async move { rx.recv().await.is_none() });
        tokio::task::yield_now().await;
        tx.close();
        assert!(waiter.await.expect("waiter task should not panic"));
    }
}
