//! Domain notification streams feeding the recomputation pipeline.
//!
//! A source yields full domain states, never deltas. The pipeline only cares
//! about the newest state, so sources are free to skip intermediate values.

use std::future::Future;

use tokio::sync::{mpsc, watch};

use crate::error::SourceError;

/// Asynchronous stream of "current state" values.
pub trait DomainSource: Send + 'static {
    type State: Send + 'static;

    /// Wait for the next state.
    ///
    /// `None` means the stream ended normally; `Some(Err(_))` is terminal.
    fn next_state(
        &mut self,
    ) -> impl Future<Output = Option<Result<Self::State, SourceError>>> + Send;
}

/// Latest-value source backed by a `watch` channel.
///
/// The first call yields the value current at subscription time.
pub struct WatchSource<T> {
    rx: watch::Receiver<T>,
    primed: bool,
}

impl<T> WatchSource<T> {
    pub fn new(rx: watch::Receiver<T>) -> Self {
        Self { rx, primed: false }
    }
}

impl<T> DomainSource for WatchSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    type State = T;

    fn next_state(&mut self) -> impl Future<Output = Option<Result<T, SourceError>>> + Send {
        async move {
            if !self.primed {
                self.primed = true;
                return Some(Ok(self.rx.borrow_and_update().clone()));
            }
            self.rx.changed().await.ok()?;
            Some(Ok(self.rx.borrow_and_update().clone()))
        }
    }
}

/// Event-log source that collapses queued states down to the newest one.
///
/// A queued error stops the drain and is reported immediately.
pub struct QueueSource<T> {
    rx: mpsc::Receiver<Result<T, SourceError>>,
}

impl<T> QueueSource<T> {
    pub fn new(rx: mpsc::Receiver<Result<T, SourceError>>) -> Self {
        Self { rx }
    }
}

impl<T> DomainSource for QueueSource<T>
where
    T: Send + 'static,
{
    type State = T;

    fn next_state(&mut self) -> impl Future<Output = Option<Result<T, SourceError>>> + Send {
        async move {
            let mut latest = self.rx.recv().await?;
            while latest.is_ok() {
                match self.rx.try_recv() {
                    Ok(next) => latest = next,
                    Err(_) => break,
                }
            }
            Some(latest)
        }
    }
}
