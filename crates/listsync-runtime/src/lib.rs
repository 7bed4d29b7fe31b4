//! Asynchronous plumbing around the reconciliation core.
//!
//! This crate wires a domain notification stream to a background producer
//! task, hands finished transitions to the UI thread through a single-slot
//! latest-value channel, and applies them to a list view on that thread.

/// UI-thread commit stage and list view seam.
pub mod commit;
/// Stable runtime error types.
pub mod error;
/// Background recomputation pipeline.
pub mod pipeline;
/// Single-slot latest-wins transition channel.
pub mod slot;
/// Domain notification sources.
pub mod source;

pub use commit::{CommitOutcome, CommitStage, ListView, ListenerId, VecListView};
pub use error::{CommitError, EditKind, SlotError, SourceError};
pub use pipeline::{ListPipeline, PipelineConfig, PipelineStatus};
pub use slot::{Publish, SlotStats, TransitionReceiver, TransitionSender, transition_slot};
pub use source::{DomainSource, QueueSource, WatchSource};
