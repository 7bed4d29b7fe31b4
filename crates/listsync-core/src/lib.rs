//! Pure list reconciliation core.
//!
//! This crate defines the entry model, ordered snapshots, the atomic snapshot
//! store a screen diffs against, the identity-keyed diff engine, and the
//! transition value it produces. Nothing here blocks or performs I/O.

/// Identity-keyed diff engine.
pub mod diff;
/// Entry model and row factory seam.
pub mod entry;
/// Ordered, uniquely keyed entry sequences.
pub mod snapshot;
/// Mutex-guarded snapshot holder with swap semantics.
pub mod store;
/// Edit-script value type.
pub mod transition;

pub use diff::{
    InitialBatches, ReconcileOptions, initial_batches, leading_batch, reconcile, reconcile_with,
};
pub use entry::{Entry, EqRows, FnRows, RowFactory, Styled};
pub use snapshot::Snapshot;
pub use store::AtomicSnapshot;
pub use transition::{Transition, TransitionId, TransitionSummary};
