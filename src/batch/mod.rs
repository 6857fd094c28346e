//! Batched mutation of work items.
//!
//! - `mutator`: the [`BatchMutator`] that partitions, paces and checkpoints a run.
//! - `mutation`: the per-item [`Mutation`] seam and its ledger-backed implementation.
//! - `types`: work items and the batch outcome.

/// Per-item mutation trait and ledger implementation
pub mod mutation;
/// Batch driver
pub mod mutator;
/// Work items and outcomes
mod types;

pub use mutation::{Mutation, SubmitMutation};
pub use mutator::BatchMutator;
pub use types::*;
