//! Checkpoint persistence.
//!
//! - `store`: the [`CheckpointStore`] service used by runs to skip and record work.
//! - `repositories`: the [`CheckpointRepository`] trait and its file implementation.
//! - `types`: records, statuses, resume policy and errors.
//!
//! The persisted format is one JSON object per line with `key`, `status`
//! (`succeeded` | `failed` | `skipped`), an optional `errorKind` and `recordedAt`.
//! Downstream reporting reads the file directly.

/// Persistence backends
pub mod repositories;
/// Checkpoint service
pub mod store;
/// Record and error types
mod types;

pub use repositories::{CheckpointRepository, FileCheckpointRepository};
pub use store::CheckpointStore;
pub use types::*;
