//! Batch engine for driving long-running read and write workloads against a rate-limited
//! ledger endpoint.
//!
//! A run either scans a block range for event logs and folds them into an index, or
//! applies an ordered feed of work items as confirmed mutations. Both survive transient
//! endpoint failures through [`retry::RetryPolicy`], and mutation runs record every
//! outcome in a durable [`checkpoint::CheckpointStore`] so a restarted run never
//! resubmits confirmed work.

pub mod batch;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod deployment;
pub mod error;
pub mod events;
pub mod retry;
pub mod runner;
pub mod scanner;

#[cfg(test)]
mod testing;
