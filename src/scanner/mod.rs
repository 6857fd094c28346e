//! Block-range event scanning.
//!
//! A scan splits a block range into fixed-size windows, queries the logs of each window
//! under the retry policy, and folds the records into an [`AggregationIndex`]. A window
//! that cannot be queried becomes a gap instead of aborting the scan; callers must treat
//! any gap as an incomplete scan.

/// Key extraction, merge functions and the index they build
pub mod aggregation;
/// The scanner itself
mod event_scanner;
/// Tracks scan progress and statistics
pub mod progress_tracker;
/// Window arithmetic
mod window;

pub use aggregation::{AggregationIndex, Aggregator, GroupByField, SumByField};
pub use event_scanner::{EventScanner, ScanResult};
pub use progress_tracker::{ScanProgressTracker, ScanStats};
pub use window::{ScanWindow, split_windows};
