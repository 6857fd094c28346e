//! Progress tracking for block-range scans.
//!
//! This module provides the `ScanProgressTracker`, which records which windows of a scan
//! completed, which became gaps, and how many records were folded. It logs progress at
//! regular block intervals and summarizes the scan once it finishes.

use super::window::ScanWindow;
use tracing::{info, warn};

/// Blocks between periodic progress logs.
const LOG_INTERVAL_BLOCKS: u64 = 100_000;

/// Service for tracking scan progress
///
/// Windows are reported in ascending order, so the highest scanned block only moves
/// forward. Failed windows are kept as gaps so coverage holes stay visible.
#[derive(Debug, Clone)]
pub struct ScanProgressTracker {
	/// Requested range
	from_block: u64,
	to_block: u64,
	/// The highest block covered by an attempted window
	highest_scanned_block: Option<u64>,
	/// Windows whose records were folded
	windows_completed: usize,
	/// Total records folded into the index
	records_processed: usize,
	/// Windows that exhausted their retries
	gaps: Vec<ScanWindow>,
	/// Last block at which we logged progress
	last_logged_block: u64,
}

impl ScanProgressTracker {
	/// Create a new progress tracker for the given range.
	pub fn new(from_block: u64, to_block: u64) -> Self {
		Self {
			from_block,
			to_block,
			highest_scanned_block: None,
			windows_completed: 0,
			records_processed: 0,
			gaps: Vec::new(),
			last_logged_block: from_block,
		}
	}

	/// Record a window whose records were folded
	pub fn record_window(&mut self, window: ScanWindow, records: usize) {
		self.advance(window);
		self.windows_completed += 1;
		self.records_processed += records;
	}

	/// Record a window that could not be queried
	pub fn record_gap(&mut self, window: ScanWindow) {
		self.advance(window);
		self.gaps.push(window);
	}

	fn advance(&mut self, window: ScanWindow) {
		self.highest_scanned_block = Some(
			self.highest_scanned_block
				.map_or(window.to_block, |h| h.max(window.to_block)),
		);
	}

	/// Whether every window of the range has been attempted
	pub fn is_range_attempted(&self) -> bool {
		self.highest_scanned_block == Some(self.to_block)
	}

	/// Log progress every `LOG_INTERVAL_BLOCKS` blocks or when forced
	pub fn log_progress(&mut self, force: bool) {
		let Some(highest) = self.highest_scanned_block else {
			return;
		};
		let blocks_since_last_log = highest.saturating_sub(self.last_logged_block);

		if force || blocks_since_last_log >= LOG_INTERVAL_BLOCKS {
			info!(
				"Scan progress: block {} of {} ({} windows, {} records, {} gaps)",
				highest,
				self.to_block,
				self.windows_completed,
				self.records_processed,
				self.gaps.len()
			);
			self.last_logged_block = highest;
		}
	}

	/// Get scan statistics as a ScanStats struct
	pub fn get_stats(&self) -> ScanStats {
		ScanStats {
			from_block: self.from_block,
			to_block: self.to_block,
			windows_completed: self.windows_completed,
			records_processed: self.records_processed,
			gaps: self.gaps.clone(),
		}
	}

	/// Warn about every gap. Returns `false` when the scan is incomplete.
	pub fn validate_completion(&self) -> bool {
		if self.gaps.is_empty() {
			return true;
		}

		warn!("Scan finished with {} gap(s)", self.gaps.len());
		for gap in &self.gaps {
			warn!("Gap detected: blocks {} were not scanned", gap);
		}
		false
	}
}

/// Statistics about a finished scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStats {
	pub from_block: u64,
	pub to_block: u64,
	pub windows_completed: usize,
	pub records_processed: usize,
	pub gaps: Vec<ScanWindow>,
}

impl ScanStats {
	/// Get a human-readable summary of the scan statistics
	pub fn summary(&self) -> String {
		format!(
			"Scan of blocks {} to {}: {} windows, {} records{}",
			self.from_block,
			self.to_block,
			self.windows_completed,
			self.records_processed,
			if self.gaps.is_empty() {
				String::new()
			} else {
				format!(" ({} gaps)", self.gaps.len())
			}
		)
	}
}
