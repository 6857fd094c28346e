use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive block range queried in a single log request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScanWindow {
	pub from_block: u64,
	pub to_block: u64,
}

impl ScanWindow {
	pub fn new(from_block: u64, to_block: u64) -> Self {
		Self {
			from_block,
			to_block,
		}
	}

	/// Number of blocks covered. An inverted window covers none.
	pub fn block_count(&self) -> u64 {
		if self.from_block > self.to_block {
			return 0;
		}
		(self.to_block - self.from_block).saturating_add(1)
	}

	pub fn contains(&self, block: u64) -> bool {
		block >= self.from_block && block <= self.to_block
	}
}

impl fmt::Display for ScanWindow {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}, {}]", self.from_block, self.to_block)
	}
}

/// Split `[from_block, to_block]` into consecutive windows of at most `window_size` blocks.
///
/// Windows are contiguous, non-overlapping and ascending; their union is exactly the
/// requested range.
pub fn split_windows(
	from_block: u64,
	to_block: u64,
	window_size: u64,
) -> Result<Vec<ScanWindow>, ConfigError> {
	if window_size == 0 {
		return Err(ConfigError::Invalid("window size must be at least 1".to_string()));
	}
	if from_block > to_block {
		return Err(ConfigError::Invalid(format!(
			"scan range is empty: from block {} is after to block {}",
			from_block, to_block
		)));
	}

	let mut windows = Vec::new();
	let mut start = from_block;
	loop {
		let end = start.saturating_add(window_size - 1).min(to_block);
		windows.push(ScanWindow::new(start, end));
		if end == to_block {
			break;
		}
		start = end + 1;
	}
	Ok(windows)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_into_full_windows_and_a_remainder() {
		let windows = split_windows(0, 25_000, 10_000).unwrap();
		assert_eq!(
			windows,
			vec![
				ScanWindow::new(0, 9_999),
				ScanWindow::new(10_000, 19_999),
				ScanWindow::new(20_000, 25_000),
			]
		);
	}

	#[test]
	fn union_of_windows_is_the_range() {
		for (from, to, size) in [(0, 0, 1), (5, 17, 4), (100, 199, 100), (7, 1_000, 999), (3, 9, 50)] {
			let windows = split_windows(from, to, size).unwrap();
			assert_eq!(windows.first().unwrap().from_block, from);
			assert_eq!(windows.last().unwrap().to_block, to);
			for pair in windows.windows(2) {
				assert_eq!(pair[0].to_block + 1, pair[1].from_block);
			}
			assert!(windows.iter().all(|w| w.block_count() <= size));
			let covered: u64 = windows.iter().map(|w| w.block_count()).sum();
			assert_eq!(covered, to - from + 1);
		}
	}

	#[test]
	fn handles_the_top_of_the_block_space() {
		let windows = split_windows(u64::MAX - 5, u64::MAX, 4).unwrap();
		assert_eq!(
			windows,
			vec![
				ScanWindow::new(u64::MAX - 5, u64::MAX - 2),
				ScanWindow::new(u64::MAX - 1, u64::MAX),
			]
		);
	}

	#[test]
	fn block_count_of_hand_built_windows() {
		assert_eq!(ScanWindow::new(5, 5).block_count(), 1);
		assert_eq!(ScanWindow::new(0, u64::MAX).block_count(), u64::MAX);
		assert_eq!(ScanWindow::new(10, 3).block_count(), 0);
		assert!(!ScanWindow::new(10, 3).contains(5));
	}

	#[test]
	fn rejects_zero_window_and_inverted_range() {
		assert!(matches!(split_windows(0, 10, 0), Err(ConfigError::Invalid(_))));
		assert!(matches!(split_windows(11, 10, 5), Err(ConfigError::Invalid(_))));
	}
}
