use super::aggregation::{AggregationIndex, Aggregator};
use super::progress_tracker::{ScanProgressTracker, ScanStats};
use super::window::{ScanWindow, split_windows};
use crate::client::{ChainClient, LogFilter};
use crate::error::ConfigError;
use crate::events::{EventDispatcher, RunEvent};
use crate::retry::RetryPolicy;
use futures::StreamExt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Outcome of a scan. Incomplete whenever `gaps` is non-empty.
#[derive(Debug, Clone)]
pub struct ScanResult<K: Eq + Hash, V> {
	pub index: AggregationIndex<K, V>,
	/// Windows that could not be queried, in block order
	pub gaps: Vec<ScanWindow>,
	/// Every window attempted, in block order
	pub windows: Vec<ScanWindow>,
	pub stats: ScanStats,
}

impl<K: Eq + Hash, V> ScanResult<K, V> {
	pub fn is_complete(&self) -> bool {
		self.gaps.is_empty()
	}
}

/// Paginates a block range into windows and folds their logs into an index.
pub struct EventScanner<C: ChainClient + ?Sized> {
	client: Arc<C>,
	retry: RetryPolicy,
	concurrency: usize,
	pacing: Duration,
}

impl<C: ChainClient + ?Sized> EventScanner<C> {
	pub fn new(client: Arc<C>, retry: RetryPolicy) -> Self {
		Self {
			client,
			retry,
			concurrency: 1,
			pacing: Duration::ZERO,
		}
	}

	/// Fetch up to `concurrency` windows ahead. Results are still folded in block order.
	pub fn with_concurrency(mut self, concurrency: usize) -> Self {
		self.concurrency = concurrency.max(1);
		self
	}

	/// Pause between windows to stay under the endpoint's rate limits.
	///
	/// With the default concurrency of one this spaces successive queries.
	pub fn with_pacing(mut self, pacing: Duration) -> Self {
		self.pacing = pacing;
		self
	}

	/// Scan `[from_block, to_block]` in windows of at most `window_size` blocks.
	///
	/// Each window's query runs under the retry policy. A window that still fails is
	/// recorded as a gap and the scan moves on; its records never reach the index.
	pub async fn scan<A>(
		&self,
		from_block: u64,
		to_block: u64,
		window_size: u64,
		filter: &LogFilter,
		aggregator: &A,
		events: &mut EventDispatcher,
	) -> Result<ScanResult<A::Key, A::Value>, ConfigError>
	where
		A: Aggregator + ?Sized,
	{
		let windows = split_windows(from_block, to_block, window_size)?;
		info!(
			"Scanning blocks {} to {} in {} window(s) of up to {} blocks",
			from_block,
			to_block,
			windows.len(),
			window_size
		);

		let mut index = AggregationIndex::new();
		let mut tracker = ScanProgressTracker::new(from_block, to_block);
		let client = &self.client;
		let retry = self.retry;

		let mut fetches = futures::stream::iter(windows.clone())
			.map(|window| async move {
				let label = format!("eth_getLogs {}", window);
				let result = retry
					.retry(&label, || {
						client.query_logs(filter, window.from_block, window.to_block)
					})
					.await;
				(window, result)
			})
			.buffered(self.concurrency);

		let mut remaining = windows.len();
		while let Some((window, result)) = fetches.next().await {
			remaining -= 1;
			match result {
				Ok(records) => {
					let folded = index.fold(aggregator, &records);
					tracker.record_window(window, folded);
					events
						.dispatch(&RunEvent::WindowScanned {
							window,
							records: records.len(),
						})
						.await;
				}
				Err(e) => {
					tracker.record_gap(window);
					events
						.dispatch(&RunEvent::WindowFailed {
							window,
							error: e.to_string(),
						})
						.await;
				}
			}
			tracker.log_progress(false);

			if remaining > 0 && !self.pacing.is_zero() {
				tokio::time::sleep(self.pacing).await;
			}
		}

		tracker.log_progress(true);
		tracker.validate_completion();
		let stats = tracker.get_stats();
		info!("{}", stats.summary());

		Ok(ScanResult {
			index,
			gaps: stats.gaps.clone(),
			windows,
			stats,
		})
	}
}
