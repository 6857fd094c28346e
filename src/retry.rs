//!
//! Exponential backoff for transient ledger failures.
//!
//! [`RetryPolicy`] drives `backoff::future::retry_notify` with an attempt-bounded,
//! jitter-free schedule: after the failure of attempt `i` (0-based) it waits
//! `base_delay * 2^i`. Permanent errors are surfaced on first occurrence.

use crate::client::ChainError;
use backoff::backoff::Backoff;
use backoff::future::retry_notify;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::warn;

/// Retry configuration shared by every component that talks to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	max_attempts: u32,
	base_delay: Duration,
}

impl RetryPolicy {
	/// A policy making at most `max_attempts` attempts. Zero is treated as one.
	pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			base_delay,
		}
	}

	/// A policy that never retries.
	pub fn no_retry() -> Self {
		Self::new(1, Duration::ZERO)
	}

	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	pub fn base_delay(&self) -> Duration {
		self.base_delay
	}

	/// Run `operation` until it succeeds, fails permanently, or attempts run out.
	///
	/// `label` names the operation in retry logs.
	pub async fn retry<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ChainError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, ChainError>>,
	{
		let failures = AtomicU32::new(0);

		let result = retry_notify(
			AttemptBackoff::new(self.max_attempts, self.base_delay),
			|| {
				let attempt = operation();
				async move {
					attempt.await.map_err(|e| {
						if e.is_transient() {
							backoff::Error::transient(e)
						} else {
							backoff::Error::permanent(e)
						}
					})
				}
			},
			|e: ChainError, delay: Duration| {
				let attempt = failures.fetch_add(1, Ordering::Relaxed) + 1;
				warn!(
					"{} failed on attempt {}/{}: {}; retrying in {:?}",
					label, attempt, self.max_attempts, e, delay
				);
			},
		)
		.await;

		if let Err(e) = &result {
			if e.is_transient() {
				warn!(
					"{} gave up after {} attempts: {}",
					label, self.max_attempts, e
				);
			}
		}
		result
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(5, Duration::from_millis(500))
	}
}

/// Doubling schedule that stops once `max_attempts` attempts have been made.
#[derive(Debug, Clone)]
struct AttemptBackoff {
	max_attempts: u32,
	base_delay: Duration,
	failed_attempts: u32,
}

impl AttemptBackoff {
	fn new(max_attempts: u32, base_delay: Duration) -> Self {
		Self {
			max_attempts,
			base_delay,
			failed_attempts: 0,
		}
	}
}

impl Backoff for AttemptBackoff {
	fn reset(&mut self) {
		self.failed_attempts = 0;
	}

	fn next_backoff(&mut self) -> Option<Duration> {
		if self.failed_attempts + 1 >= self.max_attempts {
			return None;
		}
		let factor = 1u32.checked_shl(self.failed_attempts).unwrap_or(u32::MAX);
		self.failed_attempts += 1;
		Some(self.base_delay.saturating_mul(factor))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;
	use tokio::time::Instant;

	#[test]
	fn backoff_schedule_doubles_and_stops() {
		let mut backoff = AttemptBackoff::new(4, Duration::from_millis(100));
		assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
		assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
		assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
		assert_eq!(backoff.next_backoff(), None);
		backoff.reset();
		assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
	}

	#[tokio::test(start_paused = true)]
	async fn succeeds_on_third_attempt_with_doubling_delays() {
		let base = Duration::from_secs(1);
		let policy = RetryPolicy::new(5, base);
		let attempts = Mutex::new(Vec::new());

		let result = policy
			.retry("flaky read", || {
				let mut seen = attempts.lock().unwrap();
				seen.push(Instant::now());
				let n = seen.len();
				async move {
					if n < 3 {
						Err(ChainError::Network("rate limited".into()))
					} else {
						Ok(n)
					}
				}
			})
			.await;

		assert_eq!(result, Ok(3));
		let seen = attempts.lock().unwrap();
		assert_eq!(seen.len(), 3);
		assert_eq!(seen[1] - seen[0], base);
		assert_eq!(seen[2] - seen[1], base * 2);
	}

	#[tokio::test(start_paused = true)]
	async fn permanent_failure_is_not_retried() {
		let policy = RetryPolicy::new(5, Duration::from_secs(1));
		let calls = AtomicU32::new(0);
		let started = Instant::now();

		let result: Result<(), _> = policy
			.retry("submit", || {
				calls.fetch_add(1, Ordering::SeqCst);
				async { Err(ChainError::Rejected("insufficient balance".into())) }
			})
			.await;

		assert_eq!(result, Err(ChainError::Rejected("insufficient balance".into())));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(started.elapsed(), Duration::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn exhaustion_surfaces_last_transient_error() {
		let policy = RetryPolicy::new(3, Duration::from_millis(10));
		let calls = AtomicU32::new(0);

		let result: Result<(), _> = policy
			.retry("query", || {
				let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
				async move { Err(ChainError::Network(format!("timeout #{}", n))) }
			})
			.await;

		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert_eq!(result, Err(ChainError::Network("timeout #3".into())));
	}

	#[test]
	fn zero_attempts_means_one() {
		assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
	}
}
