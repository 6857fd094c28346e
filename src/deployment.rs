//! Readiness polling for freshly deployed artifacts.
//!
//! Only gate on artifacts that are expected to appear. Anything that may legitimately
//! never exist should be queried directly and fail fast.

use crate::client::{ChainClient, ChainError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of waiting for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
	/// Code was observed on the given poll (1-based).
	Ready { attempts: u32 },
	/// Every poll came back empty.
	TimedOut { attempts: u32 },
}

impl GateStatus {
	pub fn is_ready(&self) -> bool {
		matches!(self, GateStatus::Ready { .. })
	}
}

/// Polls `get_code` until an artifact is live.
pub struct DeploymentGate<'a, C: ChainClient + ?Sized> {
	client: &'a C,
}

impl<'a, C: ChainClient + ?Sized> DeploymentGate<'a, C> {
	pub fn new(client: &'a C) -> Self {
		Self { client }
	}

	/// Wait until `address` has non-empty code.
	///
	/// Polls at most `max_attempts` times, `interval` apart. A transient `get_code`
	/// failure counts as a not-ready poll; a permanent one is returned immediately.
	pub async fn await_ready(
		&self,
		address: &str,
		interval: Duration,
		max_attempts: u32,
	) -> Result<GateStatus, ChainError> {
		for attempt in 1..=max_attempts {
			match self.client.get_code(address).await {
				Ok(code) if !code.is_empty() => {
					info!(
						"Deployment at {} is live after {} poll(s)",
						address, attempt
					);
					return Ok(GateStatus::Ready { attempts: attempt });
				}
				Ok(_) => debug!("No code at {} yet (poll {}/{})", address, attempt, max_attempts),
				Err(e) if e.is_transient() => {
					warn!("Polling {} failed (poll {}/{}): {}", address, attempt, max_attempts, e)
				}
				Err(e) => return Err(e),
			}

			if attempt < max_attempts {
				tokio::time::sleep(interval).await;
			}
		}

		warn!(
			"Deployment at {} not observed after {} polls",
			address, max_attempts
		);
		Ok(GateStatus::TimedOut {
			attempts: max_attempts,
		})
	}
}
