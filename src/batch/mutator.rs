//! Sequential batched execution of work items.
//!
//! All mutations originate from one submitting identity, so items are applied strictly
//! one at a time and each is confirmed before the next is submitted. Batches only
//! exist to insert a pacing delay for the endpoint's rate limits.

use super::mutation::Mutation;
use super::types::{BatchOutcome, FailedItem, WorkItem};
use crate::checkpoint::{CheckpointStatus, CheckpointStore};
use crate::client::ChainError;
use crate::error::{ConfigError, RunError};
use crate::events::{EventDispatcher, RunEvent};
use std::time::Duration;
use tracing::{debug, info};

enum ItemResult {
	Succeeded,
	Skipped,
	Failed(ChainError),
}

/// Drives an ordered queue of work items through a [`Mutation`].
#[derive(Debug, Clone, Copy)]
pub struct BatchMutator {
	batch_size: usize,
	inter_batch_delay: Duration,
}

impl BatchMutator {
	pub fn new(batch_size: usize, inter_batch_delay: Duration) -> Result<Self, ConfigError> {
		if batch_size == 0 {
			return Err(ConfigError::Invalid("batch size must be at least 1".to_string()));
		}
		Ok(Self {
			batch_size,
			inter_batch_delay,
		})
	}

	pub fn batch_size(&self) -> usize {
		self.batch_size
	}

	/// Apply every item in order, recording each outcome in `store` before moving on.
	///
	/// A failing item is recorded and never stops the run. Only a checkpoint write
	/// failure aborts, since completion could no longer be recorded durably.
	pub async fn execute<M>(
		&self,
		items: &[WorkItem],
		store: &mut CheckpointStore,
		mutation: &M,
		events: &mut EventDispatcher,
	) -> Result<BatchOutcome, RunError>
	where
		M: Mutation + ?Sized,
	{
		let batch_count = items.len().div_ceil(self.batch_size);
		info!(
			"Executing {} item(s) in {} batch(es) of up to {}",
			items.len(),
			batch_count,
			self.batch_size
		);

		let mut succeeded = Vec::new();
		let mut failed = Vec::new();
		let mut skipped = Vec::new();

		for (batch_index, batch) in items.chunks(self.batch_size).enumerate() {
			events
				.dispatch(&RunEvent::BatchStarted {
					batch_index,
					batch_count,
					size: batch.len(),
				})
				.await;

			for item in batch {
				match Self::process_item(item, mutation).await {
					ItemResult::Succeeded => {
						store
							.append(&item.key, CheckpointStatus::Succeeded, None)
							.await?;
						succeeded.push(item.key.clone());
						events
							.dispatch(&RunEvent::ItemSucceeded {
								key: item.key.clone(),
							})
							.await;
					}
					ItemResult::Skipped => {
						store
							.append(&item.key, CheckpointStatus::Skipped, None)
							.await?;
						skipped.push(item.key.clone());
						events
							.dispatch(&RunEvent::ItemSkipped {
								key: item.key.clone(),
							})
							.await;
					}
					ItemResult::Failed(e) => {
						let error_kind = e.kind();
						store
							.append(&item.key, CheckpointStatus::Failed, Some(error_kind))
							.await?;
						let failure = FailedItem {
							key: item.key.clone(),
							error_kind,
							message: e.to_string(),
						};
						events
							.dispatch(&RunEvent::ItemFailed {
								key: failure.key.clone(),
								error_kind,
								message: failure.message.clone(),
							})
							.await;
						failed.push(failure);
					}
				}
			}

			if batch_index + 1 < batch_count {
				events
					.dispatch(&RunEvent::BatchPaused {
						batch_index,
						delay: self.inter_batch_delay,
					})
					.await;
				tokio::time::sleep(self.inter_batch_delay).await;
			}
		}

		Ok(BatchOutcome::new(succeeded, failed, skipped))
	}

	async fn process_item<M: Mutation + ?Sized>(item: &WorkItem, mutation: &M) -> ItemResult {
		match mutation.already_applied(item).await {
			Ok(true) => return ItemResult::Skipped,
			Ok(false) => {}
			Err(e) => return ItemResult::Failed(e),
		}

		match mutation.apply(item).await {
			Ok(receipt) => {
				debug!(
					"{} confirmed in block {} by {}",
					item.key, receipt.block_number, receipt.transaction_hash
				);
				ItemResult::Succeeded
			}
			Err(e) => ItemResult::Failed(e),
		}
	}
}
