//! Run entry points.
//!
//! A [`Runner`] ties one [`RunConfig`] to a ledger client and drives either a scan or a
//! batch of mutations, then reports a [`RunSummary`] whose exit code reflects any failure
//! or gap.

use crate::batch::{BatchMutator, BatchOutcome, Mutation, WorkItem};
use crate::checkpoint::CheckpointStore;
use crate::client::ChainClient;
use crate::config::{RunConfig, validate_work_items};
use crate::deployment::{DeploymentGate, GateStatus};
use crate::error::RunError;
use crate::events::{EventDispatcher, RunEvent, RunEventHandler};
use crate::scanner::{Aggregator, EventScanner, ScanResult};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Counts reported at the end of every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
	pub succeeded: usize,
	pub failed: usize,
	/// Items already applied or already checkpointed by an earlier run.
	pub skipped: usize,
	pub gaps: usize,
}

impl RunSummary {
	/// Process exit status: non-zero whenever anything failed or a window was missed.
	pub fn exit_code(&self) -> u8 {
		if self.failed > 0 || self.gaps > 0 { 1 } else { 0 }
	}

	pub fn is_clean(&self) -> bool {
		self.exit_code() == 0
	}
}

impl fmt::Display for RunSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} succeeded, {} failed, {} skipped, {} gap(s)",
			self.succeeded, self.failed, self.skipped, self.gaps
		)
	}
}

/// Result of [`Runner::run_scan`].
#[derive(Debug, Clone)]
pub struct ScanReport<K: Eq + Hash, V> {
	pub result: ScanResult<K, V>,
	pub summary: RunSummary,
}

/// Result of [`Runner::run_mutations`].
#[derive(Debug, Clone)]
pub struct MutationReport {
	pub outcome: BatchOutcome,
	/// Keys left alone because the checkpoint ledger already covers them.
	pub resumed: Vec<String>,
	pub summary: RunSummary,
}

/// Drives one configured run against a ledger.
pub struct Runner<C: ChainClient + ?Sized> {
	client: Arc<C>,
	config: RunConfig,
	events: EventDispatcher,
}

impl<C: ChainClient + ?Sized> Runner<C> {
	/// Create a runner that logs every event.
	pub fn new(client: Arc<C>, config: RunConfig) -> Self {
		Self {
			client,
			config,
			events: EventDispatcher::with_logging(),
		}
	}

	/// Replace the event dispatcher.
	pub fn with_events(mut self, events: EventDispatcher) -> Self {
		self.events = events;
		self
	}

	pub fn register_handler(&mut self, handler: Box<dyn RunEventHandler>) {
		self.events.register_handler(handler);
	}

	pub fn config(&self) -> &RunConfig {
		&self.config
	}

	/// Block until `address` has code, per the deployment settings.
	///
	/// Returns the number of polls it took.
	pub async fn ensure_deployed(&self, address: &str) -> Result<u32, RunError> {
		let deployment = &self.config.deployment;
		let status = DeploymentGate::new(self.client.as_ref())
			.await_ready(address, deployment.interval(), deployment.max_attempts)
			.await?;

		match status {
			GateStatus::Ready { attempts } => Ok(attempts),
			GateStatus::TimedOut { attempts } => Err(RunError::DeploymentTimedOut {
				address: address.to_string(),
				attempts,
			}),
		}
	}

	/// Scan `[from_block, to_block]`, resolving an open end to the current head.
	pub async fn run_scan<A>(
		&mut self,
		from_block: u64,
		to_block: Option<u64>,
		aggregator: &A,
	) -> Result<ScanReport<A::Key, A::Value>, RunError>
	where
		A: Aggregator + ?Sized,
	{
		let retry = self.config.retry.policy();
		let to_block = match to_block {
			Some(block) => block,
			None => {
				let client = &self.client;
				let head = retry.retry("eth_blockNumber", || client.block_number()).await?;
				info!("Resolved scan end to head block {}", head);
				head
			}
		};

		let scan = &self.config.scan;
		let result = EventScanner::new(self.client.clone(), retry)
			.with_concurrency(scan.concurrency)
			.with_pacing(Duration::from_millis(scan.pacing_ms))
			.scan(
				from_block,
				to_block,
				scan.window_size,
				&scan.filter,
				aggregator,
				&mut self.events,
			)
			.await?;

		let summary = RunSummary {
			succeeded: result.windows.len() - result.gaps.len(),
			failed: 0,
			skipped: 0,
			gaps: result.gaps.len(),
		};
		self.complete(summary).await;

		Ok(ScanReport { result, summary })
	}

	/// A full mutation job: validate the feed, wait for `await_target` to be deployed
	/// when given, then apply the items.
	///
	/// A bad feed is reported before the deployment gate polls anything.
	pub async fn run_mutation_job<M>(
		&mut self,
		items: &[WorkItem],
		store: &mut CheckpointStore,
		mutation: &M,
		await_target: Option<&str>,
	) -> Result<MutationReport, RunError>
	where
		M: Mutation + ?Sized,
	{
		validate_work_items(items)?;
		if let Some(address) = await_target {
			self.ensure_deployed(address).await?;
		}
		self.run_mutations(items, store, mutation).await
	}

	/// Apply `items` through `mutation`, skipping keys the checkpoint ledger already covers.
	///
	/// The feed is validated before any work starts.
	pub async fn run_mutations<M>(
		&mut self,
		items: &[WorkItem],
		store: &mut CheckpointStore,
		mutation: &M,
	) -> Result<MutationReport, RunError>
	where
		M: Mutation + ?Sized,
	{
		validate_work_items(items)?;
		let mutator = BatchMutator::new(
			self.config.batch.batch_size,
			self.config.batch.inter_batch_delay(),
		)?;

		let policy = self.config.resume;
		let (resumed, pending): (Vec<&WorkItem>, Vec<&WorkItem>) =
			items.iter().partition(|item| store.is_done(&item.key, policy));
		if !resumed.is_empty() {
			info!(
				"Resuming: {} of {} item(s) already checkpointed",
				resumed.len(),
				items.len()
			);
		}
		let pending: Vec<WorkItem> = pending.into_iter().cloned().collect();
		let resumed: Vec<String> = resumed.into_iter().map(|item| item.key.clone()).collect();

		let outcome = mutator
			.execute(&pending, store, mutation, &mut self.events)
			.await?;

		let summary = RunSummary {
			succeeded: outcome.succeeded().len(),
			failed: outcome.failed().len(),
			skipped: outcome.skipped().len() + resumed.len(),
			gaps: 0,
		};
		self.complete(summary).await;

		Ok(MutationReport {
			outcome,
			resumed,
			summary,
		})
	}

	async fn complete(&mut self, summary: RunSummary) {
		info!("Run finished: {}", summary);
		self.events
			.dispatch(&RunEvent::RunCompleted { summary })
			.await;
	}
}
