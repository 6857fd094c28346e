//! Durable ledger of processed work-item keys.
//!
//! This module provides the `CheckpointStore`, the only side effect that marks a work item
//! as handled. It is rehydrated from its repository when opened and then appended to as
//! items complete, so a run killed at any point can resume without resubmitting work
//! that was already recorded.

use super::repositories::CheckpointRepository;
use super::types::{CheckpointError, CheckpointRecord, CheckpointStatus, ResumePolicy};
use crate::client::ErrorKind;
use std::collections::HashMap;
use tracing::{debug, info};

/// Append-only checkpoint ledger with an in-memory view of the latest status per key.
///
/// `append` takes `&mut self`: a run has exactly one writer.
pub struct CheckpointStore {
	repository: Box<dyn CheckpointRepository>,
	latest: HashMap<String, CheckpointStatus>,
	appended: usize,
}

impl CheckpointStore {
	/// Open the store and rehydrate the processed set from `repository`.
	pub async fn open(repository: Box<dyn CheckpointRepository>) -> Result<Self, CheckpointError> {
		let records = repository.load_all().await?;
		let mut latest = HashMap::with_capacity(records.len());
		for record in records {
			latest.insert(record.key, record.status);
		}

		info!("Checkpoint store holds {} processed keys", latest.len());
		Ok(Self {
			repository,
			latest,
			appended: 0,
		})
	}

	/// Durably record the outcome for `key`.
	///
	/// The in-memory view only changes after the repository has persisted the record.
	pub async fn append(
		&mut self,
		key: &str,
		status: CheckpointStatus,
		error_kind: Option<ErrorKind>,
	) -> Result<(), CheckpointError> {
		let record = CheckpointRecord::new(key, status, error_kind);
		self.repository.append(&record).await?;
		self.latest.insert(record.key, status);
		self.appended += 1;
		debug!("Checkpointed {} as {}", key, status);
		Ok(())
	}

	/// Whether any record exists for `key`.
	pub fn contains(&self, key: &str) -> bool {
		self.latest.contains_key(key)
	}

	/// Latest recorded status for `key`.
	pub fn status(&self, key: &str) -> Option<CheckpointStatus> {
		self.latest.get(key).copied()
	}

	/// Mapping of every key to its latest status.
	pub fn load(&self) -> HashMap<String, CheckpointStatus> {
		self.latest.clone()
	}

	/// Whether a resumed run should leave `key` alone under `policy`.
	pub fn is_done(&self, key: &str, policy: ResumePolicy) -> bool {
		match (policy, self.status(key)) {
			(_, None) => false,
			(ResumePolicy::SkipRecorded, Some(_)) => true,
			(ResumePolicy::RetryFailed, Some(status)) => status != CheckpointStatus::Failed,
		}
	}

	/// Number of distinct keys recorded.
	pub fn len(&self) -> usize {
		self.latest.len()
	}

	pub fn is_empty(&self) -> bool {
		self.latest.is_empty()
	}

	/// Records appended by this process.
	pub fn appended(&self) -> usize {
		self.appended
	}
}
