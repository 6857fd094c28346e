use crate::client::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit of work supplied by the caller. `key` is unique within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
	pub key: String,
	#[serde(default)]
	pub payload: Value,
}

impl WorkItem {
	pub fn new(key: impl Into<String>, payload: Value) -> Self {
		Self {
			key: key.into(),
			payload,
		}
	}
}

/// A work item that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
	pub key: String,
	pub error_kind: ErrorKind,
	pub message: String,
}

/// Result of a batch-mutation run. Built once by the mutator and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
	succeeded: Vec<String>,
	failed: Vec<FailedItem>,
	skipped: Vec<String>,
}

impl BatchOutcome {
	pub(crate) fn new(succeeded: Vec<String>, failed: Vec<FailedItem>, skipped: Vec<String>) -> Self {
		Self {
			succeeded,
			failed,
			skipped,
		}
	}

	/// Keys confirmed by the ledger, in processing order.
	pub fn succeeded(&self) -> &[String] {
		&self.succeeded
	}

	/// Failures in processing order, with their classification and raw message.
	pub fn failed(&self) -> &[FailedItem] {
		&self.failed
	}

	/// Keys found to be applied already.
	pub fn skipped(&self) -> &[String] {
		&self.skipped
	}

	pub fn attempted(&self) -> usize {
		self.succeeded.len() + self.failed.len() + self.skipped.len()
	}

	pub fn has_failures(&self) -> bool {
		!self.failed.is_empty()
	}
}
