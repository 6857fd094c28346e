use crate::client::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome recorded for a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
	Succeeded,
	Failed,
	Skipped,
}

impl fmt::Display for CheckpointStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			CheckpointStatus::Succeeded => "succeeded",
			CheckpointStatus::Failed => "failed",
			CheckpointStatus::Skipped => "skipped",
		})
	}
}

/// One line of the checkpoint ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
	pub key: String,
	pub status: CheckpointStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_kind: Option<ErrorKind>,
	/// RFC 3339 timestamp of the append
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub recorded_at: Option<String>,
}

impl CheckpointRecord {
	pub fn new(key: impl Into<String>, status: CheckpointStatus, error_kind: Option<ErrorKind>) -> Self {
		Self {
			key: key.into(),
			status,
			error_kind,
			recorded_at: Some(chrono::Utc::now().to_rfc3339()),
		}
	}
}

/// Which recorded keys a resumed run leaves alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
	/// Any key with a record is skipped.
	#[default]
	SkipRecorded,
	/// Keys whose latest record is `failed` are attempted again.
	RetryFailed,
}

/// Error types for checkpoint persistence
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
	#[error("Checkpoint IO error on {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to serialize checkpoint record: {0}")]
	Serialize(#[from] serde_json::Error),

	#[error("Corrupt checkpoint {path} at line {line}: {reason}")]
	Corrupt {
		path: String,
		line: usize,
		reason: String,
	},
}
