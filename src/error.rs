//! Run-level error types.
//!
//! Per-item and per-window failures never surface here; they are recorded in
//! [`crate::batch::BatchOutcome`] and scan gaps. These errors abort a whole run.

use crate::checkpoint::CheckpointError;
use crate::client::ChainError;

/// Missing or malformed input detected before any work begins.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read {path}: {source}")]
	FileRead {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse {path}: {source}")]
	Parse {
		path: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("Invalid configuration: {0}")]
	Invalid(String),
}

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("Checkpoint error: {0}")]
	Checkpoint(#[from] CheckpointError),

	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),

	#[error("Deployment at {address} not live after {attempts} polls")]
	DeploymentTimedOut { address: String, attempts: u32 },
}
