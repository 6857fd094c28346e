//! Types shared by every ledger-access implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A single event log produced by querying a block window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
	/// Block that emitted the event.
	pub block_number: u64,
	/// Transaction that emitted the event.
	pub transaction_id: String,
	/// Named event fields. The JSON-RPC client fills `address`, `topic0`..`topic3`,
	/// `data` and `logIndex`.
	pub fields: BTreeMap<String, Value>,
}

impl EventRecord {
	/// Look up a field rendered as a string, if present.
	pub fn field_str(&self, name: &str) -> Option<&str> {
		self.fields.get(name).and_then(|v| v.as_str())
	}
}

/// Filter passed to a log query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
	/// Emitting contract, or any contract when unset.
	#[serde(default)]
	pub address: Option<String>,
	/// Positional topic filters; `None` matches anything in that position.
	#[serde(default)]
	pub topics: Vec<Option<String>>,
}

/// A method invocation against a remote artifact.
///
/// `method` is the 4-byte selector in hex. Arguments are encoded as 32-byte words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
	pub method: String,
	#[serde(default)]
	pub args: Vec<Value>,
}

/// Handle to a submitted mutation awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHandle {
	pub hash: String,
}

/// Confirmation of a finalized mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
	pub transaction_hash: String,
	pub block_number: u64,
}

/// Classification of a failure as recorded in checkpoints and batch outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Transient failures that outlived every retry.
	Network,
	/// The ledger explicitly refused the operation.
	Rejected,
	/// The ledger answered with something we could not interpret.
	Malformed,
	/// The work item did not describe a valid call.
	InvalidPayload,
	/// A submitted mutation was never confirmed.
	Timeout,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::Network => "network",
			ErrorKind::Rejected => "rejected",
			ErrorKind::Malformed => "malformed",
			ErrorKind::InvalidPayload => "invalid_payload",
			ErrorKind::Timeout => "timeout",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error types for ledger operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
	/// Timeout, rate limiting or temporary unavailability. Safe to retry.
	#[error("Network error: {0}")]
	Network(String),

	#[error("Remote rejection: {0}")]
	Rejected(String),

	#[error("Malformed response: {0}")]
	Malformed(String),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Confirmation timed out for {0}")]
	ConfirmationTimeout(String),
}

impl ChainError {
	/// Whether a retry could plausibly succeed without changing the input.
	pub fn is_transient(&self) -> bool {
		matches!(self, ChainError::Network(_))
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			ChainError::Network(_) => ErrorKind::Network,
			ChainError::Rejected(_) => ErrorKind::Rejected,
			ChainError::Malformed(_) => ErrorKind::Malformed,
			ChainError::InvalidInput(_) => ErrorKind::InvalidPayload,
			ChainError::ConfirmationTimeout(_) => ErrorKind::Timeout,
		}
	}
}

/// Check that `address` is a `0x`-prefixed 20-byte hex string.
pub fn is_valid_address(address: &str) -> bool {
	address
		.strip_prefix("0x")
		.map(|hex_part| hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()))
		.unwrap_or(false)
}
