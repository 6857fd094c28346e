use super::types::{ChainError, EventRecord, LogFilter, MethodCall, Receipt, TxHandle};
use serde_json::Value;

/// Capability set the engine requires from any ledger-access collaborator.
///
/// Every failure is a [`ChainError`]; its transient/permanent classification decides
/// whether [`crate::retry::RetryPolicy`] tries again. Implementations must be safe to
/// share across concurrent read-only calls.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
	/// Deployed bytecode at `address`; empty when nothing is deployed there.
	async fn get_code(&self, address: &str) -> Result<Vec<u8>, ChainError>;

	/// Historical events matching `filter` in the inclusive block range.
	async fn query_logs(
		&self,
		filter: &LogFilter,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<EventRecord>, ChainError>;

	/// Read-only invocation.
	async fn call(&self, address: &str, call: &MethodCall) -> Result<Value, ChainError>;

	/// Submit a mutating invocation. Returns once the ledger has accepted it.
	async fn submit(&self, address: &str, call: &MethodCall) -> Result<TxHandle, ChainError>;

	/// Block until the submitted mutation is finalized or definitively failed.
	async fn await_confirmation(&self, handle: &TxHandle) -> Result<Receipt, ChainError>;

	/// Current head of the ledger.
	async fn block_number(&self) -> Result<u64, ChainError>;
}
