//! In-memory collaborators for unit tests.

use crate::checkpoint::{CheckpointError, CheckpointRecord, CheckpointRepository};
use crate::client::{ChainClient, ChainError, EventRecord, LogFilter, MethodCall, Receipt, TxHandle};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Chain client whose answers are scripted up front.
#[derive(Default)]
pub struct ScriptedChainClient {
	code_responses: Mutex<VecDeque<Result<Vec<u8>, ChainError>>>,
	get_code_calls: AtomicUsize,
	records: Vec<EventRecord>,
	failing_windows: HashMap<u64, ChainError>,
	windows_queried: Mutex<Vec<(u64, u64)>>,
	submit_responses: Mutex<VecDeque<Result<TxHandle, ChainError>>>,
	confirmation_responses: Mutex<VecDeque<Result<Receipt, ChainError>>>,
	submitted: Mutex<Vec<(String, MethodCall)>>,
	call_result: Value,
	head: u64,
}

impl ScriptedChainClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// Answers for successive `get_code` calls; empty code once exhausted.
	pub fn with_code_responses(self, responses: Vec<Result<Vec<u8>, ChainError>>) -> Self {
		*self.code_responses.lock().unwrap() = responses.into();
		self
	}

	/// Records served by `query_logs`, filtered by block range.
	pub fn with_records(mut self, records: Vec<EventRecord>) -> Self {
		self.records = records;
		self
	}

	/// Every query for the window starting at `from_block` fails with `error`.
	pub fn with_failing_window(mut self, from_block: u64, error: ChainError) -> Self {
		self.failing_windows.insert(from_block, error);
		self
	}

	pub fn with_submit_responses(self, responses: Vec<Result<TxHandle, ChainError>>) -> Self {
		*self.submit_responses.lock().unwrap() = responses.into();
		self
	}

	pub fn with_confirmation_responses(self, responses: Vec<Result<Receipt, ChainError>>) -> Self {
		*self.confirmation_responses.lock().unwrap() = responses.into();
		self
	}

	pub fn with_call_result(mut self, value: Value) -> Self {
		self.call_result = value;
		self
	}

	pub fn with_head(mut self, head: u64) -> Self {
		self.head = head;
		self
	}

	pub fn get_code_calls(&self) -> usize {
		self.get_code_calls.load(Ordering::SeqCst)
	}

	pub fn windows_queried(&self) -> Vec<(u64, u64)> {
		self.windows_queried.lock().unwrap().clone()
	}

	pub fn submitted(&self) -> Vec<(String, MethodCall)> {
		self.submitted.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl ChainClient for ScriptedChainClient {
	async fn get_code(&self, _address: &str) -> Result<Vec<u8>, ChainError> {
		self.get_code_calls.fetch_add(1, Ordering::SeqCst);
		self.code_responses
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or(Ok(Vec::new()))
	}

	async fn query_logs(
		&self,
		_filter: &LogFilter,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<EventRecord>, ChainError> {
		self.windows_queried.lock().unwrap().push((from_block, to_block));
		if let Some(error) = self.failing_windows.get(&from_block) {
			return Err(error.clone());
		}
		Ok(self
			.records
			.iter()
			.filter(|r| r.block_number >= from_block && r.block_number <= to_block)
			.cloned()
			.collect())
	}

	async fn call(&self, _address: &str, _call: &MethodCall) -> Result<Value, ChainError> {
		Ok(self.call_result.clone())
	}

	async fn submit(&self, address: &str, call: &MethodCall) -> Result<TxHandle, ChainError> {
		let mut submitted = self.submitted.lock().unwrap();
		submitted.push((address.to_string(), call.clone()));
		let n = submitted.len();
		self.submit_responses
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or_else(|| {
				Ok(TxHandle {
					hash: format!("0x{:x}", n),
				})
			})
	}

	async fn await_confirmation(&self, handle: &TxHandle) -> Result<Receipt, ChainError> {
		self.confirmation_responses
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or_else(|| {
				Ok(Receipt {
					transaction_hash: handle.hash.clone(),
					block_number: 1,
				})
			})
	}

	async fn block_number(&self) -> Result<u64, ChainError> {
		Ok(self.head)
	}
}

/// A transfer-shaped event at `block` moving `token_id` to `owner` with `amount`.
pub fn transfer_record(block: u64, owner: &str, token_id: &str, amount: u64) -> EventRecord {
	let mut fields = BTreeMap::new();
	fields.insert("owner".to_string(), json!(owner));
	fields.insert("token_id".to_string(), json!(token_id));
	fields.insert("amount".to_string(), json!(amount));
	EventRecord {
		block_number: block,
		transaction_id: format!("0x{:x}", block),
		fields,
	}
}

/// Checkpoint repository kept in memory. Clones share the same records, which lets a
/// test "restart" by opening a new store over a clone.
#[derive(Clone, Default)]
pub struct MemoryCheckpointRepository {
	records: Arc<Mutex<Vec<CheckpointRecord>>>,
	fail_appends: Arc<AtomicBool>,
}

impl MemoryCheckpointRepository {
	pub fn records(&self) -> Vec<CheckpointRecord> {
		self.records.lock().unwrap().clone()
	}

	pub fn fail_appends(&self, fail: bool) {
		self.fail_appends.store(fail, Ordering::SeqCst);
	}
}

#[async_trait::async_trait]
impl CheckpointRepository for MemoryCheckpointRepository {
	async fn append(&mut self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
		if self.fail_appends.load(Ordering::SeqCst) {
			return Err(CheckpointError::Io {
				path: "memory".to_string(),
				source: std::io::Error::other("disk full"),
			});
		}
		self.records.lock().unwrap().push(record.clone());
		Ok(())
	}

	async fn load_all(&self) -> Result<Vec<CheckpointRecord>, CheckpointError> {
		Ok(self.records())
	}
}
