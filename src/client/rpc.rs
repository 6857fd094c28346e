//!
//! JSON-RPC client for an Ethereum-style ledger endpoint.
//!
//! This module provides [`JsonRpcChainClient`], the HTTP implementation of
//! [`ChainClient`]. It classifies every failure as transient or permanent so the retry
//! layer above it can decide what to do. Mutations are submitted with
//! `eth_sendTransaction` from a node-managed account; signing happens elsewhere.

use super::traits::ChainClient;
use super::types::{ChainError, EventRecord, LogFilter, MethodCall, Receipt, TxHandle};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// JSON-RPC error code for "limit exceeded" (EIP-1474).
const LIMIT_EXCEEDED: i64 = -32005;

/// Ledger client speaking JSON-RPC over HTTP
#[derive(Clone)]
pub struct JsonRpcChainClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// The JSON-RPC endpoint URL.
	endpoint: String,
	/// Monotonic request id shared by clones.
	next_id: Arc<AtomicU64>,
	/// Account used as `from` for submitted mutations.
	sender: Option<String>,
	/// How often to poll for a receipt while awaiting confirmation.
	receipt_poll_interval: Duration,
	/// Give up waiting for a receipt after this long.
	confirmation_timeout: Duration,
}

impl JsonRpcChainClient {
	/// Create a new client.
	///
	/// # Arguments
	/// * `endpoint` - The HTTP JSON-RPC endpoint.
	/// * `request_timeout` - Per-request timeout; an expired request is a transient failure.
	pub fn new(endpoint: String, request_timeout: Duration) -> Result<Self, ChainError> {
		let http_client = Client::builder()
			.timeout(request_timeout)
			.build()
			.map_err(|e| ChainError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			http_client,
			endpoint,
			next_id: Arc::new(AtomicU64::new(1)),
			sender: None,
			receipt_poll_interval: Duration::from_secs(2),
			confirmation_timeout: Duration::from_secs(120),
		})
	}

	/// Set the account used as the sender of submitted mutations.
	pub fn with_sender(mut self, sender: Option<String>) -> Self {
		self.sender = sender;
		self
	}

	/// Configure receipt polling.
	pub fn with_confirmation(mut self, poll_interval: Duration, timeout: Duration) -> Self {
		self.receipt_poll_interval = poll_interval;
		self.confirmation_timeout = timeout;
		self
	}

	/// Execute a single JSON-RPC request and return its `result` member.
	pub async fn execute_request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request_body = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});

		debug!("JSON-RPC request {} {}", id, method);

		let response = self
			.http_client
			.post(&self.endpoint)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await
			.map_err(classify_transport_error)?;

		let status = response.status();
		if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
			return Err(ChainError::Network(format!("HTTP error: {}", status)));
		}
		if !status.is_success() {
			return Err(ChainError::Rejected(format!("HTTP error: {}", status)));
		}

		let response_json: Value = response.json().await.map_err(classify_transport_error)?;

		if let Some(error) = response_json.get("error") {
			return Err(classify_rpc_error(error));
		}

		response_json
			.get("result")
			.cloned()
			.ok_or_else(|| ChainError::Malformed(format!("{} response has no result", method)))
	}

	async fn fetch_receipt(&self, handle: &TxHandle) -> Result<Option<Receipt>, ChainError> {
		let result = self
			.execute_request("eth_getTransactionReceipt", json!([handle.hash]))
			.await?;
		if result.is_null() {
			return Ok(None);
		}

		let block_number = parse_quantity(result.get("blockNumber"), "blockNumber")?;
		let status = result.get("status").and_then(|s| s.as_str()).unwrap_or("0x1");
		if status == "0x0" {
			return Err(ChainError::Rejected(format!(
				"transaction {} reverted in block {}",
				handle.hash, block_number
			)));
		}

		Ok(Some(Receipt {
			transaction_hash: handle.hash.clone(),
			block_number,
		}))
	}
}

#[async_trait::async_trait]
impl ChainClient for JsonRpcChainClient {
	async fn get_code(&self, address: &str) -> Result<Vec<u8>, ChainError> {
		let result = self
			.execute_request("eth_getCode", json!([address, "latest"]))
			.await?;
		let code = result
			.as_str()
			.ok_or_else(|| ChainError::Malformed("eth_getCode result is not a string".to_string()))?;
		decode_hex(code)
	}

	async fn query_logs(
		&self,
		filter: &LogFilter,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<EventRecord>, ChainError> {
		let mut params = Map::new();
		params.insert("fromBlock".into(), json!(format!("0x{:x}", from_block)));
		params.insert("toBlock".into(), json!(format!("0x{:x}", to_block)));
		if let Some(address) = &filter.address {
			params.insert("address".into(), json!(address));
		}
		if !filter.topics.is_empty() {
			params.insert("topics".into(), json!(filter.topics));
		}

		let result = self
			.execute_request("eth_getLogs", Value::Array(vec![Value::Object(params)]))
			.await?;
		let logs = result
			.as_array()
			.ok_or_else(|| ChainError::Malformed("eth_getLogs result is not an array".to_string()))?;

		logs.iter().map(log_to_record).collect()
	}

	async fn call(&self, address: &str, call: &MethodCall) -> Result<Value, ChainError> {
		let data = encode_call(call)?;
		self.execute_request("eth_call", json!([{ "to": address, "data": data }, "latest"]))
			.await
	}

	async fn submit(&self, address: &str, call: &MethodCall) -> Result<TxHandle, ChainError> {
		let data = encode_call(call)?;
		let mut tx = Map::new();
		if let Some(sender) = &self.sender {
			tx.insert("from".into(), json!(sender));
		}
		tx.insert("to".into(), json!(address));
		tx.insert("data".into(), json!(data));

		let result = self
			.execute_request("eth_sendTransaction", Value::Array(vec![Value::Object(tx)]))
			.await?;
		let hash = result.as_str().ok_or_else(|| {
			ChainError::Malformed("eth_sendTransaction result is not a hash".to_string())
		})?;

		info!("Submitted transaction {} to {}", hash, address);
		Ok(TxHandle {
			hash: hash.to_string(),
		})
	}

	async fn await_confirmation(&self, handle: &TxHandle) -> Result<Receipt, ChainError> {
		let deadline = tokio::time::Instant::now() + self.confirmation_timeout;

		loop {
			match self.fetch_receipt(handle).await {
				Ok(Some(receipt)) => {
					debug!(
						"Transaction {} confirmed in block {}",
						receipt.transaction_hash, receipt.block_number
					);
					return Ok(receipt);
				}
				Ok(None) => {}
				// A flaky endpoint does not mean the transaction failed; keep polling.
				Err(e) if e.is_transient() => {
					debug!("Receipt poll for {} failed: {}", handle.hash, e);
				}
				Err(e) => return Err(e),
			}

			if tokio::time::Instant::now() + self.receipt_poll_interval > deadline {
				return Err(ChainError::ConfirmationTimeout(handle.hash.clone()));
			}
			tokio::time::sleep(self.receipt_poll_interval).await;
		}
	}

	async fn block_number(&self) -> Result<u64, ChainError> {
		let result = self.execute_request("eth_blockNumber", json!([])).await?;
		parse_quantity(Some(&result), "eth_blockNumber")
	}
}

/// Encode a method call as selector followed by 32-byte words.
///
/// Supported argument shapes: `0x` hex strings up to 32 bytes, decimal strings and
/// unsigned numbers up to 128 bits, and booleans.
pub fn encode_call(call: &MethodCall) -> Result<String, ChainError> {
	let selector = call.method.strip_prefix("0x").unwrap_or(&call.method);
	if selector.len() != 8 || !selector.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err(ChainError::InvalidInput(format!(
			"method selector must be 4 bytes of hex, got {:?}",
			call.method
		)));
	}

	let mut data = format!("0x{}", selector.to_ascii_lowercase());
	for (position, arg) in call.args.iter().enumerate() {
		data.push_str(&encode_word(arg).map_err(|reason| {
			ChainError::InvalidInput(format!("argument {}: {}", position, reason))
		})?);
	}
	Ok(data)
}

fn encode_word(arg: &Value) -> Result<String, String> {
	match arg {
		Value::Bool(flag) => Ok(format!("{:064x}", u8::from(*flag))),
		Value::Number(n) => n
			.as_u64()
			.map(|v| format!("{:064x}", v))
			.ok_or_else(|| format!("{} is not an unsigned integer", n)),
		Value::String(s) => {
			if let Some(hex_part) = s.strip_prefix("0x") {
				if hex_part.len() > 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
					return Err(format!("{:?} is not a 32-byte hex word", s));
				}
				Ok(format!("{:0>64}", hex_part.to_ascii_lowercase()))
			} else {
				s.parse::<u128>()
					.map(|v| format!("{:064x}", v))
					.map_err(|_| format!("{:?} is neither hex nor a decimal integer", s))
			}
		}
		other => Err(format!("unsupported argument {}", other)),
	}
}

fn classify_transport_error(e: reqwest::Error) -> ChainError {
	if e.is_decode() {
		ChainError::Malformed(e.to_string())
	} else {
		ChainError::Network(e.to_string())
	}
}

fn classify_rpc_error(error: &Value) -> ChainError {
	let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
	let message = error
		.get("message")
		.and_then(|m| m.as_str())
		.unwrap_or("unknown JSON-RPC error")
		.to_string();

	let lowered = message.to_ascii_lowercase();
	let transient = code == LIMIT_EXCEEDED
		|| lowered.contains("rate limit")
		|| lowered.contains("too many requests")
		|| lowered.contains("timeout")
		|| lowered.contains("temporarily unavailable");

	if transient {
		ChainError::Network(format!("{} (code {})", message, code))
	} else {
		ChainError::Rejected(format!("{} (code {})", message, code))
	}
}

fn decode_hex(value: &str) -> Result<Vec<u8>, ChainError> {
	let digits = value.strip_prefix("0x").unwrap_or(value);
	hex::decode(digits).map_err(|e| ChainError::Malformed(format!("invalid hex {:?}: {}", value, e)))
}

fn parse_quantity(value: Option<&Value>, field: &str) -> Result<u64, ChainError> {
	let raw = value
		.and_then(|v| v.as_str())
		.ok_or_else(|| ChainError::Malformed(format!("{} is missing", field)))?;
	let digits = raw.strip_prefix("0x").unwrap_or(raw);
	u64::from_str_radix(digits, 16)
		.map_err(|e| ChainError::Malformed(format!("{} {:?} is not a quantity: {}", field, raw, e)))
}

fn log_to_record(log: &Value) -> Result<EventRecord, ChainError> {
	let block_number = parse_quantity(log.get("blockNumber"), "blockNumber")?;
	let transaction_id = log
		.get("transactionHash")
		.and_then(|h| h.as_str())
		.ok_or_else(|| ChainError::Malformed("log has no transactionHash".to_string()))?
		.to_string();

	let mut fields = BTreeMap::new();
	for name in ["address", "data", "logIndex"] {
		if let Some(value) = log.get(name) {
			fields.insert(name.to_string(), value.clone());
		}
	}
	if let Some(topics) = log.get("topics").and_then(|t| t.as_array()) {
		for (position, topic) in topics.iter().enumerate() {
			fields.insert(format!("topic{}", position), topic.clone());
		}
	}

	Ok(EventRecord {
		block_number,
		transaction_id,
		fields,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use httpmock::prelude::*;

	fn client_for(server: &MockServer) -> JsonRpcChainClient {
		JsonRpcChainClient::new(server.url("/"), Duration::from_secs(5))
			.unwrap()
			.with_confirmation(Duration::from_millis(10), Duration::from_millis(200))
	}

	#[test]
	fn encodes_selector_and_words() {
		let call = MethodCall {
			method: "0xA9059CBB".to_string(),
			args: vec![json!("0x00000000000000000000000000000000000000ab"), json!(5), json!("1000")],
		};
		let data = encode_call(&call).unwrap();
		assert!(data.starts_with("0xa9059cbb"));
		assert_eq!(data.len(), 2 + 8 + 3 * 64);
		assert!(data.ends_with(&format!("{:064x}", 1000)));
	}

	#[test]
	fn rejects_bad_selector_and_arguments() {
		let bad_selector = MethodCall {
			method: "transfer".to_string(),
			args: vec![],
		};
		assert!(matches!(encode_call(&bad_selector), Err(ChainError::InvalidInput(_))));

		let bad_arg = MethodCall {
			method: "0xa9059cbb".to_string(),
			args: vec![json!({"nested": true})],
		};
		assert!(matches!(encode_call(&bad_arg), Err(ChainError::InvalidInput(_))));
	}

	#[test]
	fn rate_limit_errors_are_transient() {
		let limited = classify_rpc_error(&json!({"code": -32005, "message": "limit exceeded"}));
		assert!(limited.is_transient());

		let reverted = classify_rpc_error(&json!({"code": 3, "message": "execution reverted"}));
		assert!(matches!(reverted, ChainError::Rejected(_)));
	}

	#[tokio::test]
	async fn get_code_decodes_bytecode() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).body_contains("eth_getCode");
				then.status(200)
					.json_body(json!({"jsonrpc": "2.0", "id": 1, "result": "0x6080"}));
			})
			.await;

		let code = client_for(&server)
			.get_code("0x00000000000000000000000000000000000000ab")
			.await
			.unwrap();
		assert_eq!(code, vec![0x60, 0x80]);
		mock.assert_async().await;
	}

	#[tokio::test]
	async fn server_errors_are_transient_and_rpc_errors_permanent() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(POST).body_contains("eth_blockNumber");
				then.status(503);
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(POST).body_contains("eth_sendTransaction");
				then.status(200).json_body(json!({
					"jsonrpc": "2.0",
					"id": 1,
					"error": {"code": -32000, "message": "insufficient funds"}
				}));
			})
			.await;

		let client = client_for(&server);
		let err = client.block_number().await.unwrap_err();
		assert!(err.is_transient());

		let call = MethodCall {
			method: "0xa9059cbb".to_string(),
			args: vec![],
		};
		let err = client
			.submit("0x00000000000000000000000000000000000000ab", &call)
			.await
			.unwrap_err();
		assert!(matches!(err, ChainError::Rejected(ref m) if m.contains("insufficient funds")));
	}

	#[tokio::test]
	async fn query_logs_maps_topics_into_fields() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(POST).body_contains("eth_getLogs");
				then.status(200).json_body(json!({
					"jsonrpc": "2.0",
					"id": 1,
					"result": [{
						"address": "0x00000000000000000000000000000000000000ab",
						"blockNumber": "0x10",
						"transactionHash": "0xfeed",
						"logIndex": "0x0",
						"data": "0x01",
						"topics": ["0xddf2", "0x01", "0x02"]
					}]
				}));
			})
			.await;

		let records = client_for(&server)
			.query_logs(&LogFilter::default(), 0, 100)
			.await
			.unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].block_number, 16);
		assert_eq!(records[0].transaction_id, "0xfeed");
		assert_eq!(records[0].field_str("topic2"), Some("0x02"));
	}

	#[tokio::test]
	async fn reverted_receipt_is_a_rejection() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(POST).body_contains("eth_getTransactionReceipt");
				then.status(200).json_body(json!({
					"jsonrpc": "2.0",
					"id": 1,
					"result": {"blockNumber": "0x2a", "status": "0x0"}
				}));
			})
			.await;

		let handle = TxHandle {
			hash: "0xbeef".to_string(),
		};
		let err = client_for(&server).await_confirmation(&handle).await.unwrap_err();
		assert!(matches!(err, ChainError::Rejected(ref m) if m.contains("reverted")));
	}

	#[tokio::test]
	async fn missing_receipt_times_out() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(POST).body_contains("eth_getTransactionReceipt");
				then.status(200)
					.json_body(json!({"jsonrpc": "2.0", "id": 1, "result": null}));
			})
			.await;

		let handle = TxHandle {
			hash: "0xbeef".to_string(),
		};
		let err = client_for(&server).await_confirmation(&handle).await.unwrap_err();
		assert_eq!(err, ChainError::ConfirmationTimeout("0xbeef".to_string()));
	}
}
