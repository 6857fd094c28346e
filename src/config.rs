//! Run configuration and the work-item feed.
//!
//! Everything a run needs (endpoint, retry and pacing knobs, checkpoint location and the
//! job itself) comes from one JSON file. Network settings are never read from process
//! state. Validation collects every problem before reporting so a config can be fixed in
//! one pass.

use crate::batch::WorkItem;
use crate::checkpoint::ResumePolicy;
use crate::client::{LogFilter, is_valid_address};
use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_base_delay_ms")]
	pub base_delay_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: default_max_attempts(),
			base_delay_ms: default_base_delay_ms(),
		}
	}
}

impl RetryConfig {
	pub fn policy(&self) -> RetryPolicy {
		RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
	#[serde(default = "default_batch_size")]
	pub batch_size: usize,
	#[serde(default = "default_inter_batch_delay_ms")]
	pub inter_batch_delay_ms: u64,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			batch_size: default_batch_size(),
			inter_batch_delay_ms: default_inter_batch_delay_ms(),
		}
	}
}

impl BatchConfig {
	pub fn inter_batch_delay(&self) -> Duration {
		Duration::from_millis(self.inter_batch_delay_ms)
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
	#[serde(default = "default_window_size")]
	pub window_size: u64,
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
	/// Delay between window queries.
	#[serde(default)]
	pub pacing_ms: u64,
	#[serde(default)]
	pub filter: LogFilter,
}

impl Default for ScanConfig {
	fn default() -> Self {
		Self {
			window_size: default_window_size(),
			concurrency: default_concurrency(),
			pacing_ms: 0,
			filter: LogFilter::default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
	#[serde(default = "default_deployment_interval_ms")]
	pub interval_ms: u64,
	#[serde(default = "default_deployment_attempts")]
	pub max_attempts: u32,
}

impl Default for DeploymentConfig {
	fn default() -> Self {
		Self {
			interval_ms: default_deployment_interval_ms(),
			max_attempts: default_deployment_attempts(),
		}
	}
}

impl DeploymentConfig {
	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval_ms)
	}
}

/// Receipt polling for submitted mutations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmationConfig {
	#[serde(default = "default_receipt_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_confirmation_timeout_ms")]
	pub timeout_ms: u64,
}

impl Default for ConfirmationConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_receipt_poll_interval_ms(),
			timeout_ms: default_confirmation_timeout_ms(),
		}
	}
}

impl ConfirmationConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}
}

/// How a scan folds its records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum AggregationConfig {
	/// Collect the set of `value_field` values per `key_field`.
	GroupBy { key_field: String, value_field: String },
	/// Sum `amount_field` per `key_field`.
	SumBy { key_field: String, amount_field: String },
}

/// The work a run performs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobConfig {
	Scan {
		from_block: u64,
		/// Resolved to the current head when unset.
		#[serde(default)]
		to_block: Option<u64>,
		aggregation: AggregationConfig,
	},
	Mutate {
		items_path: String,
		/// Address used when an item's payload names none.
		#[serde(default)]
		target: Option<String>,
		/// Poll for code at `target` before submitting anything.
		#[serde(default)]
		await_deployment: bool,
		/// Node-managed account that submits the calls.
		#[serde(default)]
		sender: Option<String>,
	},
}

/// Complete configuration for a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
	pub endpoint: String,
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
	#[serde(default)]
	pub retry: RetryConfig,
	#[serde(default)]
	pub batch: BatchConfig,
	#[serde(default)]
	pub scan: ScanConfig,
	#[serde(default)]
	pub deployment: DeploymentConfig,
	#[serde(default)]
	pub confirmation: ConfirmationConfig,
	#[serde(default = "default_checkpoint_path")]
	pub checkpoint_path: String,
	#[serde(default)]
	pub resume: ResumePolicy,
	pub job: JobConfig,
}

impl RunConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	/// Check every value and report all problems together.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let mut errors = Vec::new();

		if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
			errors.push(format!("endpoint must be an http(s) URL, got {:?}", self.endpoint));
		}
		if self.request_timeout_ms == 0 {
			errors.push("request_timeout_ms must be greater than 0".to_string());
		}
		if self.retry.max_attempts == 0 {
			errors.push("retry.max_attempts must be at least 1".to_string());
		}
		if self.batch.batch_size == 0 {
			errors.push("batch.batch_size must be at least 1".to_string());
		}
		if self.scan.window_size == 0 {
			errors.push("scan.window_size must be at least 1".to_string());
		}
		if self.scan.concurrency == 0 {
			errors.push("scan.concurrency must be at least 1".to_string());
		}
		if let Some(address) = &self.scan.filter.address {
			if !is_valid_address(address) {
				errors.push(format!("scan.filter.address {:?} is not a valid address", address));
			}
		}
		if self.deployment.max_attempts == 0 {
			errors.push("deployment.max_attempts must be at least 1".to_string());
		}
		if self.confirmation.poll_interval_ms == 0 {
			errors.push("confirmation.poll_interval_ms must be greater than 0".to_string());
		}
		if self.confirmation.timeout_ms < self.confirmation.poll_interval_ms {
			errors.push(format!(
				"confirmation.timeout_ms {} is shorter than confirmation.poll_interval_ms {}",
				self.confirmation.timeout_ms, self.confirmation.poll_interval_ms
			));
		}
		if self.checkpoint_path.is_empty() {
			errors.push("checkpoint_path cannot be empty".to_string());
		}

		match &self.job {
			JobConfig::Scan {
				from_block,
				to_block: Some(to_block),
				..
			} if from_block > to_block => {
				errors.push(format!(
					"job.from_block {} is after job.to_block {}",
					from_block, to_block
				));
			}
			JobConfig::Scan { .. } => {}
			JobConfig::Mutate {
				items_path,
				target,
				await_deployment,
				sender,
			} => {
				if items_path.is_empty() {
					errors.push("job.items_path cannot be empty".to_string());
				}
				match target {
					Some(address) if !is_valid_address(address) => {
						errors.push(format!("job.target {:?} is not a valid address", address))
					}
					None if *await_deployment => {
						errors.push("job.await_deployment requires job.target".to_string())
					}
					_ => {}
				}
				if let Some(address) = sender {
					if !is_valid_address(address) {
						errors.push(format!("job.sender {:?} is not a valid address", address));
					}
				}
			}
		}

		if errors.is_empty() {
			Ok(())
		} else {
			Err(ConfigError::Invalid(errors.join("; ")))
		}
	}
}

/// Load and validate a run configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
	let path = path.as_ref();
	let path_str = path.display().to_string();

	let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
		path: path_str.clone(),
		source: e,
	})?;

	load_config_from_str(&content, &path_str)
}

/// Load and validate a run configuration from a JSON string.
pub fn load_config_from_str(content: &str, source_name: &str) -> Result<RunConfig, ConfigError> {
	let config: RunConfig = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
		path: source_name.to_string(),
		source: e,
	})?;

	config.validate()?;

	Ok(config)
}

/// Read the work-item feed: a JSON array of `{key, payload}` objects.
pub fn load_work_items<P: AsRef<Path>>(path: P) -> Result<Vec<WorkItem>, ConfigError> {
	let path = path.as_ref();
	let path_str = path.display().to_string();

	let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
		path: path_str.clone(),
		source: e,
	})?;

	serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
		path: path_str,
		source: e,
	})
}

/// Reject an empty feed or one that repeats a key.
pub fn validate_work_items(items: &[WorkItem]) -> Result<(), ConfigError> {
	if items.is_empty() {
		return Err(ConfigError::Invalid("work item list is empty".to_string()));
	}

	let mut seen = HashSet::with_capacity(items.len());
	let duplicates: Vec<&str> = items
		.iter()
		.filter(|item| !seen.insert(item.key.as_str()))
		.map(|item| item.key.as_str())
		.collect();
	if !duplicates.is_empty() {
		return Err(ConfigError::Invalid(format!(
			"duplicate work item keys: {}",
			duplicates.join(", ")
		)));
	}

	if let Some(item) = items.iter().find(|item| item.key.is_empty()) {
		return Err(ConfigError::Invalid(format!(
			"work item with payload {} has an empty key",
			item.payload
		)));
	}
	Ok(())
}

fn default_max_attempts() -> u32 {
	5
}

fn default_base_delay_ms() -> u64 {
	500
}

fn default_batch_size() -> usize {
	20
}

fn default_inter_batch_delay_ms() -> u64 {
	3_000
}

fn default_window_size() -> u64 {
	10_000
}

fn default_concurrency() -> usize {
	1
}

fn default_deployment_interval_ms() -> u64 {
	2_000
}

fn default_deployment_attempts() -> u32 {
	30
}

fn default_receipt_poll_interval_ms() -> u64 {
	2_000
}

fn default_confirmation_timeout_ms() -> u64 {
	120_000
}

fn default_request_timeout_ms() -> u64 {
	30_000
}

fn default_checkpoint_path() -> String {
	"checkpoints.jsonl".to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use std::io::Write;

	const MUTATE_CONFIG: &str = r#"{
		"endpoint": "http://127.0.0.1:8545",
		"batch": { "batch_size": 10 },
		"checkpoint_path": "./run/checkpoints.jsonl",
		"resume": "retry_failed",
		"job": {
			"kind": "mutate",
			"items_path": "./items.json",
			"target": "0x00000000000000000000000000000000000000ab",
			"await_deployment": true
		}
	}"#;

	#[test]
	fn test_load_valid_config_with_defaults() {
		let config = load_config_from_str(MUTATE_CONFIG, "run.json").unwrap();
		assert_eq!(config.batch.batch_size, 10);
		assert_eq!(config.batch.inter_batch_delay_ms, 3_000);
		assert_eq!(config.retry, RetryConfig::default());
		assert_eq!(config.scan.window_size, 10_000);
		assert_eq!(config.resume, ResumePolicy::RetryFailed);
		assert_eq!(config.confirmation.poll_interval(), Duration::from_secs(2));
		assert_eq!(config.confirmation.timeout(), Duration::from_secs(120));
		assert!(matches!(
			config.job,
			JobConfig::Mutate {
				await_deployment: true,
				..
			}
		));
	}

	#[test]
	fn test_scan_job_parses() {
		let config = load_config_from_str(
			r#"{
				"endpoint": "https://rpc.example.org",
				"job": {
					"kind": "scan",
					"from_block": 0,
					"to_block": 25000,
					"aggregation": { "sum_by": { "key_field": "topic2", "amount_field": "data" } }
				}
			}"#,
			"run.json",
		)
		.unwrap();

		assert_eq!(
			config.job,
			JobConfig::Scan {
				from_block: 0,
				to_block: Some(25_000),
				aggregation: AggregationConfig::SumBy {
					key_field: "topic2".into(),
					amount_field: "data".into(),
				},
			}
		);
	}

	#[test]
	fn test_confirmation_settings() {
		let config = load_config_from_str(
			r#"{
				"endpoint": "http://127.0.0.1:8545",
				"confirmation": { "poll_interval_ms": 250, "timeout_ms": 5000 },
				"job": { "kind": "mutate", "items_path": "i" }
			}"#,
			"run.json",
		)
		.unwrap();
		assert_eq!(config.confirmation.poll_interval(), Duration::from_millis(250));
		assert_eq!(config.confirmation.timeout(), Duration::from_secs(5));

		let result = load_config_from_str(
			r#"{
				"endpoint": "http://127.0.0.1:8545",
				"confirmation": { "poll_interval_ms": 0, "timeout_ms": 0 },
				"job": { "kind": "mutate", "items_path": "i" }
			}"#,
			"run.json",
		);
		match result.unwrap_err() {
			ConfigError::Invalid(message) => assert!(message.contains("confirmation.poll_interval_ms")),
			e => panic!("Expected Invalid error, got {:?}", e),
		}
	}

	#[test]
	fn test_unknown_field_rejected() {
		let result = load_config_from_str(
			r#"{"endpoint": "http://x", "mystery": 1, "job": {"kind": "mutate", "items_path": "i"}}"#,
			"run.json",
		);
		match result.unwrap_err() {
			ConfigError::Parse { .. } => {}
			e => panic!("Expected Parse error, got {:?}", e),
		}
	}

	#[test]
	fn test_validation_collects_every_error() {
		let result = load_config_from_str(
			r#"{
				"endpoint": "ftp://nope",
				"retry": { "max_attempts": 0 },
				"batch": { "batch_size": 0 },
				"job": { "kind": "mutate", "items_path": "i", "target": "0x12" }
			}"#,
			"run.json",
		);
		let message = match result.unwrap_err() {
			ConfigError::Invalid(message) => message,
			e => panic!("Expected Invalid error, got {:?}", e),
		};
		assert!(message.contains("endpoint"));
		assert!(message.contains("retry.max_attempts"));
		assert!(message.contains("batch.batch_size"));
		assert!(message.contains("job.target"));
	}

	#[test]
	fn test_missing_file_is_read_error() {
		let result = load_config("/definitely/not/here.json");
		assert!(matches!(result, Err(ConfigError::FileRead { .. })));
	}

	#[test]
	fn test_work_items_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		let items = json!([
			{ "key": "mint-1", "payload": { "method": "0x40c10f19", "args": [1] } },
			{ "key": "mint-2" }
		]);
		write!(file, "{}", items).unwrap();

		let loaded = load_work_items(file.path()).unwrap();
		assert_eq!(loaded.len(), 2);
		assert_eq!(loaded[0].key, "mint-1");
		assert_eq!(loaded[1].payload, serde_json::Value::Null);
		assert!(validate_work_items(&loaded).is_ok());
	}

	#[test]
	fn test_duplicate_and_empty_feeds_rejected() {
		assert!(validate_work_items(&[]).is_err());

		let items = vec![
			WorkItem::new("a", json!(1)),
			WorkItem::new("b", json!(2)),
			WorkItem::new("a", json!(3)),
		];
		match validate_work_items(&items).unwrap_err() {
			ConfigError::Invalid(message) => assert!(message.contains("a")),
			e => panic!("Expected Invalid error, got {:?}", e),
		}
	}
}
