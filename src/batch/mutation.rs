//!
//! Per-item mutation behaviour.
//!
//! [`Mutation`] is what the batch mutator drives for every work item. [`SubmitMutation`]
//! is the ledger-backed implementation: it reads the call from the item's payload,
//! submits it under the retry policy, then waits for confirmation without retrying.

use super::types::WorkItem;
use crate::client::{ChainClient, ChainError, MethodCall, Receipt, is_valid_address};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Trait for applying one work item to the ledger
#[async_trait::async_trait]
pub trait Mutation: Send + Sync {
	/// Whether the item's effect is already present on the ledger.
	///
	/// Checked before `apply` so a resumed run does not reapply non-idempotent work.
	async fn already_applied(&self, _item: &WorkItem) -> Result<bool, ChainError> {
		Ok(false)
	}

	/// Apply the item and wait for the ledger to confirm it.
	async fn apply(&self, item: &WorkItem) -> Result<Receipt, ChainError>;
}

/// Shape of a work item payload understood by [`SubmitMutation`].
#[derive(Debug, Clone, Deserialize)]
struct CallPayload {
	/// Overrides the mutation's default target.
	#[serde(default)]
	target: Option<String>,
	method: String,
	#[serde(default)]
	args: Vec<Value>,
	/// Read-only call whose result equals `equals` once the item is applied.
	#[serde(default)]
	skip_if: Option<AppliedCheck>,
}

#[derive(Debug, Clone, Deserialize)]
struct AppliedCheck {
	method: String,
	#[serde(default)]
	args: Vec<Value>,
	equals: Value,
}

/// Submits the call described by each item's payload and awaits its confirmation.
pub struct SubmitMutation<C: ChainClient + ?Sized> {
	client: Arc<C>,
	retry: RetryPolicy,
	default_target: Option<String>,
}

impl<C: ChainClient + ?Sized> SubmitMutation<C> {
	pub fn new(client: Arc<C>, retry: RetryPolicy, default_target: Option<String>) -> Self {
		Self {
			client,
			retry,
			default_target,
		}
	}

	fn parse(&self, item: &WorkItem) -> Result<(String, CallPayload), ChainError> {
		let payload: CallPayload = serde_json::from_value(item.payload.clone()).map_err(|e| {
			ChainError::InvalidInput(format!("payload of {} is not a call: {}", item.key, e))
		})?;

		let target = payload
			.target
			.clone()
			.or_else(|| self.default_target.clone())
			.ok_or_else(|| ChainError::InvalidInput(format!("{} has no target address", item.key)))?;
		if !is_valid_address(&target) {
			return Err(ChainError::InvalidInput(format!(
				"{} targets invalid address {:?}",
				item.key, target
			)));
		}
		Ok((target, payload))
	}
}

#[async_trait::async_trait]
impl<C: ChainClient + ?Sized> Mutation for SubmitMutation<C> {
	async fn already_applied(&self, item: &WorkItem) -> Result<bool, ChainError> {
		let (target, payload) = self.parse(item)?;
		let Some(check) = payload.skip_if else {
			return Ok(false);
		};

		let call = MethodCall {
			method: check.method,
			args: check.args,
		};
		let label = format!("applied check for {}", item.key);
		let current = self
			.retry
			.retry(&label, || self.client.call(&target, &call))
			.await?;
		debug!("Applied check for {} returned {}", item.key, current);
		Ok(current == check.equals)
	}

	async fn apply(&self, item: &WorkItem) -> Result<Receipt, ChainError> {
		let (target, payload) = self.parse(item)?;
		let call = MethodCall {
			method: payload.method,
			args: payload.args,
		};

		let label = format!("submit {}", item.key);
		let handle = self
			.retry
			.retry(&label, || self.client.submit(&target, &call))
			.await?;

		// A confirmation failure is final for this attempt; resubmitting could double-apply.
		self.client.await_confirmation(&handle).await
	}
}
