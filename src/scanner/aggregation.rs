//! Folding event records into an index.
//!
//! An [`Aggregator`] derives a key and a value from each record and knows how to merge
//! two values. [`GroupByField`] and [`SumByField`] cover the common cases of
//! "group token ids by owner" and "accumulate balances per resource".

use crate::client::EventRecord;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::warn;

/// Caller-supplied key extraction and merge.
pub trait Aggregator: Send + Sync {
	type Key: Eq + Hash + Clone + Debug + Send;
	type Value: Send;

	/// Derive the key and value contributed by `record`, or `None` to ignore it.
	fn extract(&self, record: &EventRecord) -> Option<(Self::Key, Self::Value)>;

	/// Merge `incoming` into an existing accumulated value.
	fn merge(&self, accumulated: &mut Self::Value, incoming: Self::Value);
}

/// Mapping from derived key to accumulated value. Only grows during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationIndex<K: Eq + Hash, V> {
	entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for AggregationIndex<K, V> {
	fn default() -> Self {
		Self {
			entries: HashMap::new(),
		}
	}
}

impl<K: Eq + Hash + Clone + Debug + Send, V: Send> AggregationIndex<K, V> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Fold every record of a completed window. Returns how many records contributed.
	pub fn fold<A>(&mut self, aggregator: &A, records: &[EventRecord]) -> usize
	where
		A: Aggregator<Key = K, Value = V> + ?Sized,
	{
		let mut folded = 0;
		for record in records {
			let Some((key, value)) = aggregator.extract(record) else {
				continue;
			};
			match self.entries.get_mut(&key) {
				Some(accumulated) => aggregator.merge(accumulated, value),
				None => {
					self.entries.insert(key, value);
				}
			}
			folded += 1;
		}
		folded
	}

	pub fn get(&self, key: &K) -> Option<&V> {
		self.entries.get(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
		self.entries.iter()
	}

	/// Entries ordered by key, for stable reporting.
	pub fn sorted(&self) -> BTreeMap<&K, &V>
	where
		K: Ord,
	{
		self.entries.iter().collect()
	}

	pub fn into_inner(self) -> HashMap<K, V> {
		self.entries
	}
}

/// Groups the values of `value_field` into a set per distinct `key_field`.
#[derive(Debug, Clone)]
pub struct GroupByField {
	pub key_field: String,
	pub value_field: String,
}

impl GroupByField {
	pub fn new(key_field: impl Into<String>, value_field: impl Into<String>) -> Self {
		Self {
			key_field: key_field.into(),
			value_field: value_field.into(),
		}
	}
}

impl Aggregator for GroupByField {
	type Key = String;
	type Value = BTreeSet<String>;

	fn extract(&self, record: &EventRecord) -> Option<(String, BTreeSet<String>)> {
		let key = field_as_string(record, &self.key_field)?;
		let value = field_as_string(record, &self.value_field)?;
		Some((key, BTreeSet::from([value])))
	}

	fn merge(&self, accumulated: &mut BTreeSet<String>, incoming: BTreeSet<String>) {
		accumulated.extend(incoming);
	}
}

/// Sums the numeric `amount_field` per distinct `key_field`.
///
/// Amounts may be JSON numbers, decimal strings or `0x` hex quantities.
#[derive(Debug, Clone)]
pub struct SumByField {
	pub key_field: String,
	pub amount_field: String,
}

impl SumByField {
	pub fn new(key_field: impl Into<String>, amount_field: impl Into<String>) -> Self {
		Self {
			key_field: key_field.into(),
			amount_field: amount_field.into(),
		}
	}
}

impl Aggregator for SumByField {
	type Key = String;
	type Value = u128;

	fn extract(&self, record: &EventRecord) -> Option<(String, u128)> {
		let key = field_as_string(record, &self.key_field)?;
		let amount = record.fields.get(&self.amount_field).and_then(parse_amount);
		if amount.is_none() {
			warn!(
				"Ignoring record in tx {} at block {}: {} is not a numeric amount",
				record.transaction_id, record.block_number, self.amount_field
			);
		}
		Some((key, amount?))
	}

	fn merge(&self, accumulated: &mut u128, incoming: u128) {
		*accumulated = accumulated.saturating_add(incoming);
	}
}

fn field_as_string(record: &EventRecord, field: &str) -> Option<String> {
	match record.fields.get(field)? {
		Value::String(s) => Some(s.clone()),
		Value::Null => None,
		other => Some(other.to_string()),
	}
}

fn parse_amount(value: &Value) -> Option<u128> {
	match value {
		Value::Number(n) => n.as_u64().map(u128::from),
		Value::String(s) => match s.strip_prefix("0x") {
			Some(digits) => u128::from_str_radix(digits, 16).ok(),
			None => s.parse().ok(),
		},
		_ => None,
	}
}
