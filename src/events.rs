//! Event system for run progress.
//!
//! The scanner and the batch mutator report what they do as [`RunEvent`]s. Handlers
//! registered on an [`EventDispatcher`] turn those into logs, reports, or test
//! assertions without the engine knowing about any of them.

use crate::client::ErrorKind;
use crate::error::RunError;
use crate::runner::RunSummary;
use crate::scanner::ScanWindow;
use std::time::Duration;
use tracing::{info, warn};

/// Events that occur during a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
	/// A batch of work items is about to be processed
	BatchStarted {
		batch_index: usize,
		batch_count: usize,
		size: usize,
	},
	/// A work item was confirmed and checkpointed
	ItemSucceeded { key: String },
	/// A work item failed permanently or exhausted its retries
	ItemFailed {
		key: String,
		error_kind: ErrorKind,
		message: String,
	},
	/// A work item was found to be applied already
	ItemSkipped { key: String },
	/// Pacing delay before the next batch
	BatchPaused { batch_index: usize, delay: Duration },
	/// A scan window was queried and folded
	WindowScanned { window: ScanWindow, records: usize },
	/// A scan window exhausted its retries and became a gap
	WindowFailed { window: ScanWindow, error: String },
	/// The run finished
	RunCompleted { summary: RunSummary },
}

/// Trait for handling run events.
#[async_trait::async_trait]
pub trait RunEventHandler: Send + Sync {
	/// Handle a run event.
	async fn handle(&mut self, event: &RunEvent) -> Result<(), RunError>;

	/// Get the name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order. A failing handler is logged and does not
/// stop the others or the run.
#[derive(Default)]
pub struct EventDispatcher {
	handlers: Vec<Box<dyn RunEventHandler>>,
}

impl EventDispatcher {
	/// Create a new, empty event dispatcher.
	pub fn new() -> Self {
		Self::default()
	}

	/// A dispatcher with a [`LoggingEventHandler`] already registered.
	pub fn with_logging() -> Self {
		let mut dispatcher = Self::new();
		dispatcher.register_handler(Box::new(LoggingEventHandler));
		dispatcher
	}

	/// Register a new event handler.
	pub fn register_handler(&mut self, handler: Box<dyn RunEventHandler>) {
		self.handlers.push(handler);
	}

	/// Dispatch an event to all registered handlers.
	pub async fn dispatch(&mut self, event: &RunEvent) {
		for handler in &mut self.handlers {
			if let Err(e) = handler.handle(event).await {
				tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
			}
		}
	}
}

/// Writes every event to the tracing log.
pub struct LoggingEventHandler;

#[async_trait::async_trait]
impl RunEventHandler for LoggingEventHandler {
	async fn handle(&mut self, event: &RunEvent) -> Result<(), RunError> {
		match event {
			RunEvent::BatchStarted {
				batch_index,
				batch_count,
				size,
			} => info!(
				"Starting batch {}/{} ({} items)",
				batch_index + 1,
				batch_count,
				size
			),
			RunEvent::ItemSucceeded { key } => info!("Item {} succeeded", key),
			RunEvent::ItemFailed {
				key,
				error_kind,
				message,
			} => warn!("Item {} failed ({}): {}", key, error_kind, message),
			RunEvent::ItemSkipped { key } => info!("Item {} already applied, skipped", key),
			RunEvent::BatchPaused { batch_index, delay } => {
				info!("Batch {} done, pausing {:?}", batch_index + 1, delay)
			}
			RunEvent::WindowScanned { window, records } => {
				tracing::debug!("Window {} returned {} records", window, records)
			}
			RunEvent::WindowFailed { window, error } => {
				warn!("Window {} recorded as gap: {}", window, error)
			}
			RunEvent::RunCompleted { summary } => info!("Run completed: {}", summary),
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"LoggingEventHandler"
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	/// Keeps every event it sees for later assertions.
	#[derive(Clone, Default)]
	pub struct RecordingHandler {
		pub events: Arc<Mutex<Vec<RunEvent>>>,
	}

	impl RecordingHandler {
		pub fn events(&self) -> Vec<RunEvent> {
			self.events.lock().unwrap().clone()
		}
	}

	#[async_trait::async_trait]
	impl RunEventHandler for RecordingHandler {
		async fn handle(&mut self, event: &RunEvent) -> Result<(), RunError> {
			self.events.lock().unwrap().push(event.clone());
			Ok(())
		}

		fn name(&self) -> &'static str {
			"RecordingHandler"
		}
	}

	struct FailingHandler;

	#[async_trait::async_trait]
	impl RunEventHandler for FailingHandler {
		async fn handle(&mut self, _event: &RunEvent) -> Result<(), RunError> {
			Err(RunError::Config(crate::error::ConfigError::Invalid("boom".into())))
		}

		fn name(&self) -> &'static str {
			"FailingHandler"
		}
	}

	#[tokio::test]
	async fn failing_handler_does_not_block_others() {
		let recorder = RecordingHandler::default();
		let mut dispatcher = EventDispatcher::new();
		dispatcher.register_handler(Box::new(FailingHandler));
		dispatcher.register_handler(Box::new(recorder.clone()));

		let event = RunEvent::ItemSucceeded {
			key: "a".to_string(),
		};
		dispatcher.dispatch(&event).await;

		assert_eq!(recorder.events(), vec![event]);
	}
}
