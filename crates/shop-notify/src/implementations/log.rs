//! Push gateway that only writes messages to the log.
//!
//! Used in development and as a fallback when no real gateway is reachable.

use crate::{NotifierFactory, NotifierInterface, NotifierRegistry, NotifyError, SendReport};
use async_trait::async_trait;
use shop_types::{
	truncate_id, ConfigSchema, Field, FieldType, ImplementationRegistry, PushMessage, Schema,
	ValidationError,
};

pub struct LogNotifier {
	/// Log at info level instead of debug.
	verbose: bool,
}

impl LogNotifier {
	pub fn new(verbose: bool) -> Self {
		Self { verbose }
	}
}

#[async_trait]
impl NotifierInterface for LogNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}

	async fn send(&self, message: &PushMessage) -> Result<SendReport, NotifyError> {
		let tokens: Vec<String> = message.tokens.iter().map(|t| truncate_id(t)).collect();
		if self.verbose {
			tracing::info!(title = %message.title, body = %message.body, ?tokens, data = ?message.data, "Push notification");
		} else {
			tracing::debug!(title = %message.title, body = %message.body, ?tokens, "Push notification");
		}
		Ok(SendReport {
			delivered: message.tokens.len(),
			failed_tokens: Vec::new(),
		})
	}
}

pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("verbose", FieldType::Boolean)]).validate(config)
	}
}

/// Factory function to create a log notifier from configuration.
///
/// Configuration parameters:
/// - `verbose`: log at info instead of debug (default: true)
pub fn create_notifier(config: &toml::Value) -> Result<Box<dyn NotifierInterface>, NotifyError> {
	LogNotifierSchema
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;
	let verbose = config
		.get("verbose")
		.and_then(|v| v.as_bool())
		.unwrap_or(true);
	Ok(Box::new(LogNotifier::new(verbose)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = NotifierFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotifierRegistry for Registry {}
