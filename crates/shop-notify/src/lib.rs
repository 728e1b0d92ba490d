//! Push notification delivery for the shop.
//!
//! This module hands push messages to one or more configured gateways. The
//! gateways themselves (FCM relays, webhooks) are out of process; the shop
//! only knows how to reach them. Delivery is best-effort: a failing gateway
//! is logged and never propagates to the order flow that triggered it.

use async_trait::async_trait;
use futures::future::join_all;
use shop_types::{ConfigSchema, ImplementationRegistry, PushMessage};
use std::collections::HashMap;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod log;
	pub mod webhook;
}

/// Errors that can occur while delivering push messages.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// The gateway could not be reached.
	#[error("Network error: {0}")]
	Network(String),
	/// The gateway answered but refused the message.
	#[error("Gateway rejected message: {0}")]
	Rejected(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Outcome of handing a message to one gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
	/// Number of tokens the gateway accepted.
	pub delivered: usize,
	/// Tokens the gateway reported as invalid or unregistered.
	pub failed_tokens: Vec<String>,
}

/// Trait implemented by every push gateway.
#[async_trait]
pub trait NotifierInterface: Send + Sync {
	/// Returns the configuration schema for this gateway.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Sends one message to all of its tokens.
	async fn send(&self, message: &PushMessage) -> Result<SendReport, NotifyError>;
}

/// Type alias for notifier factory functions.
pub type NotifierFactory = fn(&toml::Value) -> Result<Box<dyn NotifierInterface>, NotifyError>;

/// Registry trait for push gateway implementations.
pub trait NotifierRegistry: ImplementationRegistry<Factory = NotifierFactory> {}

/// Get all registered push gateway implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotifierFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Fans a message out to every configured gateway.
pub struct NotificationService {
	gateways: HashMap<String, Box<dyn NotifierInterface>>,
}

impl NotificationService {
	pub fn new(gateways: HashMap<String, Box<dyn NotifierInterface>>) -> Self {
		Self { gateways }
	}

	/// A service without gateways drops every message.
	pub fn disabled() -> Self {
		Self::new(HashMap::new())
	}

	pub fn is_enabled(&self) -> bool {
		!self.gateways.is_empty()
	}

	/// Sends `message` through every gateway concurrently.
	///
	/// Never fails. Gateway errors are logged and the combined report of the
	/// gateways that succeeded is returned.
	pub async fn notify(&self, message: &PushMessage) -> SendReport {
		if message.tokens.is_empty() || self.gateways.is_empty() {
			tracing::debug!(title = %message.title, "No push recipients, skipping");
			return SendReport::default();
		}

		let sends = self.gateways.iter().map(|(name, gateway)| async move {
			(name, gateway.send(message).await)
		});

		let mut combined = SendReport::default();
		for (name, result) in join_all(sends).await {
			match result {
				Ok(report) => {
					combined.delivered += report.delivered;
					combined.failed_tokens.extend(report.failed_tokens);
				},
				Err(e) => {
					tracing::warn!(gateway = %name, error = %e, title = %message.title, "Push delivery failed");
				},
			}
		}
		combined.failed_tokens.sort();
		combined.failed_tokens.dedup();
		combined
	}
}
