//! Builder for constructing shop engines.
//!
//! Composes a [`ShopEngine`] from the configured storage backend and push
//! gateways using factory functions keyed by implementation name.

use crate::engine::{event_bus::EventBus, ShopEngine};
use shop_config::Config;
use shop_notify::{NotificationService, NotifierInterface, NotifyError};
use shop_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by name.
pub struct ShopFactories<SF, NF> {
	pub storage_factories: HashMap<String, SF>,
	pub notifier_factories: HashMap<String, NF>,
}

/// Builder for constructing a ShopEngine with pluggable implementations.
pub struct ShopBuilder {
	config: Config,
}

impl ShopBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine. Only the primary storage backend is opened; every
	/// configured push gateway is loaded.
	pub fn build<SF, NF>(self, factories: ShopFactories<SF, NF>) -> Result<ShopEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		NF: Fn(&toml::Value) -> Result<Box<dyn NotifierInterface>, NotifyError>,
	{
		let primary = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' has no configuration",
					primary
				))
			})?;
		let factory = factories
			.storage_factories
			.get(primary)
			.ok_or_else(|| BuilderError::MissingComponent(format!("storage '{}'", primary)))?;
		let backend = factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %primary, "Loaded");
		let storage = Arc::new(StorageService::new(backend));

		let mut gateways: HashMap<String, Box<dyn NotifierInterface>> = HashMap::new();
		for (name, config) in &self.config.notifications.implementations {
			let Some(factory) = factories.notifier_factories.get(name) else {
				tracing::warn!(component = "notifier", implementation = %name, "Unknown implementation, skipping");
				continue;
			};
			match factory(config) {
				Ok(gateway) => {
					gateways.insert(name.clone(), gateway);
					tracing::info!(component = "notifier", implementation = %name, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "notifier",
						implementation = %name,
						error = %e,
						"Failed to create notifier implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create notifier implementation '{}': {}",
						name, e
					)));
				},
			}
		}
		if gateways.is_empty() {
			tracing::warn!("No push gateways configured - notifications will only be stored");
		}
		let notifier = Arc::new(NotificationService::new(gateways));

		let event_bus = EventBus::new(self.config.shop.event_capacity);
		Ok(ShopEngine::new(self.config, storage, notifier, event_bus))
	}
}
