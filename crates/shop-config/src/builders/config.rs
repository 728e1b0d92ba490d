//! Configuration builder for tests and local runs.
//!
//! Produces a `Config` backed by in-memory storage and the logging push
//! gateway unless told otherwise.

use crate::{ApiConfig, Config, NotificationsConfig, ShopConfig, StorageConfig};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	shop_id: String,
	currency: String,
	minor_units: u32,
	default_spf: Decimal,
	storage_primary: String,
	notifiers: Vec<String>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			shop_id: "test-shop".to_string(),
			currency: "NGN".to_string(),
			minor_units: 2,
			default_spf: Decimal::from(shop_types::DEFAULT_SPF),
			storage_primary: "memory".to_string(),
			notifiers: vec!["log".to_string()],
			api: None,
		}
	}

	pub fn shop_id(mut self, id: impl Into<String>) -> Self {
		self.shop_id = id.into();
		self
	}

	pub fn currency(mut self, currency: impl Into<String>, minor_units: u32) -> Self {
		self.currency = currency.into();
		self.minor_units = minor_units;
		self
	}

	pub fn default_spf(mut self, spf: Decimal) -> Self {
		self.default_spf = spf;
		self
	}

	/// Sets the primary storage implementation. It is registered with an
	/// empty configuration table.
	pub fn storage_primary(mut self, primary: impl Into<String>) -> Self {
		self.storage_primary = primary.into();
		self
	}

	/// Replaces the push gateways, each registered with an empty table.
	pub fn notifiers(mut self, names: &[&str]) -> Self {
		self.notifiers = names.iter().map(|name| name.to_string()).collect();
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let empty = || toml::Value::Table(toml::Table::new());
		Config {
			shop: ShopConfig {
				id: self.shop_id,
				currency: self.currency,
				minor_units: self.minor_units,
				default_spf: self.default_spf,
				event_capacity: 1000,
			},
			storage: StorageConfig {
				implementations: HashMap::from([(self.storage_primary.clone(), empty())]),
				primary: self.storage_primary,
			},
			notifications: NotificationsConfig {
				implementations: self
					.notifiers
					.into_iter()
					.map(|name| (name, empty()))
					.collect(),
				admin_url: "/admin/manage-orders".to_string(),
			},
			api: self.api,
		}
	}
}
