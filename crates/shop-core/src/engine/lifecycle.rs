//! Startup and shutdown for the shop engine.

use super::{EngineError, ShopEngine};

impl ShopEngine {
	/// Checks that storage is reachable and logs the effective settings.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let settings = self
			.settings
			.get()
			.await
			.map_err(|e| EngineError::Service(format!("Failed to read settings: {}", e)))?;
		tracing::info!(
			shop_id = %self.config.shop.id,
			currency = %self.config.shop.currency,
			spf = %settings.spf,
			"Initializing shop engine"
		);
		Ok(())
	}

	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!(
			subscribers = self.event_bus.receiver_count(),
			"Shutting down shop engine"
		);
		Ok(())
	}
}
