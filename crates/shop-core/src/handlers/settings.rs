//! Settings handler.
//!
//! Reads fall back to defaults when the record was never written; writes
//! upsert only the supplied fields.

use super::access::require_admin;
use super::OrderError;
use chrono::Utc;
use rust_decimal::Decimal;
use shop_storage::StorageService;
use shop_types::{Caller, Settings, SettingsPatch, StorageKey, SETTINGS_ID};
use std::sync::Arc;
use tracing::instrument;

pub struct SettingsHandler {
	storage: Arc<StorageService>,
	/// Service fee used until an admin stores one.
	default_spf: Decimal,
}

impl SettingsHandler {
	pub fn new(storage: Arc<StorageService>, default_spf: Decimal) -> Self {
		Self {
			storage,
			default_spf,
		}
	}

	/// Current settings. Public: the storefront shows bank details, hostels
	/// and the banner to everyone.
	pub async fn get(&self) -> Result<Settings, OrderError> {
		Ok(self
			.storage
			.find(StorageKey::Settings, SETTINGS_ID)
			.await?
			.unwrap_or_else(|| Settings::with_spf(self.default_spf)))
	}

	/// Flat service fee charged on each new order.
	pub async fn current_spf(&self) -> Result<Decimal, OrderError> {
		Ok(self.get().await?.spf)
	}

	#[instrument(skip_all)]
	pub async fn update(&self, caller: &Caller, patch: SettingsPatch) -> Result<Settings, OrderError> {
		let admin = require_admin(caller)?;
		let now = Utc::now();
		let default_spf = self.default_spf;

		let settings = self
			.storage
			.upsert(
				StorageKey::Settings,
				SETTINGS_ID,
				|| Settings::with_spf(default_spf),
				|settings: &mut Settings| {
					settings
						.apply(patch.clone(), now)
						.map_err(OrderError::Validation)
				},
			)
			.await?;

		tracing::info!(admin = %admin.id, spf = %settings.spf, "Settings updated");
		Ok(settings)
	}

	/// Validates a section update into a patch, after the role check, and
	/// applies it.
	pub async fn apply<U>(&self, caller: &Caller, update: U) -> Result<Settings, OrderError>
	where
		U: TryInto<SettingsPatch, Error = String>,
	{
		require_admin(caller)?;
		let patch = update.try_into().map_err(OrderError::Validation)?;
		self.update(caller, patch).await
	}
}
