//! Stock ledger.
//!
//! Quantities of repeated product ids are summed before checking or
//! writing. Checking never writes. Reserving re-checks each product inside
//! its atomic update and gives back what it took when any product falls
//! short. Restoring skips products deleted since the order was placed.

use crate::handlers::OrderError;
use chrono::Utc;
use shop_storage::{StorageError, StorageService};
use shop_types::{truncate_id, LineItem, Product, StorageKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Requested quantity of one product across an order's line items.
struct Demand<'a> {
	product_id: &'a str,
	name: &'a str,
	quantity: u32,
}

/// Folds line items into one demand per product, in first-seen order.
fn demands(items: &[LineItem]) -> Vec<Demand<'_>> {
	let mut positions: HashMap<&str, usize> = HashMap::new();
	let mut out: Vec<Demand<'_>> = Vec::new();
	for item in items {
		match positions.get(item.id.as_str()) {
			Some(&index) => out[index].quantity = out[index].quantity.saturating_add(item.quantity),
			None => {
				positions.insert(&item.id, out.len());
				out.push(Demand {
					product_id: &item.id,
					name: &item.name,
					quantity: item.quantity,
				});
			},
		}
	}
	out
}

pub struct StockLedger {
	storage: Arc<StorageService>,
}

impl StockLedger {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Verifies every product exists and has enough remaining stock.
	pub async fn check_availability(&self, items: &[LineItem]) -> Result<(), OrderError> {
		for demand in demands(items) {
			let product: Product = self
				.storage
				.find(StorageKey::Products, demand.product_id)
				.await?
				.ok_or_else(|| OrderError::NotFound(format!("Product not found: {}", demand.name)))?;

			if !product.can_fulfil(demand.quantity) {
				return Err(OrderError::InsufficientStock {
					product: product.name,
					available: product.remaining_stock,
					requested: demand.quantity,
				});
			}
		}
		Ok(())
	}

	/// Takes sold quantities out of stock.
	///
	/// Either every product is decremented or none is: a shortfall or a
	/// missing product puts back the quantities already taken.
	pub async fn reserve(&self, items: &[LineItem]) -> Result<(), OrderError> {
		let demands = demands(items);
		for (index, demand) in demands.iter().enumerate() {
			if let Err(e) = self.take(demand).await {
				for taken in &demands[..index] {
					self.put_back(taken).await;
				}
				return Err(e);
			}
		}
		Ok(())
	}

	async fn take(&self, demand: &Demand<'_>) -> Result<(), OrderError> {
		let now = Utc::now();
		let product = self
			.storage
			.modify(StorageKey::Products, demand.product_id, |product: &mut Product| {
				if !product.can_fulfil(demand.quantity) {
					return Err(OrderError::InsufficientStock {
						product: product.name.clone(),
						available: product.remaining_stock,
						requested: demand.quantity,
					});
				}
				product.take_stock(demand.quantity, now);
				Ok(())
			})
			.await
			.map_err(|e: OrderError| match e {
				OrderError::NotFound(_) => {
					OrderError::NotFound(format!("Product not found: {}", demand.name))
				},
				other => other,
			})?;

		tracing::debug!(
			product_id = %truncate_id(&product.id),
			remaining = product.remaining_stock,
			"Stock reserved"
		);
		Ok(())
	}

	async fn put_back(&self, demand: &Demand<'_>) {
		let now = Utc::now();
		let result = self
			.storage
			.modify(StorageKey::Products, demand.product_id, |product: &mut Product| {
				product.return_stock(demand.quantity, now);
				Ok::<(), StorageError>(())
			})
			.await;
		if let Err(e) = result {
			tracing::error!(
				product_id = %truncate_id(demand.product_id),
				quantity = demand.quantity,
				error = %e,
				"Failed to return reserved stock"
			);
		}
	}

	/// Puts quantities back, never above each product's lifetime stock.
	///
	/// Every product is attempted; the first failure is returned after the
	/// rest have been restored.
	pub async fn restore(&self, items: &[LineItem]) -> Result<(), OrderError> {
		let mut first_error = None;
		for demand in demands(items) {
			let result = self
				.storage
				.modify(StorageKey::Products, demand.product_id, |product: &mut Product| {
					product.return_stock(demand.quantity, Utc::now());
					Ok::<(), StorageError>(())
				})
				.await;

			match result {
				Ok(product) => {
					tracing::debug!(
						product_id = %truncate_id(&product.id),
						remaining = product.remaining_stock,
						"Stock restored"
					);
				},
				Err(StorageError::NotFound) => {
					tracing::warn!(
						product_id = %truncate_id(demand.product_id),
						"Product no longer exists, stock not adjusted"
					);
				},
				Err(e) => {
					tracing::error!(
						product_id = %truncate_id(demand.product_id),
						quantity = demand.quantity,
						error = %e,
						"Failed to restore stock"
					);
					first_error.get_or_insert(e);
				},
			}
		}
		match first_error {
			Some(e) => Err(e.into()),
			None => Ok(()),
		}
	}
}
