//! Order state machine implementation.
//!
//! Delivery status moves pending -> dispatched -> delivered, and pending or
//! dispatched -> cancelled. Delivered and cancelled are terminal. Reaching
//! delivered additionally needs the customer's confirmation of receipt.

use crate::handlers::OrderError;
use chrono::Utc;
use once_cell::sync::Lazy;
use shop_storage::StorageService;
use shop_types::{DeliveryStatus, Order, StorageKey};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Manages order state transitions and persistence
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Gets an order by ID
	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
		self.storage
			.find(StorageKey::Orders, order_id)
			.await?
			.ok_or_else(|| OrderError::NotFound("Order not found".into()))
	}

	/// Stores a new order
	pub async fn store_order(&self, order: &Order) -> Result<(), OrderError> {
		Ok(self.storage.store(StorageKey::Orders, &order.id, order).await?)
	}

	/// Loads every order, newest first.
	pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
		let mut orders: Vec<Order> = self.storage.list(StorageKey::Orders).await?;
		orders.sort_by(|a, b| b.create_date.cmp(&a.create_date));
		Ok(orders)
	}

	/// Atomically updates an order with a closure and persists it.
	///
	/// The closure may run more than once if another writer commits first,
	/// and sees the latest stored order each time. Returning an error
	/// leaves the order untouched.
	pub async fn update_order_with<F>(&self, order_id: &str, mut updater: F) -> Result<Order, OrderError>
	where
		F: FnMut(&mut Order) -> Result<(), OrderError>,
	{
		let now = Utc::now();
		self.storage
			.modify(StorageKey::Orders, order_id, |order: &mut Order| {
				updater(order)?;
				order.updated_at = now;
				Ok(())
			})
			.await
			.map_err(|e: OrderError| e.or_not_found("Order"))
	}

	/// Moves an order to `to` after `guard` accepts it and the transition is
	/// valid, then applies `effect`.
	///
	/// `guard` runs first so ownership failures take precedence over state
	/// failures.
	pub async fn transition<G, F>(
		&self,
		order_id: &str,
		to: DeliveryStatus,
		guard: G,
		mut effect: F,
	) -> Result<Order, OrderError>
	where
		G: Fn(&Order) -> Result<(), OrderError>,
		F: FnMut(&mut Order),
	{
		self.update_order_with(order_id, |order| {
			guard(order)?;
			Self::check_transition(order, to)?;
			order.delivery_status = to;
			effect(order);
			Ok(())
		})
		.await
	}

	/// Deletes an order once `check` accepts its current state.
	pub async fn remove_order_if<F>(&self, order_id: &str, check: F) -> Result<Order, OrderError>
	where
		F: Fn(&Order) -> Result<(), OrderError>,
	{
		self.storage
			.remove_if(StorageKey::Orders, order_id, check)
			.await
			.map_err(|e: OrderError| e.or_not_found("Order"))
	}

	/// Explains why `order` cannot move to `to`, if it cannot.
	pub fn check_transition(order: &Order, to: DeliveryStatus) -> Result<(), OrderError> {
		let from = order.delivery_status;
		if order.cancelled || from == DeliveryStatus::Cancelled {
			return Err(OrderError::InvalidState("Order already cancelled".into()));
		}
		match to {
			DeliveryStatus::Delivered => {
				if from == DeliveryStatus::Delivered {
					return Err(OrderError::InvalidState(
						"Order already marked as delivered".into(),
					));
				}
				if !order.user_confirmed_delivery {
					return Err(OrderError::InvalidState(
						"User has not confirmed delivery".into(),
					));
				}
			},
			DeliveryStatus::Cancelled if from == DeliveryStatus::Delivered => {
				return Err(OrderError::InvalidState(
					"Delivered orders cannot be cancelled".into(),
				));
			},
			DeliveryStatus::Dispatched if from == DeliveryStatus::Delivered => {
				return Err(OrderError::InvalidState(
					"Order already marked as delivered".into(),
				));
			},
			_ => {},
		}
		if !Self::is_valid_transition(from, to) {
			return Err(OrderError::InvalidState(format!(
				"Cannot move order from {} to {}",
				from, to
			)));
		}
		Ok(())
	}

	/// Checks if a state transition is valid
	fn is_valid_transition(from: DeliveryStatus, to: DeliveryStatus) -> bool {
		// Static transition table - each state maps to allowed next states.
		// Re-dispatching a dispatched order is allowed and re-notifies.
		static TRANSITIONS: Lazy<HashMap<DeliveryStatus, HashSet<DeliveryStatus>>> =
			Lazy::new(|| {
				let mut m = HashMap::new();
				m.insert(
					DeliveryStatus::Pending,
					HashSet::from([DeliveryStatus::Dispatched, DeliveryStatus::Cancelled]),
				);
				m.insert(
					DeliveryStatus::Dispatched,
					HashSet::from([
						DeliveryStatus::Dispatched,
						DeliveryStatus::Delivered,
						DeliveryStatus::Cancelled,
					]),
				);
				m.insert(DeliveryStatus::Delivered, HashSet::new()); // terminal
				m.insert(DeliveryStatus::Cancelled, HashSet::new()); // terminal
				m
			});

		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}
}
