//! Order lifecycle handler.
//!
//! Every action follows the same order of checks: caller role, then the
//! order's existence, then ownership, then the order's state. Ownership and
//! state are evaluated inside the atomic update so a concurrent change can
//! never slip between the check and the write. Events are published only
//! after the write committed.

use super::access::{
	authorize_customer, authorize_viewer, require_admin, require_identity, require_user,
};
use super::OrderError;
use crate::engine::event_bus::EventBus;
use crate::state::{OrderStateMachine, StockLedger};
use chrono::Utc;
use rust_decimal::Decimal;
use shop_types::{truncate_id, Caller, DeliveryStatus, Order, OrderEvent, ShopEvent};
use std::sync::Arc;
use tracing::instrument;

pub struct OrderHandler {
	state_machine: Arc<OrderStateMachine>,
	ledger: Arc<StockLedger>,
	event_bus: EventBus,
}

fn ensure_not_cancelled(order: &Order) -> Result<(), OrderError> {
	if order.cancelled || order.delivery_status == DeliveryStatus::Cancelled {
		return Err(OrderError::InvalidState("Order already cancelled".into()));
	}
	Ok(())
}

impl OrderHandler {
	pub fn new(
		state_machine: Arc<OrderStateMachine>,
		ledger: Arc<StockLedger>,
		event_bus: EventBus,
	) -> Self {
		Self {
			state_machine,
			ledger,
			event_bus,
		}
	}

	fn publish(&self, event: OrderEvent) {
		self.event_bus.publish(ShopEvent::Order(event)).ok();
	}

	/// Returns a committed order's quantities to stock. The order change
	/// stands either way, so a failure is logged rather than returned.
	async fn return_stock(&self, order: &Order) {
		if let Err(e) = self.ledger.restore(&order.products).await {
			tracing::error!(
				order_id = %truncate_id(&order.id),
				error = %e,
				"Stock not fully restored for order"
			);
		}
	}

	/// Fetches one order for its owner, a guest-token holder or staff.
	pub async fn get(
		&self,
		caller: &Caller,
		order_id: &str,
		guest_token: Option<&str>,
	) -> Result<Order, OrderError> {
		require_identity(caller, guest_token)?;
		let order = self.state_machine.get_order(order_id).await?;
		authorize_viewer(caller, &order, guest_token)?;
		Ok(order.without_guest_token())
	}

	/// The caller's orders, or every order for staff, newest first.
	pub async fn list(&self, caller: &Caller) -> Result<Vec<Order>, OrderError> {
		let user = require_user(caller)?;
		let orders = self.state_machine.list_orders().await?;
		Ok(orders
			.into_iter()
			.filter(|order| user.is_staff() || order.user_id.as_deref() == Some(user.id.as_str()))
			.map(Order::without_guest_token)
			.collect())
	}

	/// Generic status update from the admin order table. Every target goes
	/// through the same guarded transition as its dedicated action.
	pub async fn update_delivery_status(
		&self,
		caller: &Caller,
		order_id: &str,
		status: DeliveryStatus,
	) -> Result<Order, OrderError> {
		match status {
			DeliveryStatus::Dispatched => self.dispatch(caller, order_id).await,
			DeliveryStatus::Delivered => self.deliver(caller, order_id).await,
			DeliveryStatus::Cancelled => self.cancel(caller, order_id).await,
			DeliveryStatus::Pending => {
				require_admin(caller)?;
				self.state_machine.get_order(order_id).await?;
				Err(OrderError::InvalidState(
					"Orders cannot be moved back to pending".into(),
				))
			},
		}
	}

	/// Admin attests every item is really available, letting the customer pay.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn confirm_availability(
		&self,
		caller: &Caller,
		order_id: &str,
		confirmed: bool,
	) -> Result<Order, OrderError> {
		require_admin(caller)?;
		let now = Utc::now();
		let order = self
			.state_machine
			.update_order_with(order_id, |order| {
				ensure_not_cancelled(order)?;
				order.admin_confirmed_availability = confirmed;
				order.admin_confirmed_availability_at = confirmed.then_some(now);
				Ok(())
			})
			.await?;

		tracing::info!(confirmed, "Availability updated");
		self.publish(OrderEvent::AvailabilityConfirmed {
			order_id: order.id.clone(),
			user_id: order.user_id.clone(),
			confirmed,
		});
		Ok(order.without_guest_token())
	}

	/// Customer claims (or withdraws the claim) that they paid.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn set_payment_claim(
		&self,
		caller: &Caller,
		order_id: &str,
		claimed: bool,
		guest_token: Option<&str>,
	) -> Result<Order, OrderError> {
		require_identity(caller, guest_token)?;
		let order = self
			.state_machine
			.update_order_with(order_id, |order| {
				authorize_customer(caller, order, guest_token)?;
				ensure_not_cancelled(order)?;
				if order.payment_confirmed {
					return Err(OrderError::InvalidState("Payment already confirmed".into()));
				}
				order.payment_claimed = claimed;
				Ok(())
			})
			.await?;

		tracing::info!(claimed, "Payment claim updated");
		let customer = order.customer_label(caller);
		self.publish(if claimed {
			OrderEvent::PaymentClaimed {
				order_id: order.id.clone(),
				user_id: order.user_id.clone(),
				customer,
			}
		} else {
			OrderEvent::PaymentClaimRevoked {
				order_id: order.id.clone(),
				user_id: order.user_id.clone(),
				customer,
			}
		});
		Ok(order.without_guest_token())
	}

	/// Admin verifies the payment. One-way.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn confirm_payment(&self, caller: &Caller, order_id: &str) -> Result<Order, OrderError> {
		require_admin(caller)?;
		let order = self
			.state_machine
			.update_order_with(order_id, |order| {
				ensure_not_cancelled(order)?;
				order.payment_confirmed = true;
				Ok(())
			})
			.await?;

		tracing::info!(amount = %order.amount, "Payment confirmed");
		self.publish(OrderEvent::PaymentConfirmed {
			order_id: order.id.clone(),
			user_id: order.user_id.clone(),
		});
		Ok(order.without_guest_token())
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn dispatch(&self, caller: &Caller, order_id: &str) -> Result<Order, OrderError> {
		require_admin(caller)?;
		let order = self
			.state_machine
			.transition(order_id, DeliveryStatus::Dispatched, |_| Ok(()), |_| {})
			.await?;

		tracing::info!("Order dispatched");
		self.publish(OrderEvent::Dispatched {
			order_id: order.id.clone(),
			user_id: order.user_id.clone(),
		});
		Ok(order.without_guest_token())
	}

	/// Customer confirms (or withdraws confirmation of) receipt, which
	/// unlocks the admin's final delivery step.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn set_customer_delivery_confirmation(
		&self,
		caller: &Caller,
		order_id: &str,
		confirmed: bool,
		guest_token: Option<&str>,
	) -> Result<Order, OrderError> {
		require_identity(caller, guest_token)?;
		let now = Utc::now();
		let order = self
			.state_machine
			.update_order_with(order_id, |order| {
				authorize_customer(caller, order, guest_token)?;
				ensure_not_cancelled(order)?;
				if order.delivery_status == DeliveryStatus::Delivered {
					return Err(OrderError::InvalidState(
						"Order already marked as delivered".into(),
					));
				}
				order.user_confirmed_delivery = confirmed;
				order.user_confirmed_delivery_at = confirmed.then_some(now);
				Ok(())
			})
			.await?;

		tracing::info!(confirmed, "Customer delivery confirmation updated");
		self.publish(OrderEvent::DeliveryConfirmedByCustomer {
			order_id: order.id.clone(),
			user_id: order.user_id.clone(),
			confirmed,
		});
		Ok(order.without_guest_token())
	}

	/// Admin completes a dispatched order the customer confirmed receiving.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn deliver(&self, caller: &Caller, order_id: &str) -> Result<Order, OrderError> {
		require_admin(caller)?;
		let order = self
			.state_machine
			.transition(order_id, DeliveryStatus::Delivered, |_| Ok(()), |_| {})
			.await?;

		tracing::info!("Order delivered");
		self.publish(OrderEvent::Delivered {
			order_id: order.id.clone(),
			user_id: order.user_id.clone(),
		});
		Ok(order.without_guest_token())
	}

	/// Cancels an order, refunding it in full if payment was confirmed and
	/// putting its quantities back into stock.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn cancel(&self, caller: &Caller, order_id: &str) -> Result<Order, OrderError> {
		require_admin(caller)?;
		let now = Utc::now();
		let order = self
			.state_machine
			.transition(order_id, DeliveryStatus::Cancelled, |_| Ok(()), |order| {
				order.cancelled = true;
				order.cancelled_at = Some(now);
				order.refund_amount = Some(if order.payment_confirmed {
					order.amount
				} else {
					Decimal::ZERO
				});
			})
			.await?;

		// Only the request that won the transition gets here, so stock is
		// restored exactly once.
		self.return_stock(&order).await;

		let refund_amount = order.refund_amount.unwrap_or_default();
		tracing::info!(refund = %refund_amount, "Order cancelled");
		self.publish(OrderEvent::Cancelled {
			order_id: order.id.clone(),
			user_id: order.user_id.clone(),
			refund_amount,
		});
		Ok(order.without_guest_token())
	}

	/// Hard-deletes an unpaid pending order.
	///
	/// Beyond removing the row, the order's quantities go back to stock so a
	/// deleted order does not keep units out of sale.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn delete(&self, caller: &Caller, order_id: &str) -> Result<(), OrderError> {
		let user = require_user(caller)?;
		let order = self
			.state_machine
			.remove_order_if(order_id, |order| {
				if !user.is_admin() {
					authorize_customer(caller, order, None)?;
				}
				if order.payment_claimed || order.delivery_status != DeliveryStatus::Pending {
					return Err(OrderError::InvalidState(
						"Only unpaid pending orders can be deleted".into(),
					));
				}
				Ok(())
			})
			.await?;

		self.return_stock(&order).await;

		tracing::info!(by = %user.id, "Order deleted");
		self.publish(OrderEvent::Deleted {
			order_id: order.id,
			user_id: order.user_id,
		});
		Ok(())
	}

	/// Replaces the delivery address of the caller's own order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn update_address(
		&self,
		caller: &Caller,
		order_id: &str,
		address: String,
		guest_token: Option<&str>,
	) -> Result<Order, OrderError> {
		require_identity(caller, guest_token)?;
		let address = address.trim().to_string();
		if address.is_empty() {
			return Err(OrderError::Validation("Address is required".into()));
		}
		let order = self
			.state_machine
			.update_order_with(order_id, |order| {
				authorize_customer(caller, order, guest_token)?;
				order.address = Some(address.clone());
				Ok(())
			})
			.await?;

		tracing::info!("Address updated");
		Ok(order.without_guest_token())
	}
}
