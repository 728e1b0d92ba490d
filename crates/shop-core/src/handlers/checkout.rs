//! Checkout handler.
//!
//! Turns a cart into an order: validates the request, checks stock for
//! every line before anything is written, prices the order, persists it and
//! only then takes the quantities out of stock. Taking stock re-checks each
//! product atomically; when another checkout got there first the saved
//! order is voided and the shortfall reported.

use super::settings::SettingsHandler;
use super::users::UserDirectory;
use super::OrderError;
use crate::engine::event_bus::EventBus;
use crate::state::{OrderStateMachine, StockLedger};
use chrono::Utc;
use rust_decimal::Decimal;
use shop_types::{
	generate_guest_token, generate_id, round_to_minor_units, truncate_id, Caller, CheckoutReceipt,
	DeliveryStatus, LineItem, NewOrder, Order, OrderEvent, ShopEvent,
};
use std::sync::Arc;
use tracing::instrument;

/// Order totals computed at checkout and frozen on the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
	/// Lines plus service fee.
	pub amount: Decimal,
	pub total_dmc: Decimal,
	pub spf: Decimal,
}

impl Pricing {
	/// Prices `items` with a flat service fee, rounding to `minor_units`.
	pub fn compute(items: &[LineItem], spf: Decimal, minor_units: u32) -> Self {
		let lines: Decimal = items.iter().map(LineItem::line_total).sum();
		let total_dmc: Decimal = items.iter().map(LineItem::dmc_total).sum();
		let spf = round_to_minor_units(spf, minor_units);
		Self {
			amount: round_to_minor_units(lines, minor_units) + spf,
			total_dmc: round_to_minor_units(total_dmc, minor_units),
			spf,
		}
	}
}

pub struct CheckoutHandler {
	state_machine: Arc<OrderStateMachine>,
	ledger: Arc<StockLedger>,
	settings: Arc<SettingsHandler>,
	users: Arc<UserDirectory>,
	event_bus: EventBus,
	currency: String,
	minor_units: u32,
}

impl CheckoutHandler {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		state_machine: Arc<OrderStateMachine>,
		ledger: Arc<StockLedger>,
		settings: Arc<SettingsHandler>,
		users: Arc<UserDirectory>,
		event_bus: EventBus,
		currency: impl Into<String>,
		minor_units: u32,
	) -> Self {
		Self {
			state_machine,
			ledger,
			settings,
			users,
			event_bus,
			currency: currency.into(),
			minor_units,
		}
	}

	/// Places an order for `caller`.
	///
	/// Guests receive a token that stands in for authentication on their
	/// order from then on.
	#[instrument(skip_all, fields(items = request.items.len(), guest = caller.user().is_none()))]
	pub async fn checkout(&self, caller: &Caller, request: NewOrder) -> Result<CheckoutReceipt, OrderError> {
		validate_request(caller, &request)?;
		let line_items: Vec<LineItem> = request.items.into_iter().map(LineItem::from).collect();

		self.ledger.check_availability(&line_items).await?;

		let spf = self.settings.current_spf().await?;
		let pricing = Pricing::compute(&line_items, spf, self.minor_units);
		let user = caller.user();
		let guest_token = user.is_none().then(generate_guest_token);
		let now = Utc::now();

		let order = Order {
			id: generate_id(),
			user_id: user.map(|u| u.id.clone()),
			guest_email: if user.is_none() { request.guest_email } else { None },
			guest_name: if user.is_none() { request.guest_name } else { None },
			guest_token: guest_token.clone(),
			amount: pricing.amount,
			total_dmc: Some(pricing.total_dmc),
			spf: Some(pricing.spf),
			currency: self.currency.clone(),
			products: line_items,
			address: request.address,
			create_date: now,
			updated_at: now,
			payment_intent_id: format!("mock_payment_{}", generate_id()),
			payment_claimed: false,
			payment_confirmed: false,
			delivery_status: DeliveryStatus::Pending,
			admin_confirmed_availability: false,
			admin_confirmed_availability_at: None,
			user_confirmed_delivery: false,
			user_confirmed_delivery_at: None,
			cancelled: false,
			cancelled_at: None,
			refund_amount: None,
			reimbursed: false,
			reimbursed_at: None,
		};

		self.state_machine.store_order(&order).await?;
		if let Err(e) = self.ledger.reserve(&order.products).await {
			self.void(&order.id).await;
			return Err(e);
		}
		if let Some(user) = user {
			self.users.touch(user).await;
		}

		tracing::info!(
			order_id = %truncate_id(&order.id),
			amount = %order.amount,
			spf = %pricing.spf,
			"Order placed"
		);

		self.event_bus
			.publish(ShopEvent::Order(OrderEvent::Placed {
				order_id: order.id.clone(),
				user_id: order.user_id.clone(),
				customer: order.customer_label(caller),
				amount: order.amount,
			}))
			.ok();

		Ok(CheckoutReceipt {
			order_id: order.id,
			guest_token,
		})
	}

	/// Removes an order whose stock could not be taken.
	async fn void(&self, order_id: &str) {
		if let Err(e) = self.state_machine.remove_order_if(order_id, |_| Ok(())).await {
			tracing::error!(
				order_id = %truncate_id(order_id),
				error = %e,
				"Failed to void order after stock reservation failed"
			);
		}
	}
}

fn validate_request(caller: &Caller, request: &NewOrder) -> Result<(), OrderError> {
	if request.items.is_empty() {
		return Err(OrderError::Validation("No items in cart".into()));
	}
	for item in &request.items {
		if item.id.trim().is_empty() {
			return Err(OrderError::Validation("Every item needs a product id".into()));
		}
		if item.quantity == 0 {
			return Err(OrderError::Validation(format!(
				"Quantity for {} must be at least 1",
				item.name
			)));
		}
		if item.price.is_sign_negative() {
			return Err(OrderError::Validation(format!(
				"Price for {} cannot be negative",
				item.name
			)));
		}
		if item.dmc.is_some_and(|dmc| dmc.is_sign_negative()) {
			return Err(OrderError::Validation(format!(
				"DMC for {} cannot be negative",
				item.name
			)));
		}
	}
	if caller.user().is_none() {
		match request.guest_email.as_deref().map(str::trim) {
			Some(email) if email.contains('@') => {},
			Some(_) => return Err(OrderError::Validation("Invalid guest email".into())),
			None => return Err(OrderError::Validation("Guest email is required".into())),
		}
	}
	Ok(())
}
