//! Order types for the shop.
//!
//! This module defines the order aggregate with its immutable line-item
//! snapshot, the delivery status values, the checkout input and the
//! normalised financial view used by reporting.

use crate::caller::Caller;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery status of an order.
///
/// Moves forward `pending -> dispatched -> delivered`, or to `cancelled`
/// from either of the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
	Pending,
	Dispatched,
	Delivered,
	Cancelled,
}

impl DeliveryStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			DeliveryStatus::Pending => "pending",
			DeliveryStatus::Dispatched => "dispatched",
			DeliveryStatus::Delivered => "delivered",
			DeliveryStatus::Cancelled => "cancelled",
		}
	}

	/// Delivered and cancelled orders never move again.
	pub fn is_terminal(&self) -> bool {
		matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
	}
}

impl fmt::Display for DeliveryStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DeliveryStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(DeliveryStatus::Pending),
			"dispatched" => Ok(DeliveryStatus::Dispatched),
			"delivered" => Ok(DeliveryStatus::Delivered),
			"cancelled" => Ok(DeliveryStatus::Cancelled),
			other => Err(format!("Invalid delivery status: {}", other)),
		}
	}
}

/// Snapshot of a purchased product taken at checkout.
///
/// Later edits to the product never change an existing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub category: String,
	#[serde(default)]
	pub brand: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selected_img: Option<String>,
	pub quantity: u32,
	pub price: Decimal,
	#[serde(default)]
	pub dmc: Decimal,
}

impl LineItem {
	/// Price plus surcharge for the whole quantity.
	pub fn line_total(&self) -> Decimal {
		(self.price + self.dmc) * Decimal::from(self.quantity)
	}

	/// Product revenue for the whole quantity, surcharge excluded.
	pub fn sale_total(&self) -> Decimal {
		self.price * Decimal::from(self.quantity)
	}

	/// Surcharge for the whole quantity.
	pub fn dmc_total(&self) -> Decimal {
		self.dmc * Decimal::from(self.quantity)
	}
}

/// One requested item in a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
	pub id: String,
	pub name: String,
	pub description: Option<String>,
	pub category: Option<String>,
	pub brand: Option<String>,
	pub selected_img: Option<String>,
	pub price: Decimal,
	pub dmc: Option<Decimal>,
	pub quantity: u32,
}

impl From<CheckoutItem> for LineItem {
	fn from(item: CheckoutItem) -> Self {
		Self {
			id: item.id,
			name: item.name,
			description: item.description.unwrap_or_default(),
			category: item.category.unwrap_or_default(),
			brand: item.brand.unwrap_or_default(),
			selected_img: item.selected_img,
			quantity: item.quantity,
			price: item.price,
			dmc: item.dmc.unwrap_or_default(),
		}
	}
}

/// Checkout input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
	pub items: Vec<CheckoutItem>,
	pub guest_email: Option<String>,
	pub guest_name: Option<String>,
	pub address: Option<String>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
	pub order_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub guest_token: Option<String>,
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	pub id: String,
	/// Owning user. `None` marks a guest order.
	pub user_id: Option<String>,
	pub guest_email: Option<String>,
	pub guest_name: Option<String>,
	/// Bearer secret a guest presents to act on the order.
	pub guest_token: Option<String>,
	/// Total charged, fixed at creation.
	pub amount: Decimal,
	/// Absent on records written before surcharges were tracked.
	#[serde(default)]
	pub total_dmc: Option<Decimal>,
	#[serde(default)]
	pub spf: Option<Decimal>,
	pub currency: String,
	pub products: Vec<LineItem>,
	pub address: Option<String>,
	pub create_date: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub payment_intent_id: String,
	#[serde(default)]
	pub payment_claimed: bool,
	#[serde(default)]
	pub payment_confirmed: bool,
	pub delivery_status: DeliveryStatus,
	#[serde(default)]
	pub admin_confirmed_availability: bool,
	#[serde(default)]
	pub admin_confirmed_availability_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub user_confirmed_delivery: bool,
	#[serde(default)]
	pub user_confirmed_delivery_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub cancelled: bool,
	#[serde(default)]
	pub cancelled_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub refund_amount: Option<Decimal>,
	#[serde(default)]
	pub reimbursed: bool,
	#[serde(default)]
	pub reimbursed_at: Option<DateTime<Utc>>,
}

impl Order {
	pub fn is_guest(&self) -> bool {
		self.user_id.is_none()
	}

	/// Financial view of this order, resolving legacy records.
	pub fn financials(&self) -> OrderFinancials<'_> {
		match (self.total_dmc, self.spf) {
			(Some(total_dmc), Some(spf)) => OrderFinancials::Settled {
				amount: self.amount,
				total_dmc,
				spf,
			},
			_ => OrderFinancials::Legacy {
				amount: self.amount,
				line_items: &self.products,
			},
		}
	}

	/// Name shown to staff for whoever is acting on the order: the signed-in
	/// caller's name or email, else the guest details on the order.
	pub fn customer_label(&self, caller: &Caller) -> String {
		caller
			.user()
			.and_then(|u| u.name.clone().or_else(|| u.email.clone()))
			.or_else(|| self.guest_name.clone())
			.or_else(|| self.guest_email.clone())
			.unwrap_or_else(|| "Guest".to_string())
	}

	/// Copy of the order safe to hand to anyone but its owner.
	pub fn without_guest_token(mut self) -> Self {
		self.guest_token = None;
		self
	}
}

/// Normalised financial view of an order.
///
/// Orders created before surcharges were stored carry neither `totalDmc`
/// nor `spf`. For those the surcharge is rebuilt from the line items and the
/// service fee is whatever the charged amount exceeds the line totals by.
#[derive(Debug, Clone, Copy)]
pub enum OrderFinancials<'a> {
	Settled {
		amount: Decimal,
		total_dmc: Decimal,
		spf: Decimal,
	},
	Legacy {
		amount: Decimal,
		line_items: &'a [LineItem],
	},
}

impl OrderFinancials<'_> {
	pub fn amount(&self) -> Decimal {
		match self {
			OrderFinancials::Settled { amount, .. } | OrderFinancials::Legacy { amount, .. } => *amount,
		}
	}

	pub fn total_dmc(&self) -> Decimal {
		match self {
			OrderFinancials::Settled { total_dmc, .. } => *total_dmc,
			OrderFinancials::Legacy { line_items, .. } => {
				line_items.iter().map(LineItem::dmc_total).sum()
			},
		}
	}

	/// Service fee. For legacy records this is the charged amount minus the
	/// line totals, which a malformed record can drive below zero.
	pub fn spf(&self) -> Decimal {
		match self {
			OrderFinancials::Settled { spf, .. } => *spf,
			OrderFinancials::Legacy { amount, line_items } => {
				let lines: Decimal = line_items.iter().map(LineItem::line_total).sum();
				*amount - lines
			},
		}
	}

	/// What the shop keeps once the surcharge and service fee are passed on.
	pub fn net_sale(&self) -> Decimal {
		self.amount() - self.total_dmc() - self.spf()
	}
}

/// One entry in the append-only reimbursement ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reimbursement {
	pub id: String,
	pub amount: Decimal,
	pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::caller::{AuthenticatedUser, Role};
	use serde_json::json;

	fn item(price: i64, dmc: i64, quantity: u32) -> LineItem {
		LineItem {
			id: "p1".into(),
			name: "Rice".into(),
			description: String::new(),
			category: String::new(),
			brand: String::new(),
			selected_img: None,
			quantity,
			price: Decimal::from(price),
			dmc: Decimal::from(dmc),
		}
	}

	#[test]
	fn test_line_item_totals() {
		let line = item(2300, 200, 2);
		assert_eq!(line.line_total(), Decimal::from(5000));
		assert_eq!(line.sale_total(), Decimal::from(4600));
		assert_eq!(line.dmc_total(), Decimal::from(400));
	}

	#[test]
	fn test_delivery_status_round_trips_lowercase() {
		assert_eq!(
			serde_json::to_value(DeliveryStatus::Dispatched).unwrap(),
			json!("dispatched")
		);
		assert_eq!("cancelled".parse::<DeliveryStatus>().unwrap(), DeliveryStatus::Cancelled);
		assert!("shipped".parse::<DeliveryStatus>().is_err());
		assert!(DeliveryStatus::Delivered.is_terminal());
		assert!(!DeliveryStatus::Dispatched.is_terminal());
	}

	#[test]
	fn test_legacy_record_deserializes_without_fee_fields() {
		let record = json!({
			"id": "o1",
			"userId": "u1",
			"guestEmail": null,
			"guestName": null,
			"guestToken": null,
			"amount": 5100,
			"currency": "NGN",
			"products": [{"id": "p1", "name": "Rice", "quantity": 2, "price": 2300, "dmc": 200}],
			"address": "Hall 3",
			"createDate": "2024-05-01T10:00:00Z",
			"updatedAt": "2024-05-01T10:00:00Z",
			"paymentIntentId": "mock_pi_1",
			"deliveryStatus": "pending"
		});
		let order: Order = serde_json::from_value(record).unwrap();
		assert!(!order.payment_confirmed);

		let financials = order.financials();
		assert!(matches!(financials, OrderFinancials::Legacy { .. }));
		assert_eq!(financials.total_dmc(), Decimal::from(400));
		assert_eq!(financials.spf(), Decimal::from(100));
		assert_eq!(financials.net_sale(), Decimal::from(4600));
	}

	#[test]
	fn test_legacy_fee_is_amount_minus_lines() {
		let lines = [item(1000, 0, 1)];
		let financials = OrderFinancials::Legacy {
			amount: Decimal::from(900),
			line_items: &lines,
		};
		assert_eq!(financials.spf(), Decimal::from(-100));
		// The shortfall is not paid out as extra net sale.
		assert_eq!(financials.net_sale(), Decimal::from(1000));
	}

	#[test]
	fn test_customer_label_prefers_signed_in_name() {
		let user = Caller::User(AuthenticatedUser {
			id: "u1".into(),
			role: Role::User,
			name: None,
			email: Some("ada@example.com".into()),
		});
		let mut order: Order = serde_json::from_value(json!({
			"id": "o1",
			"amount": 100,
			"currency": "NGN",
			"products": [],
			"createDate": "2024-05-01T10:00:00Z",
			"updatedAt": "2024-05-01T10:00:00Z",
			"paymentIntentId": "mock_pi_1",
			"deliveryStatus": "pending"
		}))
		.unwrap();

		assert_eq!(order.customer_label(&user), "ada@example.com");
		assert_eq!(order.customer_label(&Caller::Anonymous), "Guest");
		order.guest_email = Some("guest@example.com".into());
		assert_eq!(order.customer_label(&Caller::Anonymous), "guest@example.com");
		order.guest_name = Some("Bola".into());
		assert_eq!(order.customer_label(&Caller::Anonymous), "Bola");
	}
}
