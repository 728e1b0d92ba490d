//! Event types for inter-service communication.
//!
//! Handlers publish an event on the bus after a state change has been
//! committed. The notification listener and the live event stream react to
//! them; a failure on that side never undoes the change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main event type encompassing all shop events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum ShopEvent {
	/// Events from the order lifecycle.
	Order(OrderEvent),
	/// Events from the reimbursement ledger.
	Reimbursement(ReimbursementEvent),
}

/// Events related to order processing.
///
/// Every variant names the order and its owning user (`None` for guests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
	tag = "type",
	rename_all = "snake_case",
	rename_all_fields = "camelCase"
)]
pub enum OrderEvent {
	/// A checkout completed.
	Placed {
		order_id: String,
		user_id: Option<String>,
		customer: String,
		amount: Decimal,
	},
	/// The admin confirmed (or withdrew) that every item is available.
	AvailabilityConfirmed {
		order_id: String,
		user_id: Option<String>,
		confirmed: bool,
	},
	/// The customer says they paid.
	PaymentClaimed {
		order_id: String,
		user_id: Option<String>,
		customer: String,
	},
	/// The customer withdrew their payment claim.
	PaymentClaimRevoked {
		order_id: String,
		user_id: Option<String>,
		customer: String,
	},
	PaymentConfirmed {
		order_id: String,
		user_id: Option<String>,
	},
	Dispatched {
		order_id: String,
		user_id: Option<String>,
	},
	/// The customer confirmed (or withdrew confirmation of) receipt.
	DeliveryConfirmedByCustomer {
		order_id: String,
		user_id: Option<String>,
		confirmed: bool,
	},
	Delivered {
		order_id: String,
		user_id: Option<String>,
	},
	Cancelled {
		order_id: String,
		user_id: Option<String>,
		refund_amount: Decimal,
	},
	Deleted {
		order_id: String,
		user_id: Option<String>,
	},
}

impl OrderEvent {
	pub fn order_id(&self) -> &str {
		match self {
			OrderEvent::Placed { order_id, .. }
			| OrderEvent::AvailabilityConfirmed { order_id, .. }
			| OrderEvent::PaymentClaimed { order_id, .. }
			| OrderEvent::PaymentClaimRevoked { order_id, .. }
			| OrderEvent::PaymentConfirmed { order_id, .. }
			| OrderEvent::Dispatched { order_id, .. }
			| OrderEvent::DeliveryConfirmedByCustomer { order_id, .. }
			| OrderEvent::Delivered { order_id, .. }
			| OrderEvent::Cancelled { order_id, .. }
			| OrderEvent::Deleted { order_id, .. } => order_id,
		}
	}

	pub fn user_id(&self) -> Option<&str> {
		match self {
			OrderEvent::Placed { user_id, .. }
			| OrderEvent::AvailabilityConfirmed { user_id, .. }
			| OrderEvent::PaymentClaimed { user_id, .. }
			| OrderEvent::PaymentClaimRevoked { user_id, .. }
			| OrderEvent::PaymentConfirmed { user_id, .. }
			| OrderEvent::Dispatched { user_id, .. }
			| OrderEvent::DeliveryConfirmedByCustomer { user_id, .. }
			| OrderEvent::Delivered { user_id, .. }
			| OrderEvent::Cancelled { user_id, .. }
			| OrderEvent::Deleted { user_id, .. } => user_id.as_deref(),
		}
	}
}

/// Events related to reimbursement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
	tag = "type",
	rename_all = "snake_case",
	rename_all_fields = "camelCase"
)]
pub enum ReimbursementEvent {
	/// A payout was recorded and the outstanding orders were marked.
	Confirmed {
		reimbursement_id: String,
		amount: Decimal,
		orders_reimbursed: usize,
	},
}

impl ShopEvent {
	/// Whether the given user may observe this event on the live stream.
	/// Staff see everything.
	pub fn visible_to(&self, user_id: Option<&str>, is_staff: bool) -> bool {
		if is_staff {
			return true;
		}
		match self {
			ShopEvent::Order(event) => user_id.is_some() && event.user_id() == user_id,
			ShopEvent::Reimbursement(_) => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_event_wire_shape() {
		let event = ShopEvent::Order(OrderEvent::Dispatched {
			order_id: "o1".into(),
			user_id: Some("u1".into()),
		});
		assert_eq!(
			serde_json::to_value(&event).unwrap(),
			json!({
				"kind": "order",
				"event": {"type": "dispatched", "orderId": "o1", "userId": "u1"}
			})
		);
	}

	#[test]
	fn test_visibility() {
		let event = ShopEvent::Order(OrderEvent::Delivered {
			order_id: "o1".into(),
			user_id: Some("u1".into()),
		});
		assert!(event.visible_to(Some("u1"), false));
		assert!(!event.visible_to(Some("u2"), false));
		assert!(!event.visible_to(None, false));
		assert!(event.visible_to(None, true));

		let payout = ShopEvent::Reimbursement(ReimbursementEvent::Confirmed {
			reimbursement_id: "r1".into(),
			amount: Decimal::from(10),
			orders_reimbursed: 1,
		});
		assert!(!payout.visible_to(Some("u1"), false));
	}
}
