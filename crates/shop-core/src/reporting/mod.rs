//! Dashboard aggregations.
//!
//! Everything here is a pure function of an order snapshot (plus the
//! reimbursement ledger or user list where needed) and an explicit `now`.
//! Running the same function twice on the same input yields identical
//! output; ties are broken by id or label so map iteration order never
//! leaks into results. Legacy orders are read through
//! [`OrderFinancials`](shop_types::OrderFinancials).

pub mod breakdown;
pub mod timeseries;

pub use breakdown::{order_locations, product_performance, LocationStat, ProductPerformance};
pub use timeseries::{
	order_status_series, revenue_series, user_growth_series, GrowthBucket, RevenueBucket,
	StatusBucket, TimeRange,
};

use rust_decimal::Decimal;
use serde::Serialize;
use shop_types::{Order, Reimbursement};

/// Headline totals for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
	/// Σ amount over confirmed orders.
	pub total_sale: Decimal,
	pub total_dmc: Decimal,
	pub total_spf: Decimal,
	/// Seller margin of confirmed orders not yet reimbursed.
	pub to_reimburse: Decimal,
	pub total_reimbursed: Decimal,
	/// Σ refund over cancelled orders.
	pub refunds: Decimal,
	/// DMC carried by cancelled orders.
	pub refund_dmc: Decimal,
	pub total_orders: usize,
	pub paid_orders: usize,
	pub unpaid_orders: usize,
	pub cancelled_orders: usize,
}

/// Computes the dashboard totals.
pub fn summarize(orders: &[Order], reimbursements: &[Reimbursement]) -> FinancialSummary {
	let mut summary = FinancialSummary {
		total_orders: orders.len(),
		total_reimbursed: total_reimbursed(reimbursements),
		to_reimburse: to_reimburse(orders),
		..Default::default()
	};

	for order in orders {
		let financials = order.financials();
		if order.payment_confirmed {
			summary.paid_orders += 1;
			summary.total_sale += financials.amount();
			summary.total_dmc += financials.total_dmc();
			summary.total_spf += financials.spf();
		} else {
			summary.unpaid_orders += 1;
		}
		if order.cancelled {
			summary.cancelled_orders += 1;
			summary.refunds += order.refund_amount.unwrap_or_default();
			summary.refund_dmc += financials.total_dmc();
		}
	}
	summary
}

/// Σ (amount - dmc - spf) over confirmed, not yet reimbursed orders.
pub fn to_reimburse(orders: &[Order]) -> Decimal {
	orders
		.iter()
		.filter(|o| o.payment_confirmed && !o.reimbursed)
		.map(|o| o.financials().net_sale())
		.sum()
}

pub fn total_reimbursed(reimbursements: &[Reimbursement]) -> Decimal {
	reimbursements.iter().map(|r| r.amount).sum()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{line_item, sample_order};
	use chrono::Utc;

	fn settled(id: &str, paid: bool) -> Order {
		let mut order = sample_order(id, Some("u1"));
		order.products = vec![line_item("p1", 2300, 200, 2)];
		order.amount = Decimal::from(5100);
		order.total_dmc = Some(Decimal::from(400));
		order.spf = Some(Decimal::from(100));
		order.payment_confirmed = paid;
		order
	}

	#[test]
	fn test_summary_totals() {
		let mut reimbursed = settled("a", true);
		reimbursed.reimbursed = true;
		let outstanding = settled("b", true);
		let unpaid = settled("c", false);
		let mut cancelled = settled("d", true);
		cancelled.cancelled = true;
		cancelled.refund_amount = Some(Decimal::from(5100));

		let ledger = vec![Reimbursement {
			id: "r1".into(),
			amount: Decimal::from(4600),
			created_at: Utc::now(),
		}];
		let orders = vec![reimbursed, outstanding, unpaid, cancelled];
		let summary = summarize(&orders, &ledger);

		assert_eq!(summary.total_sale, Decimal::from(15300));
		assert_eq!(summary.total_dmc, Decimal::from(1200));
		assert_eq!(summary.total_spf, Decimal::from(300));
		// outstanding + cancelled-but-confirmed, each 5100 - 400 - 100
		assert_eq!(summary.to_reimburse, Decimal::from(9200));
		assert_eq!(summary.total_reimbursed, Decimal::from(4600));
		assert_eq!(summary.refunds, Decimal::from(5100));
		assert_eq!(summary.refund_dmc, Decimal::from(400));
		assert_eq!((summary.paid_orders, summary.unpaid_orders), (3, 1));
		assert_eq!(summary.cancelled_orders, 1);

		assert_eq!(summarize(&orders, &ledger), summary);
	}

	#[test]
	fn test_legacy_orders_use_recomputed_fees() {
		let mut legacy = settled("a", true);
		legacy.total_dmc = None;
		legacy.spf = None;
		let summary = summarize(&[legacy], &[]);
		assert_eq!(summary.total_dmc, Decimal::from(400));
		assert_eq!(summary.total_spf, Decimal::from(100));
		assert_eq!(summary.to_reimburse, Decimal::from(4600));
	}
}
