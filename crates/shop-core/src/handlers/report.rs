//! Dashboard reports for staff.
//!
//! Loads a snapshot of orders (and the ledger or user directory where a
//! report needs them) and hands it to the pure functions in
//! [`crate::reporting`].

use super::access::require_staff;
use super::reimbursement::ReimbursementHandler;
use super::users::UserDirectory;
use super::OrderError;
use crate::reporting::{self, FinancialSummary, TimeRange};
use crate::state::OrderStateMachine;
use chrono::Utc;
use shop_types::Caller;
use std::sync::Arc;

/// Number of entries in the best-seller report.
const TOP_PRODUCTS: usize = 5;

pub struct ReportHandler {
	state_machine: Arc<OrderStateMachine>,
	reimbursements: Arc<ReimbursementHandler>,
	users: Arc<UserDirectory>,
}

impl ReportHandler {
	pub fn new(
		state_machine: Arc<OrderStateMachine>,
		reimbursements: Arc<ReimbursementHandler>,
		users: Arc<UserDirectory>,
	) -> Self {
		Self {
			state_machine,
			reimbursements,
			users,
		}
	}

	pub async fn summary(&self, caller: &Caller) -> Result<FinancialSummary, OrderError> {
		require_staff(caller)?;
		let orders = self.state_machine.list_orders().await?;
		let ledger = self.reimbursements.records().await?;
		Ok(reporting::summarize(&orders, &ledger))
	}

	pub async fn revenue(
		&self,
		caller: &Caller,
		range: TimeRange,
	) -> Result<Vec<reporting::RevenueBucket>, OrderError> {
		require_staff(caller)?;
		let orders = self.state_machine.list_orders().await?;
		Ok(reporting::revenue_series(&orders, range, Utc::now()))
	}

	pub async fn order_status(&self, caller: &Caller) -> Result<Vec<reporting::StatusBucket>, OrderError> {
		require_staff(caller)?;
		let orders = self.state_machine.list_orders().await?;
		Ok(reporting::order_status_series(&orders, Utc::now()))
	}

	pub async fn product_performance(
		&self,
		caller: &Caller,
	) -> Result<Vec<reporting::ProductPerformance>, OrderError> {
		require_staff(caller)?;
		let orders = self.state_machine.list_orders().await?;
		Ok(reporting::product_performance(&orders, TOP_PRODUCTS))
	}

	pub async fn locations(&self, caller: &Caller) -> Result<Vec<reporting::LocationStat>, OrderError> {
		require_staff(caller)?;
		let orders = self.state_machine.list_orders().await?;
		Ok(reporting::order_locations(&orders))
	}

	pub async fn user_growth(&self, caller: &Caller) -> Result<Vec<reporting::GrowthBucket>, OrderError> {
		require_staff(caller)?;
		let orders = self.state_machine.list_orders().await?;
		let users = self.users.list().await?;
		Ok(reporting::user_growth_series(&users, &orders, Utc::now()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{admin, customer, manager, place_order, put_product, test_engine};
	use rust_decimal::Decimal;

	#[tokio::test]
	async fn test_dashboard_after_sales() {
		let engine = test_engine().await;
		put_product(engine.storage(), "p1", 2300, 200, 10).await;
		let (paid, _) = place_order(&engine, &customer("u1"), &[("p1", 2300, 200, 2)]).await;
		let (cancelled, _) = place_order(&engine, &customer("u1"), &[("p1", 2300, 200, 1)]).await;
		engine.orders().confirm_payment(&admin(), &paid).await.unwrap();
		engine.orders().cancel(&admin(), &cancelled).await.unwrap();

		let reports = engine.reports();
		let summary = reports.summary(&manager()).await.unwrap();
		assert_eq!(summary.total_sale, Decimal::from(5100));
		assert_eq!(summary.to_reimburse, Decimal::from(4600));
		assert_eq!(summary.refunds, Decimal::ZERO);
		assert_eq!(summary.total_orders, 2);

		let revenue = reports.revenue(&manager(), TimeRange::SevenDays).await.unwrap();
		assert_eq!(revenue.len(), 7);
		assert_eq!(revenue[6].revenue, Decimal::from(5100));
		assert_eq!(revenue[6].orders, 2);

		let top = reports.product_performance(&admin()).await.unwrap();
		assert_eq!(top[0].quantity, 2);

		let growth = reports.user_growth(&admin()).await.unwrap();
		let today = growth.last().unwrap();
		assert_eq!((today.new_users, today.repeat_customers), (1, 1));

		assert_eq!(reports.summary(&manager()).await.unwrap(), summary);
	}

	#[tokio::test]
	async fn test_reports_are_staff_only() {
		let engine = test_engine().await;
		assert!(matches!(
			engine.reports().summary(&customer("u1")).await,
			Err(OrderError::Forbidden(_))
		));
		assert!(matches!(
			engine.reports().locations(&Caller::Anonymous).await,
			Err(OrderError::Unauthorized(_))
		));
	}
}
