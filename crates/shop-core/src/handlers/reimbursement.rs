//! Reimbursement handler.
//!
//! A reimbursement records a payout to the seller and settles every
//! confirmed order that was not yet settled, all stamped with the same
//! instant. The ledger is append-only. When settling fails partway the
//! record and the orders already settled are rolled back.

use super::access::{require_admin, require_staff};
use super::OrderError;
use crate::engine::event_bus::EventBus;
use crate::state::OrderStateMachine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shop_storage::StorageService;
use shop_types::{
	generate_id, truncate_id, Caller, Reimbursement, ReimbursementEvent, ShopEvent, StorageKey,
};
use std::sync::Arc;
use tracing::instrument;

pub struct ReimbursementHandler {
	storage: Arc<StorageService>,
	state_machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
}

impl ReimbursementHandler {
	pub fn new(
		storage: Arc<StorageService>,
		state_machine: Arc<OrderStateMachine>,
		event_bus: EventBus,
	) -> Self {
		Self {
			storage,
			state_machine,
			event_bus,
		}
	}

	/// Records a payout of `amount` and marks outstanding orders reimbursed.
	///
	/// Returns the total reimbursed so far.
	#[instrument(skip_all, fields(amount = %amount))]
	pub async fn confirm(&self, caller: &Caller, amount: Decimal) -> Result<Decimal, OrderError> {
		require_admin(caller)?;
		if amount <= Decimal::ZERO {
			return Err(OrderError::Validation("Invalid amount".into()));
		}

		let prior_total = self.total_unchecked().await?;
		let now = Utc::now();
		let record = Reimbursement {
			id: generate_id(),
			amount,
			created_at: now,
		};
		self.storage
			.store(StorageKey::Reimbursements, &record.id, &record)
			.await?;

		let orders = match self.state_machine.list_orders().await {
			Ok(orders) => orders,
			Err(e) => {
				self.roll_back(&record, &[], now).await;
				return Err(e);
			},
		};
		let mut settled: Vec<String> = Vec::new();
		for order in orders {
			if !order.payment_confirmed || order.reimbursed {
				continue;
			}
			let result = self
				.state_machine
				.update_order_with(&order.id, |order| {
					if order.payment_confirmed && !order.reimbursed {
						order.reimbursed = true;
						order.reimbursed_at = Some(now);
					}
					Ok(())
				})
				.await;
			match result {
				Ok(updated) if updated.reimbursed_at == Some(now) => settled.push(updated.id),
				Ok(_) => {},
				// Deleted since listing
				Err(OrderError::NotFound(_)) => {},
				Err(e) => {
					self.roll_back(&record, &settled, now).await;
					return Err(e);
				},
			}
		}

		let total = prior_total + amount;
		tracing::info!(orders = settled.len(), total = %total, "Reimbursement recorded");
		self.event_bus
			.publish(ShopEvent::Reimbursement(ReimbursementEvent::Confirmed {
				reimbursement_id: record.id,
				amount,
				orders_reimbursed: settled.len(),
			}))
			.ok();
		Ok(total)
	}

	/// Undoes a partly applied [`confirm`](Self::confirm): clears the flags it
	/// set on `settled` orders and drops the ledger record.
	async fn roll_back(&self, record: &Reimbursement, settled: &[String], at: DateTime<Utc>) {
		for order_id in settled {
			let result = self
				.state_machine
				.update_order_with(order_id, |order| {
					if order.reimbursed_at == Some(at) {
						order.reimbursed = false;
						order.reimbursed_at = None;
					}
					Ok(())
				})
				.await;
			if let Err(e) = result {
				tracing::error!(
					order_id = %truncate_id(order_id),
					error = %e,
					"Failed to roll back reimbursed order"
				);
			}
		}
		if let Err(e) = self
			.storage
			.remove(StorageKey::Reimbursements, &record.id)
			.await
		{
			tracing::error!(
				reimbursement_id = %truncate_id(&record.id),
				error = %e,
				"Failed to remove reimbursement record"
			);
		}
	}

	/// Sum of every recorded reimbursement.
	pub async fn total(&self, caller: &Caller) -> Result<Decimal, OrderError> {
		require_staff(caller)?;
		self.total_unchecked().await
	}

	/// Every reimbursement, newest first.
	pub async fn list(&self, caller: &Caller) -> Result<Vec<Reimbursement>, OrderError> {
		require_staff(caller)?;
		let mut records = self.records().await?;
		records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(records)
	}

	pub(crate) async fn records(&self) -> Result<Vec<Reimbursement>, OrderError> {
		Ok(self.storage.list(StorageKey::Reimbursements).await?)
	}

	async fn total_unchecked(&self) -> Result<Decimal, OrderError> {
		Ok(self.records().await?.iter().map(|r| r.amount).sum())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{
		admin, customer, engine_with_faults, manager, place_order, put_product, test_engine,
	};

	#[tokio::test]
	async fn test_confirm_settles_confirmed_orders_only() {
		let engine = test_engine().await;
		put_product(engine.storage(), "p1", 1000, 100, 20).await;
		let (paid_a, _) = place_order(&engine, &customer("u1"), &[("p1", 1000, 100, 1)]).await;
		let (paid_b, _) = place_order(&engine, &customer("u2"), &[("p1", 1000, 100, 2)]).await;
		let (unpaid, _) = place_order(&engine, &customer("u3"), &[("p1", 1000, 100, 1)]).await;
		engine.orders().confirm_payment(&admin(), &paid_a).await.unwrap();
		engine.orders().confirm_payment(&admin(), &paid_b).await.unwrap();

		let total = engine
			.reimbursements()
			.confirm(&admin(), Decimal::from(2700))
			.await
			.unwrap();
		assert_eq!(total, Decimal::from(2700));

		let a = engine.state_machine().get_order(&paid_a).await.unwrap();
		let b = engine.state_machine().get_order(&paid_b).await.unwrap();
		let c = engine.state_machine().get_order(&unpaid).await.unwrap();
		assert!(a.reimbursed && b.reimbursed);
		assert_eq!(a.reimbursed_at, b.reimbursed_at);
		assert!(!c.reimbursed);
		assert!(c.reimbursed_at.is_none());

		let total = engine
			.reimbursements()
			.confirm(&admin(), Decimal::from(300))
			.await
			.unwrap();
		assert_eq!(total, Decimal::from(3000));
		let a_again = engine.state_machine().get_order(&paid_a).await.unwrap();
		assert_eq!(a_again.reimbursed_at, a.reimbursed_at);
		assert_eq!(engine.reimbursements().list(&manager()).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_non_positive_amount_is_rejected() {
		let engine = test_engine().await;
		for amount in [Decimal::ZERO, Decimal::from(-5)] {
			let err = engine
				.reimbursements()
				.confirm(&admin(), amount)
				.await
				.unwrap_err();
			assert!(matches!(err, OrderError::Validation(_)));
		}
		assert_eq!(
			engine.reimbursements().total(&admin()).await.unwrap(),
			Decimal::ZERO
		);
	}

	#[tokio::test]
	async fn test_roles() {
		let engine = test_engine().await;
		assert!(matches!(
			engine.reimbursements().confirm(&manager(), Decimal::ONE).await,
			Err(OrderError::Forbidden(_))
		));
		assert!(matches!(
			engine.reimbursements().total(&customer("u1")).await,
			Err(OrderError::Forbidden(_))
		));
	}

	#[tokio::test]
	async fn test_failed_settlement_rolls_back_record_and_orders() {
		let (engine, fault) = engine_with_faults();
		put_product(engine.storage(), "p1", 1000, 100, 20).await;
		let (paid_a, _) = place_order(&engine, &customer("u1"), &[("p1", 1000, 100, 1)]).await;
		let (paid_b, _) = place_order(&engine, &customer("u2"), &[("p1", 1000, 100, 1)]).await;
		engine.orders().confirm_payment(&admin(), &paid_a).await.unwrap();
		engine.orders().confirm_payment(&admin(), &paid_b).await.unwrap();

		fault.fail_writes_to(&format!("orders:{}", paid_a));
		let err = engine
			.reimbursements()
			.confirm(&admin(), Decimal::from(1800))
			.await
			.unwrap_err();
		fault.heal();

		assert!(matches!(err, OrderError::Storage(_)));
		for order_id in [&paid_a, &paid_b] {
			let order = engine.state_machine().get_order(order_id).await.unwrap();
			assert!(!order.reimbursed);
			assert!(order.reimbursed_at.is_none());
		}
		assert!(engine.reimbursements().list(&admin()).await.unwrap().is_empty());

		let total = engine
			.reimbursements()
			.confirm(&admin(), Decimal::from(1800))
			.await
			.unwrap();
		assert_eq!(total, Decimal::from(1800));
	}
}
