//! Notification handler.
//!
//! Reacts to committed shop events by writing inbox records and pushing to
//! registered devices, and manages device token registrations. Nothing in
//! here can fail an order action: the engine runs [`NotificationHandler::handle`]
//! on its own task and only logs what goes wrong.

use super::access::{authorize_customer, require_admin, require_identity, require_user};
use super::users::UserDirectory;
use super::OrderError;
use crate::state::OrderStateMachine;
use chrono::Utc;
use rust_decimal::Decimal;
use shop_notify::{NotificationService, SendReport};
use shop_storage::StorageService;
use shop_types::{
	format_price, generate_id, truncate_id, Caller, Notification, OrderEvent, PushMessage,
	PushOwner, PushRegistration, RegisterTokenRequest, ReimbursementEvent, Role, ShopEvent,
	StorageKey,
};
use std::sync::Arc;
use tracing::instrument;

/// Who a notification is for.
enum Audience<'a> {
	/// Every device registered by an admin.
	Admins,
	/// The device registered for the order's owner or guest.
	Customer {
		order_id: &'a str,
		user_id: Option<&'a str>,
	},
}

pub struct NotificationHandler {
	storage: Arc<StorageService>,
	state_machine: Arc<OrderStateMachine>,
	users: Arc<UserDirectory>,
	notifier: Arc<NotificationService>,
	currency: String,
	admin_url: Option<String>,
}

impl NotificationHandler {
	pub fn new(
		storage: Arc<StorageService>,
		state_machine: Arc<OrderStateMachine>,
		users: Arc<UserDirectory>,
		notifier: Arc<NotificationService>,
		currency: impl Into<String>,
		admin_url: Option<String>,
	) -> Self {
		Self {
			storage,
			state_machine,
			users,
			notifier,
			currency: currency.into(),
			admin_url,
		}
	}

	/// Turns one event into inbox records and pushes.
	pub async fn handle(&self, event: &ShopEvent) -> Result<(), OrderError> {
		match event {
			ShopEvent::Order(event) => self.handle_order_event(event).await,
			ShopEvent::Reimbursement(ReimbursementEvent::Confirmed {
				amount,
				orders_reimbursed,
				..
			}) => {
				tracing::info!(amount = %amount, orders = orders_reimbursed, "Reimbursement confirmed");
				Ok(())
			},
		}
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(event.order_id())))]
	async fn handle_order_event(&self, event: &OrderEvent) -> Result<(), OrderError> {
		let order_id = event.order_id();
		let short = truncate_id(order_id);
		let customer = Audience::Customer {
			order_id,
			user_id: event.user_id(),
		};

		match event {
			OrderEvent::Placed {
				customer: name,
				amount,
				..
			} => {
				let body = format!("{} placed an order of {}", name, self.price(*amount));
				self.record_inbox(None, "New Order", &body, order_id).await?;
				self.push(Audience::Admins, "New Order", &body, order_id).await
			},
			OrderEvent::AvailabilityConfirmed { confirmed: true, .. } => {
				let body = format!(
					"All items in order #{} are available. You can now proceed with payment.",
					short
				);
				self.push(customer, "Items Available", &body, order_id).await
			},
			OrderEvent::AvailabilityConfirmed { confirmed: false, .. } => Ok(()),
			OrderEvent::PaymentClaimed { customer: name, .. } => {
				let amount = self.order_amount(order_id).await;
				let body = format!("{} marked order #{} ({}) as paid", name, short, amount);
				self.push(Audience::Admins, "Payment Claimed", &body, order_id).await
			},
			OrderEvent::PaymentClaimRevoked { customer: name, .. } => {
				let amount = self.order_amount(order_id).await;
				let body = format!(
					"{} withdrew the payment claim on order #{} ({})",
					name, short, amount
				);
				self.push(Audience::Admins, "Payment Claim Withdrawn", &body, order_id)
					.await
			},
			OrderEvent::PaymentConfirmed { .. } => {
				let body = format!("Payment for order #{} has been confirmed.", short);
				self.push(customer, "Payment Confirmed", &body, order_id).await
			},
			OrderEvent::Dispatched { user_id, .. } => {
				let body = format!("Your order #{} is on its way.", short);
				if let Some(user_id) = user_id {
					self.record_inbox(Some(user_id), "Order Dispatched", &body, order_id)
						.await?;
				}
				self.push(customer, "Order Dispatched", &body, order_id).await
			},
			OrderEvent::DeliveryConfirmedByCustomer { confirmed: true, .. } => {
				let body = format!("The customer confirmed receipt of order #{}.", short);
				self.push(Audience::Admins, "Delivery Confirmed", &body, order_id)
					.await
			},
			OrderEvent::DeliveryConfirmedByCustomer { confirmed: false, .. } => Ok(()),
			OrderEvent::Delivered { .. } => {
				let body = format!("Order #{} has been delivered. Enjoy!", short);
				self.push(customer, "Order Delivered", &body, order_id).await
			},
			OrderEvent::Cancelled { refund_amount, .. } => {
				let body = if refund_amount.is_zero() {
					format!("Order #{} has been cancelled.", short)
				} else {
					format!(
						"Order #{} has been cancelled. {} will be refunded.",
						short,
						self.price(*refund_amount)
					)
				};
				self.push(customer, "Order Cancelled", &body, order_id).await
			},
			OrderEvent::Deleted { .. } => {
				tracing::debug!("Order deleted, nothing to notify");
				Ok(())
			},
		}
	}

	fn price(&self, amount: Decimal) -> String {
		format_price(amount, &self.currency)
	}

	/// Formatted order amount, or a placeholder if the order is gone.
	async fn order_amount(&self, order_id: &str) -> String {
		match self.state_machine.get_order(order_id).await {
			Ok(order) => self.price(order.amount),
			Err(e) => {
				tracing::debug!(error = %e, "Order not readable for notification");
				"amount unknown".to_string()
			},
		}
	}

	async fn record_inbox(
		&self,
		user_id: Option<&str>,
		title: &str,
		body: &str,
		order_id: &str,
	) -> Result<(), OrderError> {
		let record = Notification {
			id: generate_id(),
			user_id: user_id.map(str::to_string),
			title: title.to_string(),
			body: body.to_string(),
			order_id: Some(order_id.to_string()),
			read: false,
			created_at: Utc::now(),
		};
		self.storage
			.store(StorageKey::Notifications, &record.id, &record)
			.await?;
		Ok(())
	}

	async fn push(
		&self,
		audience: Audience<'_>,
		title: &str,
		body: &str,
		order_id: &str,
	) -> Result<(), OrderError> {
		if !self.notifier.is_enabled() {
			return Ok(());
		}
		let tokens = self.tokens_for(&audience).await?;
		let mut message =
			PushMessage::new(tokens, title, body).with_data("orderId", order_id);
		if let (Audience::Admins, Some(url)) = (&audience, &self.admin_url) {
			message = message.with_data("url", url.clone());
		}

		let report = self.notifier.notify(&message).await;
		if !report.failed_tokens.is_empty() {
			tracing::warn!(failed = report.failed_tokens.len(), title, "Some devices rejected the push");
		}
		tracing::debug!(delivered = report.delivered, title, "Push sent");
		Ok(())
	}

	async fn tokens_for(&self, audience: &Audience<'_>) -> Result<Vec<String>, OrderError> {
		match audience {
			Audience::Admins => {
				let registrations: Vec<PushRegistration> =
					self.storage.list(StorageKey::PushTokens).await?;
				let mut tokens: Vec<String> = registrations
					.into_iter()
					.filter(|r| {
						matches!(
							r.owner,
							PushOwner::User {
								role: Role::Admin,
								..
							}
						)
					})
					.map(|r| r.token)
					.collect();
				tokens.sort();
				tokens.dedup();
				Ok(tokens)
			},
			Audience::Customer { order_id, user_id } => {
				let owner = match user_id {
					Some(user_id) => format!("user:{}", user_id),
					None => format!("order:{}", order_id),
				};
				let registration: Option<PushRegistration> =
					self.storage.find(StorageKey::PushTokens, &owner).await?;
				Ok(registration.map(|r| r.token).into_iter().collect())
			},
		}
	}

	/// Registers, replaces or (with a `null` token) removes the caller's
	/// device token.
	///
	/// Signed-in users register for themselves. Guests register against
	/// their order and must present its guest token.
	#[instrument(skip_all)]
	pub async fn register_token(
		&self,
		caller: &Caller,
		request: RegisterTokenRequest,
	) -> Result<(), OrderError> {
		let guest_token = request.guest_token.as_deref();
		let owner = match caller.user() {
			Some(user) => {
				self.users.touch(user).await;
				PushOwner::User {
					user_id: user.id.clone(),
					role: user.role,
				}
			},
			None => {
				require_identity(caller, guest_token)?;
				let order_id = request
					.order_id
					.as_deref()
					.filter(|id| !id.trim().is_empty())
					.ok_or_else(|| OrderError::Validation("Order id is required for guests".into()))?;
				let order = self.state_machine.get_order(order_id).await?;
				authorize_customer(caller, &order, guest_token)?;
				PushOwner::GuestOrder {
					order_id: order.id,
				}
			},
		};
		let key = owner.key();

		match request.token {
			None => {
				self.storage.remove(StorageKey::PushTokens, &key).await?;
				tracing::info!(owner = %key, "Push token removed");
			},
			Some(token) => {
				let token = token.trim();
				if token.is_empty() {
					return Err(OrderError::Validation("Token is required".into()));
				}
				let registration = PushRegistration {
					owner,
					token: token.to_string(),
					updated_at: Utc::now(),
				};
				self.storage
					.store(StorageKey::PushTokens, &key, &registration)
					.await?;
				tracing::info!(owner = %key, "Push token registered");
			},
		}
		Ok(())
	}

	/// The caller's inbox, newest first. Staff also see the shared staff
	/// inbox.
	pub async fn inbox(&self, caller: &Caller) -> Result<Vec<Notification>, OrderError> {
		let user = require_user(caller)?;
		let mut records: Vec<Notification> = self.storage.list(StorageKey::Notifications).await?;
		records.retain(|n| match n.user_id.as_deref() {
			Some(owner) => owner == user.id,
			None => user.is_staff(),
		});
		records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(records)
	}

	pub async fn mark_read(&self, caller: &Caller, notification_id: &str) -> Result<Notification, OrderError> {
		let user = require_user(caller)?;
		self.storage
			.modify(StorageKey::Notifications, notification_id, |n: &mut Notification| {
				let allowed = match n.user_id.as_deref() {
					Some(owner) => owner == user.id,
					None => user.is_staff(),
				};
				if !allowed {
					return Err(OrderError::Forbidden(
						"You do not have access to this notification".into(),
					));
				}
				n.read = true;
				Ok(())
			})
			.await
			.map_err(|e| e.or_not_found("Notification"))
	}

	/// Admin announcement pushed to every registered device.
	#[instrument(skip_all)]
	pub async fn broadcast(
		&self,
		caller: &Caller,
		title: &str,
		message: &str,
	) -> Result<SendReport, OrderError> {
		let admin = require_admin(caller)?;
		let (title, message) = (title.trim(), message.trim());
		if title.is_empty() || message.is_empty() {
			return Err(OrderError::Validation("Title and message are required".into()));
		}
		let registrations: Vec<PushRegistration> = self.storage.list(StorageKey::PushTokens).await?;
		let mut tokens: Vec<String> = registrations.into_iter().map(|r| r.token).collect();
		tokens.sort();
		tokens.dedup();

		let report = self
			.notifier
			.notify(&PushMessage::new(tokens, title, message))
			.await;
		tracing::info!(by = %admin.id, delivered = report.delivered, "Broadcast sent");
		Ok(report)
	}
}
