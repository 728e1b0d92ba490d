//! Caller checks shared by the handlers.
//!
//! Role checks happen before any record is loaded. Ownership checks need
//! the record and run inside the atomic update, ahead of state checks.

use super::OrderError;
use shop_types::{AuthenticatedUser, Caller, Order};

pub(crate) fn require_user(caller: &Caller) -> Result<&AuthenticatedUser, OrderError> {
	caller
		.user()
		.ok_or_else(|| OrderError::Unauthorized("Authentication required".into()))
}

pub(crate) fn require_admin(caller: &Caller) -> Result<&AuthenticatedUser, OrderError> {
	let user = require_user(caller)?;
	if !user.is_admin() {
		return Err(OrderError::Forbidden("Admin access required".into()));
	}
	Ok(user)
}

pub(crate) fn require_staff(caller: &Caller) -> Result<&AuthenticatedUser, OrderError> {
	let user = require_user(caller)?;
	if !user.is_staff() {
		return Err(OrderError::Forbidden("Staff access required".into()));
	}
	Ok(user)
}

/// A customer action needs either a signed-in user or a guest token.
pub(crate) fn require_identity(caller: &Caller, guest_token: Option<&str>) -> Result<(), OrderError> {
	if caller.user().is_none() && guest_token.is_none_or(str::is_empty) {
		return Err(OrderError::Unauthorized(
			"Sign in or provide the order's guest token".into(),
		));
	}
	Ok(())
}

/// The caller owns `order`: it is their account's order, or a guest order
/// whose token they hold.
pub(crate) fn authorize_customer(
	caller: &Caller,
	order: &Order,
	guest_token: Option<&str>,
) -> Result<(), OrderError> {
	let owns = match (&order.user_id, &order.guest_token) {
		(Some(owner), _) => caller.user_id() == Some(owner.as_str()),
		(None, Some(token)) => guest_token.is_some_and(|presented| tokens_match(presented, token)),
		(None, None) => false,
	};
	if owns {
		Ok(())
	} else {
		Err(OrderError::Forbidden("You do not have access to this order".into()))
	}
}

/// Staff may read any order; everyone else only their own.
pub(crate) fn authorize_viewer(
	caller: &Caller,
	order: &Order,
	guest_token: Option<&str>,
) -> Result<(), OrderError> {
	if caller.is_staff() {
		return Ok(());
	}
	authorize_customer(caller, order, guest_token)
}

/// Compares without short-circuiting on the first differing byte.
fn tokens_match(presented: &str, stored: &str) -> bool {
	presented.len() == stored.len()
		&& presented
			.bytes()
			.zip(stored.bytes())
			.fold(0u8, |acc, (a, b)| acc | (a ^ b))
			== 0
}
