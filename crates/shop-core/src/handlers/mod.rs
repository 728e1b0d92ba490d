//! Request handlers for the shop's business operations.
//!
//! Each handler owns one area of the back-office: checkout, the order
//! lifecycle, reimbursement, settings, the catalog, users, reports and
//! notifications. Handlers validate the caller, commit the change through
//! storage and publish an event; they never talk to the push gateway
//! directly except for the notification handler, which reacts to events.

pub mod access;
pub mod catalog;
pub mod checkout;
pub mod notification;
pub mod order;
pub mod reimbursement;
pub mod report;
pub mod settings;
pub mod users;

pub use catalog::CatalogHandler;
pub use checkout::CheckoutHandler;
pub use notification::NotificationHandler;
pub use order::OrderHandler;
pub use reimbursement::ReimbursementHandler;
pub use report::ReportHandler;
pub use settings::SettingsHandler;
pub use users::UserDirectory;

use shop_storage::StorageError;
use shop_types::APIError;
use thiserror::Error;

/// Errors returned by every shop operation.
///
/// Checks run in a fixed order: caller identity and role, then existence,
/// then ownership, then the record's state.
#[derive(Debug, Error)]
pub enum OrderError {
	/// No usable identity was supplied.
	#[error("{0}")]
	Unauthorized(String),
	/// The caller is known but may not perform the operation.
	#[error("{0}")]
	Forbidden(String),
	#[error("{0}")]
	NotFound(String),
	/// The record exists but its current state forbids the operation.
	#[error("{0}")]
	InvalidState(String),
	#[error("Insufficient stock for product {product}. Available: {available}")]
	InsufficientStock {
		product: String,
		available: u32,
		requested: u32,
	},
	#[error("{0}")]
	Validation(String),
	/// Concurrent writers kept winning the race for the same record.
	#[error("{0}")]
	Conflict(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for OrderError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound => OrderError::NotFound("Record not found".into()),
			StorageError::Conflict(key) => {
				OrderError::Conflict(format!("Too many concurrent updates to {}", key))
			},
			other => OrderError::Storage(other.to_string()),
		}
	}
}

impl OrderError {
	/// Replaces the generic storage miss with a message naming the record.
	pub(crate) fn or_not_found(self, what: &str) -> Self {
		match self {
			OrderError::NotFound(_) => OrderError::NotFound(format!("{} not found", what)),
			other => other,
		}
	}
}

impl From<OrderError> for APIError {
	fn from(err: OrderError) -> Self {
		match err {
			OrderError::Unauthorized(message) => APIError::Unauthorized { message },
			OrderError::Forbidden(message) => APIError::Forbidden { message },
			OrderError::NotFound(message) => APIError::NotFound { message },
			OrderError::InvalidState(message) => APIError::bad_request("INVALID_STATE", message),
			OrderError::Validation(message) => APIError::bad_request("VALIDATION_ERROR", message),
			OrderError::InsufficientStock {
				ref product,
				available,
				requested,
			} => APIError::BadRequest {
				error_type: "INSUFFICIENT_STOCK".to_string(),
				message: err.to_string(),
				details: Some(serde_json::json!({
					"product": product,
					"available": available,
					"requested": requested,
				})),
			},
			OrderError::Conflict(message) => APIError::ServiceUnavailable {
				message,
				retry_after: Some(1),
			},
			OrderError::Storage(message) => {
				tracing::error!(error = %message, "Storage failure");
				APIError::InternalServerError {
					message: "Internal storage error".to_string(),
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_stock_shortfall_carries_details() {
		let err = OrderError::InsufficientStock {
			product: "Jollof Rice".into(),
			available: 2,
			requested: 5,
		};
		let api: APIError = err.into();
		assert_eq!(api.status_code(), 400);
		let body = api.to_error_response();
		assert_eq!(body.error, "INSUFFICIENT_STOCK");
		assert_eq!(body.message, "Insufficient stock for product Jollof Rice. Available: 2");
		assert_eq!(body.details.unwrap()["requested"], 5);
	}

	#[test]
	fn test_status_codes_follow_check_order() {
		let status = |err: OrderError| APIError::from(err).status_code();
		assert_eq!(status(OrderError::Unauthorized("x".into())), 401);
		assert_eq!(status(OrderError::Forbidden("x".into())), 403);
		assert_eq!(status(OrderError::NotFound("x".into())), 404);
		assert_eq!(status(OrderError::InvalidState("x".into())), 400);
		assert_eq!(status(OrderError::Conflict("x".into())), 503);
		assert_eq!(status(OrderError::Storage("x".into())), 500);
	}

	#[test]
	fn test_storage_conflict_is_not_an_internal_error() {
		let err = OrderError::from(StorageError::Conflict("orders:o1".into()));
		assert!(matches!(err, OrderError::Conflict(_)));
	}
}
