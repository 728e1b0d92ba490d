//! API types for the shop HTTP API.
//!
//! Request bodies, small response envelopes and the structured error type
//! returned by every endpoint. All JSON is camelCase.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DeliveryStatus;

/// `{ "success": true }`, optionally with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl SuccessResponse {
	pub fn ok() -> Self {
		Self {
			success: true,
			message: None,
		}
	}

	pub fn with_message(message: impl Into<String>) -> Self {
		Self {
			success: true,
			message: Some(message.into()),
		}
	}
}

/// Query string carried by guests acting on their order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestTokenQuery {
	pub guest_token: Option<String>,
}

/// Generic status update routed through the order state machine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeliveryStatusRequest {
	pub id: String,
	pub delivery_status: DeliveryStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAddressRequest {
	pub address: String,
}

/// Customer payment claim. `claimed` defaults to true.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
	pub claimed: Option<bool>,
	pub guest_token: Option<String>,
}

/// Customer receipt confirmation. `confirmed` defaults to true.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDeliveryRequest {
	pub order_id: String,
	pub confirmed: Option<bool>,
	pub guest_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
	pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderResponse {
	pub success: bool,
	pub message: String,
	pub refund_amount: Decimal,
}

/// Admin availability confirmation. Defaults to true.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmAvailabilityRequest {
	pub admin_confirmed_availability: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfirmDeliveryRequest {
	pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmReimbursementRequest {
	pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmReimbursementResponse {
	pub success: bool,
	pub total_reimbursed: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReimbursementTotalResponse {
	pub total: Decimal,
}

/// Category removal, identified in the body.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteCategoryRequest {
	pub id: String,
}

/// Admin announcement to every registered device.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRequest {
	pub title: String,
	pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResponse {
	pub success: bool,
	pub delivered: usize,
}

/// Query string of the revenue report, e.g. `?range=30days`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeQuery {
	pub range: Option<String>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// No identity, or the wrong role (401).
	Unauthorized { message: String },
	/// Identity known but not allowed to touch this record (403).
	Forbidden { message: String },
	/// Record does not exist (404).
	NotFound { message: String },
	/// Invalid input or a state transition that is not allowed (400).
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Concurrent writers kept colliding (503).
	ServiceUnavailable {
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500).
	InternalServerError { message: String },
}

impl APIError {
	pub fn bad_request(error_type: impl Into<String>, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.into(),
			message: message.into(),
			details: None,
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::Unauthorized { .. } => 401,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::BadRequest { .. } => 400,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let simple = |error: &str, message: &String| ErrorResponse {
			error: error.to_string(),
			message: message.clone(),
			details: None,
			retry_after: None,
		};
		match self {
			APIError::Unauthorized { message } => simple("UNAUTHORIZED", message),
			APIError::Forbidden { message } => simple("FORBIDDEN", message),
			APIError::NotFound { message } => simple("NOT_FOUND", message),
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
				retry_after: None,
			},
			APIError::ServiceUnavailable {
				message,
				retry_after,
			} => ErrorResponse {
				retry_after: *retry_after,
				..simple("SERVICE_UNAVAILABLE", message)
			},
			APIError::InternalServerError { message } => simple("INTERNAL_ERROR", message),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
			APIError::Forbidden { message } => write!(f, "Forbidden: {}", message),
			APIError::NotFound { message } => write!(f, "Not Found: {}", message),
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_error_response_shape() {
		let err = APIError::bad_request("INVALID_STATE", "Order already cancelled");
		assert_eq!(err.status_code(), 400);
		assert_eq!(
			serde_json::to_value(err.to_error_response()).unwrap(),
			json!({
				"error": "INVALID_STATE",
				"message": "Order already cancelled",
				"details": null,
				"retryAfter": null
			})
		);

		let busy = APIError::ServiceUnavailable {
			message: "busy".into(),
			retry_after: Some(1),
		};
		assert_eq!(busy.status_code(), 503);
		assert_eq!(busy.to_error_response().retry_after, Some(1));
	}

	#[test]
	fn test_request_defaults() {
		let body: MarkPaidRequest = serde_json::from_value(json!({})).unwrap();
		assert_eq!(body.claimed, None);

		let body: UpdateDeliveryStatusRequest =
			serde_json::from_value(json!({"id": "o1", "deliveryStatus": "delivered"})).unwrap();
		assert_eq!(body.delivery_status, DeliveryStatus::Delivered);
	}
}
