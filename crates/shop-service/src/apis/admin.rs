//! Admin-only order actions and announcements.

use crate::auth::Identity;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	response::Json,
	routing::{post, put},
	Router,
};
use shop_types::{
	APIError, AdminConfirmDeliveryRequest, BroadcastRequest, BroadcastResponse,
	ConfirmAvailabilityRequest, Order,
};

pub fn router() -> Router<AppState> {
	Router::new()
		.route(
			"/admin/orders/{id}/confirm-availability",
			put(handle_confirm_availability),
		)
		.route("/admin/orders/{id}/confirm-payment", put(handle_confirm_payment))
		.route("/admin/orders/confirm-delivery", put(handle_deliver))
		.route("/admin/notifications/send", post(handle_broadcast))
}

/// Handles PUT /api/admin/orders/{id}/confirm-availability requests.
///
/// The body is optional; without one availability is confirmed.
async fn handle_confirm_availability(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
	request: Option<Json<ConfirmAvailabilityRequest>>,
) -> Result<Json<Order>, APIError> {
	let confirmed = request
		.and_then(|Json(request)| request.admin_confirmed_availability)
		.unwrap_or(true);
	let order = state
		.shop
		.orders()
		.confirm_availability(&caller, &id, confirmed)
		.await?;
	Ok(Json(order))
}

async fn handle_confirm_payment(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
) -> Result<Json<Order>, APIError> {
	Ok(Json(state.shop.orders().confirm_payment(&caller, &id).await?))
}

/// Handles PUT /api/admin/orders/confirm-delivery requests.
///
/// Marks a dispatched order delivered once the customer has confirmed
/// receipt.
async fn handle_deliver(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<AdminConfirmDeliveryRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state.shop.orders().deliver(&caller, &request.order_id).await?;
	Ok(Json(order))
}

async fn handle_broadcast(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, APIError> {
	let report = state
		.shop
		.notifications()
		.broadcast(&caller, &request.title, &request.message)
		.await?;
	Ok(Json(BroadcastResponse {
		success: true,
		delivered: report.delivered,
	}))
}
