//! Customer order endpoints.
//!
//! Guests act on their order by passing its guest token, either in the
//! query string or in the request body.

use crate::auth::Identity;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	response::Json,
	routing::{get, put},
	Router,
};
use shop_types::{
	APIError, CancelOrderRequest, CancelOrderResponse, CheckoutReceipt, ConfirmDeliveryRequest,
	GuestTokenQuery, MarkPaidRequest, NewOrder, Order, SuccessResponse, UpdateAddressRequest,
	UpdateDeliveryStatusRequest,
};

pub fn router() -> Router<AppState> {
	Router::new()
		.route(
			"/orders",
			get(handle_list_orders)
				.post(handle_checkout)
				.put(handle_update_status),
		)
		.route("/orders/cancel", put(handle_cancel))
		.route("/orders/confirm-delivery", put(handle_confirm_delivery))
		.route("/orders/{id}", get(handle_get_order).delete(handle_delete_order))
		.route("/orders/{id}/address", put(handle_update_address))
		.route("/orders/{id}/mark-paid", put(handle_mark_paid))
}

/// Handles POST /api/orders requests.
///
/// Reserves stock and creates the order. Guests receive the token that
/// proves ownership of the new order.
async fn handle_checkout(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<NewOrder>,
) -> Result<Json<CheckoutReceipt>, APIError> {
	match state.shop.checkout().checkout(&caller, request).await {
		Ok(receipt) => Ok(Json(receipt)),
		Err(e) => {
			tracing::warn!("Checkout failed: {}", e);
			Err(e.into())
		},
	}
}

async fn handle_list_orders(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<Vec<Order>>, APIError> {
	Ok(Json(state.shop.orders().list(&caller).await?))
}

/// Handles PUT /api/orders requests from the admin order table.
async fn handle_update_status(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<UpdateDeliveryStatusRequest>,
) -> Result<Json<SuccessResponse>, APIError> {
	state
		.shop
		.orders()
		.update_delivery_status(&caller, &request.id, request.delivery_status)
		.await?;
	Ok(Json(SuccessResponse::ok()))
}

async fn handle_get_order(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
	Query(query): Query<GuestTokenQuery>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.shop
		.orders()
		.get(&caller, &id, query.guest_token.as_deref())
		.await?;
	Ok(Json(order))
}

async fn handle_delete_order(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, APIError> {
	state.shop.orders().delete(&caller, &id).await?;
	Ok(Json(SuccessResponse::ok()))
}

async fn handle_update_address(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
	Query(query): Query<GuestTokenQuery>,
	Json(request): Json<UpdateAddressRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.shop
		.orders()
		.update_address(&caller, &id, request.address, query.guest_token.as_deref())
		.await?;
	Ok(Json(order))
}

async fn handle_mark_paid(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
	Json(request): Json<MarkPaidRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.shop
		.orders()
		.set_payment_claim(
			&caller,
			&id,
			request.claimed.unwrap_or(true),
			request.guest_token.as_deref(),
		)
		.await?;
	Ok(Json(order))
}

async fn handle_confirm_delivery(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<ConfirmDeliveryRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.shop
		.orders()
		.set_customer_delivery_confirmation(
			&caller,
			&request.order_id,
			request.confirmed.unwrap_or(true),
			request.guest_token.as_deref(),
		)
		.await?;
	Ok(Json(order))
}

/// Handles PUT /api/orders/cancel requests.
///
/// Reports the refund owed to the customer, which is zero unless payment
/// had been confirmed.
async fn handle_cancel(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<CancelOrderRequest>,
) -> Result<Json<CancelOrderResponse>, APIError> {
	let order = state.shop.orders().cancel(&caller, &request.order_id).await?;
	Ok(Json(CancelOrderResponse {
		success: true,
		message: "Order cancelled successfully".to_string(),
		refund_amount: order.refund_amount.unwrap_or_default(),
	}))
}
