//! Shop settings endpoints.
//!
//! `GET /settings` is public. Each write endpoint updates one section of
//! the settings singleton and leaves the rest untouched.

use crate::auth::Identity;
use crate::server::AppState;
use axum::{extract::State, response::Json, routing::get, routing::put, Router};
use shop_types::{
	APIError, BannerUpdate, DeliveryTimeUpdate, GeneralSettingsUpdate, Settings, SpfUpdate,
	SuccessResponse, WhatsappUpdate,
};

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/settings", get(handle_get).put(handle_update))
		.route("/settings/spf", put(handle_update_spf))
		.route("/settings/delivery-time", put(handle_update_delivery_time))
		.route("/settings/whatsapp", put(handle_update_whatsapp))
		.route("/settings/banner", put(handle_update_banner))
}

async fn handle_get(State(state): State<AppState>) -> Result<Json<Settings>, APIError> {
	Ok(Json(state.shop.settings().get().await?))
}

/// Handles PUT /api/settings requests for bank details and hostels.
async fn handle_update(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(update): Json<GeneralSettingsUpdate>,
) -> Result<Json<Settings>, APIError> {
	Ok(Json(state.shop.settings().update(&caller, update.into()).await?))
}

async fn handle_update_spf(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(update): Json<SpfUpdate>,
) -> Result<Json<SuccessResponse>, APIError> {
	state.shop.settings().apply(&caller, update).await?;
	Ok(Json(SuccessResponse::ok()))
}

async fn handle_update_delivery_time(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(update): Json<DeliveryTimeUpdate>,
) -> Result<Json<SuccessResponse>, APIError> {
	state.shop.settings().apply(&caller, update).await?;
	Ok(Json(SuccessResponse::ok()))
}

async fn handle_update_whatsapp(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(update): Json<WhatsappUpdate>,
) -> Result<Json<SuccessResponse>, APIError> {
	state.shop.settings().apply(&caller, update).await?;
	Ok(Json(SuccessResponse::with_message(
		"WhatsApp number updated successfully",
	)))
}

async fn handle_update_banner(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(update): Json<BannerUpdate>,
) -> Result<Json<SuccessResponse>, APIError> {
	state.shop.settings().apply(&caller, update).await?;
	Ok(Json(SuccessResponse::ok()))
}
