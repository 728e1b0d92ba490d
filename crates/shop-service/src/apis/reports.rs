//! Dashboard report endpoints for admins and managers.

use crate::auth::Identity;
use crate::server::AppState;
use axum::{
	extract::{Query, State},
	response::Json,
	routing::get,
	Router,
};
use shop_core::reporting::{
	FinancialSummary, GrowthBucket, LocationStat, ProductPerformance, RevenueBucket, StatusBucket,
};
use shop_core::TimeRange;
use shop_types::{APIError, RangeQuery};

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/reports/summary", get(handle_summary))
		.route("/reports/revenue", get(handle_revenue))
		.route("/reports/order-status", get(handle_order_status))
		.route("/reports/product-performance", get(handle_product_performance))
		.route("/reports/locations", get(handle_locations))
		.route("/reports/user-growth", get(handle_user_growth))
}

async fn handle_summary(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<FinancialSummary>, APIError> {
	Ok(Json(state.shop.reports().summary(&caller).await?))
}

/// Handles GET /api/reports/revenue requests.
///
/// `range` is one of `7days` (default), `30days`, `3months` or `year`.
async fn handle_revenue(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<RevenueBucket>>, APIError> {
	let range = match query.range.as_deref().map(str::parse::<TimeRange>).transpose() {
		Ok(range) => range.unwrap_or_default(),
		Err(message) => return Err(APIError::bad_request("VALIDATION_ERROR", message)),
	};
	Ok(Json(state.shop.reports().revenue(&caller, range).await?))
}

async fn handle_order_status(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<Vec<StatusBucket>>, APIError> {
	Ok(Json(state.shop.reports().order_status(&caller).await?))
}

async fn handle_product_performance(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<Vec<ProductPerformance>>, APIError> {
	Ok(Json(state.shop.reports().product_performance(&caller).await?))
}

async fn handle_locations(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<Vec<LocationStat>>, APIError> {
	Ok(Json(state.shop.reports().locations(&caller).await?))
}

async fn handle_user_growth(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<Vec<GrowthBucket>>, APIError> {
	Ok(Json(state.shop.reports().user_growth(&caller).await?))
}
