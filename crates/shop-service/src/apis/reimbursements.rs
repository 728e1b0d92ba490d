//! Reimbursement ledger endpoints.

use crate::auth::Identity;
use crate::server::AppState;
use axum::{
	extract::State,
	response::Json,
	routing::{get, post},
	Router,
};
use shop_types::{
	APIError, ConfirmReimbursementRequest, ConfirmReimbursementResponse, Reimbursement,
	ReimbursementTotalResponse,
};

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/reimbursements", get(handle_list))
		.route("/reimbursements/confirm", post(handle_confirm))
		.route("/reimbursements/total", get(handle_total))
}

/// Handles POST /api/reimbursements/confirm requests.
///
/// Records the payout and marks every confirmed, unreimbursed order as
/// settled.
async fn handle_confirm(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<ConfirmReimbursementRequest>,
) -> Result<Json<ConfirmReimbursementResponse>, APIError> {
	let total_reimbursed = state
		.shop
		.reimbursements()
		.confirm(&caller, request.amount)
		.await?;
	Ok(Json(ConfirmReimbursementResponse {
		success: true,
		total_reimbursed,
	}))
}

async fn handle_total(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<ReimbursementTotalResponse>, APIError> {
	let total = state.shop.reimbursements().total(&caller).await?;
	Ok(Json(ReimbursementTotalResponse { total }))
}

async fn handle_list(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<Vec<Reimbursement>>, APIError> {
	Ok(Json(state.shop.reimbursements().list(&caller).await?))
}
