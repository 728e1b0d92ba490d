//! Category endpoints. Listing is public, changes are admin-only.

use crate::auth::Identity;
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use shop_types::{APIError, Category, DeleteCategoryRequest, NewCategory};

pub fn router() -> Router<AppState> {
	Router::new().route(
		"/categories",
		get(handle_list).post(handle_create).delete(handle_delete),
	)
}

async fn handle_list(State(state): State<AppState>) -> Result<Json<Vec<Category>>, APIError> {
	Ok(Json(state.shop.catalog().categories().await?))
}

async fn handle_create(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(draft): Json<NewCategory>,
) -> Result<Json<Category>, APIError> {
	Ok(Json(state.shop.catalog().create_category(&caller, draft).await?))
}

async fn handle_delete(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<DeleteCategoryRequest>,
) -> Result<StatusCode, APIError> {
	state
		.shop
		.catalog()
		.delete_category(&caller, &request.id)
		.await?;
	Ok(StatusCode::NO_CONTENT)
}
