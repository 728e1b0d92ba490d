//! Catalog endpoints. Reads are public, writes are admin-only.

use crate::auth::Identity;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	response::Json,
	routing::get,
	Router,
};
use shop_types::{APIError, NewProduct, Product, ProductUpdate};

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/products", get(handle_list).post(handle_create))
		.route(
			"/products/{id}",
			get(handle_get).put(handle_update).delete(handle_delete),
		)
}

async fn handle_list(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<Vec<Product>>, APIError> {
	Ok(Json(state.shop.catalog().list(&caller).await?))
}

async fn handle_get(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
) -> Result<Json<Product>, APIError> {
	Ok(Json(state.shop.catalog().get(&caller, &id).await?))
}

async fn handle_create(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(draft): Json<NewProduct>,
) -> Result<Json<Product>, APIError> {
	Ok(Json(state.shop.catalog().create(&caller, draft).await?))
}

async fn handle_update(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
	Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>, APIError> {
	Ok(Json(state.shop.catalog().update(&caller, &id, update).await?))
}

async fn handle_delete(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
) -> Result<Json<Product>, APIError> {
	Ok(Json(state.shop.catalog().delete(&caller, &id).await?))
}
