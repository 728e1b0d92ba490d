//! HTTP server for the shop API.
//!
//! Routes are grouped per area under `crate::apis` and nested below `/api`.

use crate::apis;
use axum::{
	extract::DefaultBodyLimit,
	http::{HeaderName, HeaderValue, Method, StatusCode},
	Router,
};
use shop_config::{ApiConfig, CorsConfig};
use shop_core::ShopEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the shop engine for processing requests.
	pub shop: Arc<ShopEngine>,
}

/// Builds the CORS layer. Without an explicit configuration any origin is
/// allowed, which suits local development.
fn cors_layer(config: Option<&CorsConfig>) -> CorsLayer {
	let Some(config) = config else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = config
		.allowed_origins
		.iter()
		.filter_map(|origin| origin.parse().ok())
		.collect();
	let mut layer = if config.allowed_origins.iter().any(|o| o == "*") {
		CorsLayer::new().allow_origin(AllowOrigin::any())
	} else {
		CorsLayer::new().allow_origin(origins)
	};

	let headers: Vec<HeaderName> = config
		.allowed_headers
		.iter()
		.filter_map(|header| header.parse().ok())
		.collect();
	if !headers.is_empty() {
		layer = layer.allow_headers(headers);
	}
	let methods: Vec<Method> = config
		.allowed_methods
		.iter()
		.filter_map(|method| method.parse().ok())
		.collect();
	if !methods.is_empty() {
		layer = layer.allow_methods(methods);
	}
	layer
}

/// Assembles the full router with middleware.
pub fn build_router(shop: Arc<ShopEngine>, api_config: &ApiConfig) -> Router {
	let app_state = AppState { shop };

	let api = Router::new()
		.merge(apis::orders::router())
		.merge(apis::admin::router())
		.merge(apis::products::router())
		.merge(apis::categories::router())
		.merge(apis::settings::router())
		.merge(apis::reimbursements::router())
		.merge(apis::reports::router())
		.merge(apis::notifications::router());

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::with_status_code(
					StatusCode::REQUEST_TIMEOUT,
					Duration::from_secs(api_config.timeout_seconds),
				))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(app_state)
}

/// Starts the HTTP server for the API.
///
/// This function creates and configures the HTTP server with routing,
/// middleware, and error handling, and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	shop: Arc<ShopEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(shop, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Shop API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::auth::{USER_ID_HEADER, USER_ROLE_HEADER};
	use axum::body::{to_bytes, Body};
	use axum::http::Request;
	use serde_json::{json, Value};
	use shop_config::ConfigBuilder;
	use tower::ServiceExt;

	fn api_config() -> ApiConfig {
		ApiConfig {
			enabled: true,
			host: "127.0.0.1".into(),
			port: 0,
			timeout_seconds: 5,
			max_request_size: 64 * 1024,
			cors: None,
		}
	}

	fn app() -> Router {
		let shop = crate::build_shop(ConfigBuilder::new().build()).unwrap();
		build_router(Arc::new(shop), &api_config())
	}

	async fn call(
		app: &Router,
		method: &str,
		uri: &str,
		role: Option<(&str, &str)>,
		body: Option<Value>,
	) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		if let Some((id, role)) = role {
			request = request
				.header(USER_ID_HEADER, id)
				.header(USER_ROLE_HEADER, role);
		}
		let request = match body {
			Some(body) => request
				.header("content-type", "application/json")
				.body(Body::from(body.to_string())),
			None => request.body(Body::empty()),
		}
		.unwrap();

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	const ADMIN: Option<(&str, &str)> = Some(("admin", "ADMIN"));
	const CUSTOMER: Option<(&str, &str)> = Some(("u1", "USER"));

	async fn create_product(app: &Router, price: i64, dmc: i64, stock: u32) -> String {
		let (status, product) = call(
			app,
			"POST",
			"/api/products",
			ADMIN,
			Some(json!({"name": "Jollof Rice", "price": price, "dmc": dmc, "stock": stock})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		product["id"].as_str().unwrap().to_string()
	}

	fn items(product_id: &str, price: i64, dmc: i64, quantity: u32) -> Value {
		json!([{
			"id": product_id,
			"name": "Jollof Rice",
			"price": price,
			"dmc": dmc,
			"quantity": quantity,
		}])
	}

	#[tokio::test]
	async fn test_guest_checkout_and_lookup() {
		let app = app();
		let product = create_product(&app, 2000, 500, 10).await;

		let (status, receipt) = call(
			&app,
			"POST",
			"/api/orders",
			None,
			Some(json!({
				"items": items(&product, 2000, 500, 2),
				"guestEmail": "guest@example.com",
				"guestName": "Guest",
				"address": "Hall 3, Room 12",
			})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		let order_id = receipt["orderId"].as_str().unwrap();
		let token = receipt["guestToken"].as_str().unwrap();

		let (status, order) = call(
			&app,
			"GET",
			&format!("/api/orders/{}?guestToken={}", order_id, token),
			None,
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(order["amount"], json!(5100.0));
		assert_eq!(order["deliveryStatus"], "pending");
		assert!(order["guestToken"].is_null());

		let (status, _) = call(&app, "GET", &format!("/api/orders/{}", order_id), None, None).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn test_stock_shortfall_is_bad_request() {
		let app = app();
		let product = create_product(&app, 1000, 0, 1).await;

		let (status, body) = call(
			&app,
			"POST",
			"/api/orders",
			CUSTOMER,
			Some(json!({"items": items(&product, 1000, 0, 3), "address": "Hall 1"})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INSUFFICIENT_STOCK");
		assert_eq!(body["details"]["available"], 1);
	}

	#[tokio::test]
	async fn test_cancel_after_payment_reports_refund() {
		let app = app();
		let product = create_product(&app, 1000, 100, 5).await;
		let (_, receipt) = call(
			&app,
			"POST",
			"/api/orders",
			CUSTOMER,
			Some(json!({"items": items(&product, 1000, 100, 1), "address": "Hall 1"})),
		)
		.await;
		let order_id = receipt["orderId"].as_str().unwrap().to_string();

		let (status, _) = call(
			&app,
			"PUT",
			&format!("/api/admin/orders/{}/confirm-payment", order_id),
			CUSTOMER,
			None,
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		let (status, order) = call(
			&app,
			"PUT",
			&format!("/api/admin/orders/{}/confirm-payment", order_id),
			ADMIN,
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(order["paymentConfirmed"], true);

		let (status, body) = call(
			&app,
			"PUT",
			"/api/orders/cancel",
			ADMIN,
			Some(json!({"orderId": order_id})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["success"], true);
		assert_eq!(body["refundAmount"], json!(1200.0));

		let (status, body) = call(
			&app,
			"PUT",
			"/api/orders/cancel",
			ADMIN,
			Some(json!({"orderId": order_id})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_STATE");

		let (_, product) = call(&app, "GET", &format!("/api/products/{}", product), None, None).await;
		assert_eq!(product["remainingStock"], 5);
	}

	#[tokio::test]
	async fn test_settings_sections_require_admin() {
		let app = app();
		let (status, settings) = call(&app, "GET", "/api/settings", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(settings["spf"], json!(100.0));

		let (status, _) = call(&app, "PUT", "/api/settings/spf", CUSTOMER, Some(json!({"spf": 50}))).await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		let (status, body) = call(&app, "PUT", "/api/settings/spf", ADMIN, Some(json!({"spf": -1}))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Invalid SPF value");

		let (status, body) = call(&app, "PUT", "/api/settings/spf", ADMIN, Some(json!({"spf": 250}))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"success": true}));
	}

	#[tokio::test]
	async fn test_reports_reject_customers_and_bad_ranges() {
		let app = app();
		let (status, _) = call(&app, "GET", "/api/reports/summary", CUSTOMER, None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		let (status, summary) = call(&app, "GET", "/api/reports/summary", Some(("m1", "MANAGER")), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(summary["totalOrders"], 0);

		let (status, body) = call(&app, "GET", "/api/reports/revenue?range=decade", ADMIN, None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Invalid time range: decade");

		let (status, series) = call(&app, "GET", "/api/reports/revenue?range=30days", ADMIN, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(series.as_array().unwrap().len(), 30);
	}

	#[tokio::test]
	async fn test_unknown_order_is_not_found() {
		let app = app();
		let (status, body) = call(&app, "GET", "/api/orders/missing", ADMIN, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "NOT_FOUND");
	}

	#[tokio::test]
	async fn test_event_stream_requires_sign_in() {
		let app = app();
		let (status, _) = call(&app, "GET", "/api/notifications/stream", None, None).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);

		let request = Request::builder()
			.uri("/api/notifications/stream")
			.header(USER_ID_HEADER, "u1")
			.body(Body::empty())
			.unwrap();
		let response = app.clone().oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.headers()["content-type"], "text/event-stream");
	}

	#[tokio::test]
	async fn test_broadcast_and_inbox_routes() {
		let app = app();
		let (status, _) = call(
			&app,
			"POST",
			"/api/notifications/register-token",
			CUSTOMER,
			Some(json!({"token": "device-1"})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);

		let (status, body) = call(
			&app,
			"POST",
			"/api/admin/notifications/send",
			ADMIN,
			Some(json!({"title": "Closed Friday", "message": "No deliveries"})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"success": true, "delivered": 1}));

		let (status, inbox) = call(&app, "GET", "/api/notifications", CUSTOMER, None).await;
		assert_eq!(status, StatusCode::OK);
		assert!(inbox.as_array().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_category_routes() {
		let app = app();
		let (status, _) = call(
			&app,
			"POST",
			"/api/categories",
			CUSTOMER,
			Some(json!({"label": "Food", "icon": "MdFastfood"})),
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		let (status, food) = call(
			&app,
			"POST",
			"/api/categories",
			ADMIN,
			Some(json!({"label": "Food", "icon": "MdFastfood"})),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(food["label"], "Food");

		let (status, body) = call(
			&app,
			"POST",
			"/api/products",
			ADMIN,
			Some(json!({"name": "Soap", "price": 300, "category": "Toiletries"})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Unknown category: Toiletries");

		let (status, listed) = call(&app, "GET", "/api/categories", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(listed.as_array().unwrap().len(), 1);

		let (status, _) = call(
			&app,
			"DELETE",
			"/api/categories",
			ADMIN,
			Some(json!({"id": food["id"]})),
		)
		.await;
		assert_eq!(status, StatusCode::NO_CONTENT);
		let (_, listed) = call(&app, "GET", "/api/categories", None, None).await;
		assert!(listed.as_array().unwrap().is_empty());
	}
}
