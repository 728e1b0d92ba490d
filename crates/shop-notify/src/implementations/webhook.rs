//! Push gateway that POSTs messages to an HTTP relay.
//!
//! The relay receives `{"tokens", "title", "body", "data"}` as JSON and may
//! answer with `{"delivered": n, "failedTokens": [...]}`. Any 2xx without a
//! parsable body counts every token as delivered.

use crate::{NotifierFactory, NotifierInterface, NotifierRegistry, NotifyError, SendReport};
use async_trait::async_trait;
use serde::Deserialize;
use shop_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, PushMessage, Schema, ValidationError,
};
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayResponse {
	delivered: Option<usize>,
	#[serde(default)]
	failed_tokens: Vec<String>,
}

pub struct WebhookNotifier {
	client: reqwest::Client,
	url: String,
	authorization: Option<String>,
}

impl WebhookNotifier {
	pub fn new(
		url: impl Into<String>,
		authorization: Option<String>,
		timeout: Duration,
	) -> Result<Self, NotifyError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotifyError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			url: url.into(),
			authorization,
		})
	}
}

#[async_trait]
impl NotifierInterface for WebhookNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookNotifierSchema)
	}

	async fn send(&self, message: &PushMessage) -> Result<SendReport, NotifyError> {
		let mut request = self.client.post(&self.url).json(message);
		if let Some(authorization) = &self.authorization {
			request = request.header(reqwest::header::AUTHORIZATION, authorization);
		}

		let response = request
			.send()
			.await
			.map_err(|e| NotifyError::Network(e.to_string()))?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(NotifyError::Rejected(format!("{}: {}", status, body)));
		}

		let report = match response.json::<RelayResponse>().await {
			Ok(relay) => SendReport {
				delivered: relay
					.delivered
					.unwrap_or(message.tokens.len() - relay.failed_tokens.len().min(message.tokens.len())),
				failed_tokens: relay.failed_tokens,
			},
			Err(e) => {
				tracing::debug!(error = %e, "Relay answered without a report");
				SendReport {
					delivered: message.tokens.len(),
					failed_tokens: Vec::new(),
				}
			},
		};
		Ok(report)
	}
}

pub struct WebhookNotifierSchema;

impl ConfigSchema for WebhookNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("url must start with http:// or https://".to_string()),
				}
			})],
			vec![
				Field::new("authorization", FieldType::String),
				Field::new(
					"timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: Some(60_000),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a webhook notifier from configuration.
///
/// Configuration parameters:
/// - `url`: relay endpoint (required)
/// - `authorization`: value for the Authorization header
/// - `timeout_ms`: request timeout (default: 5000)
pub fn create_notifier(config: &toml::Value) -> Result<Box<dyn NotifierInterface>, NotifyError> {
	WebhookNotifierSchema
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| NotifyError::Configuration("url is required".into()))?;
	let authorization = config
		.get("authorization")
		.and_then(|v| v.as_str())
		.map(str::to_string);
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|ms| ms as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	Ok(Box::new(WebhookNotifier::new(
		url,
		authorization,
		Duration::from_millis(timeout_ms),
	)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = NotifierFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotifierRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
	use std::sync::{Arc, Mutex};

	type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

	async fn relay(
		State(captured): State<Captured>,
		headers: HeaderMap,
		Json(body): Json<serde_json::Value>,
	) -> Json<serde_json::Value> {
		let auth = headers
			.get("authorization")
			.and_then(|v| v.to_str().ok())
			.map(str::to_string);
		captured.lock().unwrap().push((auth, body));
		Json(serde_json::json!({"delivered": 1, "failedTokens": ["stale"]}))
	}

	async fn spawn_relay() -> (String, Captured) {
		let captured: Captured = Arc::default();
		let app = Router::new()
			.route("/push", post(relay))
			.with_state(captured.clone());
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		(format!("http://{}/push", addr), captured)
	}

	#[tokio::test]
	async fn test_posts_message_and_reads_report() {
		let (url, captured) = spawn_relay().await;
		let notifier =
			WebhookNotifier::new(url, Some("Bearer secret".into()), Duration::from_secs(5)).unwrap();

		let message = PushMessage::new(vec!["fresh".into(), "stale".into()], "Order dispatched", "On its way")
			.with_data("url", "/orders/o1");
		let report = notifier.send(&message).await.unwrap();

		assert_eq!(report.delivered, 1);
		assert_eq!(report.failed_tokens, vec!["stale".to_string()]);

		let captured = captured.lock().unwrap();
		let (auth, body) = &captured[0];
		assert_eq!(auth.as_deref(), Some("Bearer secret"));
		assert_eq!(body["title"], "Order dispatched");
		assert_eq!(body["data"]["url"], "/orders/o1");
	}

	#[tokio::test]
	async fn test_unreachable_relay_is_a_network_error() {
		let notifier =
			WebhookNotifier::new("http://127.0.0.1:1/push", None, Duration::from_millis(200)).unwrap();
		let result = notifier
			.send(&PushMessage::new(vec!["t".into()], "Hi", "There"))
			.await;
		assert!(matches!(result, Err(NotifyError::Network(_))));
	}

	#[test]
	fn test_schema_requires_http_url() {
		let config: toml::Value = toml::from_str("url = \"ftp://relay\"").unwrap();
		assert!(create_notifier(&config).is_err());
		let config: toml::Value = toml::from_str("timeout_ms = 10").unwrap();
		assert!(create_notifier(&config).is_err());
		let config: toml::Value = toml::from_str("url = \"https://relay/push\"").unwrap();
		assert!(create_notifier(&config).is_ok());
	}
}
