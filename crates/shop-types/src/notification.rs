//! Notification inbox records, push token registrations and outgoing push
//! messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::Role;

/// An inbox entry shown in the app.
///
/// `user_id == None` marks the shared staff inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
	pub id: String,
	pub user_id: Option<String>,
	pub title: String,
	pub body: String,
	pub order_id: Option<String>,
	#[serde(default)]
	pub read: bool,
	pub created_at: DateTime<Utc>,
}

/// Who a device token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PushOwner {
	User { user_id: String, role: Role },
	/// A guest registers against the order they placed.
	GuestOrder { order_id: String },
}

impl PushOwner {
	/// Storage id of the registration.
	pub fn key(&self) -> String {
		match self {
			PushOwner::User { user_id, .. } => format!("user:{}", user_id),
			PushOwner::GuestOrder { order_id } => format!("order:{}", order_id),
		}
	}
}

/// A device token registered for push delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRegistration {
	pub owner: PushOwner,
	pub token: String,
	pub updated_at: DateTime<Utc>,
}

/// Body of a token registration request. A `null` token disables push for
/// the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenRequest {
	pub token: Option<String>,
	pub order_id: Option<String>,
	pub guest_token: Option<String>,
}

/// A message handed to the push gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
	pub tokens: Vec<String>,
	pub title: String,
	pub body: String,
	#[serde(default)]
	pub data: HashMap<String, String>,
}

impl PushMessage {
	pub fn new(tokens: Vec<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
		Self {
			tokens,
			title: title.into(),
			body: body.into(),
			data: HashMap::new(),
		}
	}

	pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.data.insert(key.into(), value.into());
		self
	}
}
