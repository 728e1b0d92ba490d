//! Caller identity types.
//!
//! Authentication itself happens upstream. The shop only consumes the
//! identity the auth provider attaches to a request and the guest token a
//! guest presents for their own order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role assigned to an authenticated user by the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
	Admin,
	Manager,
	User,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Admin => "ADMIN",
			Role::Manager => "MANAGER",
			Role::User => "USER",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"ADMIN" => Ok(Role::Admin),
			"MANAGER" => Ok(Role::Manager),
			"USER" => Ok(Role::User),
			other => Err(format!("Unknown role: {}", other)),
		}
	}
}

/// An authenticated user as seen by the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
	pub id: String,
	pub role: Role,
	pub name: Option<String>,
	pub email: Option<String>,
}

impl AuthenticatedUser {
	/// Admins may mutate orders, products, settings and reimbursements.
	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}

	/// Admins and managers may read dashboards and the full order list.
	pub fn is_staff(&self) -> bool {
		matches!(self.role, Role::Admin | Role::Manager)
	}
}

/// Whoever is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
	/// No identity was supplied. Guests act on their orders with a guest token.
	Anonymous,
	User(AuthenticatedUser),
}

impl Caller {
	pub fn user(&self) -> Option<&AuthenticatedUser> {
		match self {
			Caller::Anonymous => None,
			Caller::User(user) => Some(user),
		}
	}

	pub fn user_id(&self) -> Option<&str> {
		self.user().map(|u| u.id.as_str())
	}

	pub fn is_admin(&self) -> bool {
		self.user().is_some_and(AuthenticatedUser::is_admin)
	}

	pub fn is_staff(&self) -> bool {
		self.user().is_some_and(AuthenticatedUser::is_staff)
	}
}

/// A user the shop has seen, kept for the growth dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
	pub id: String,
	pub role: Role,
	pub name: Option<String>,
	pub email: Option<String>,
	/// When the shop first saw this user.
	pub created_at: DateTime<Utc>,
}

impl UserProfile {
	pub fn first_seen(user: &AuthenticatedUser, now: DateTime<Utc>) -> Self {
		Self {
			id: user.id.clone(),
			role: user.role,
			name: user.name.clone(),
			email: user.email.clone(),
			created_at: now,
		}
	}
}
