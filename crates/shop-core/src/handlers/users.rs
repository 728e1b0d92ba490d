//! Directory of users the shop has seen.
//!
//! Identities come from the upstream auth provider; the shop records a user
//! the first time they act so the growth dashboard has sign-up dates.

use super::OrderError;
use chrono::Utc;
use shop_storage::StorageService;
use shop_types::{AuthenticatedUser, StorageKey, UserProfile};
use std::sync::Arc;

pub struct UserDirectory {
	storage: Arc<StorageService>,
}

impl UserDirectory {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Records `user`, keeping the original first-seen date and refreshing
	/// role, name and email.
	pub async fn record(&self, user: &AuthenticatedUser) -> Result<UserProfile, OrderError> {
		let now = Utc::now();
		Ok(self
			.storage
			.upsert(
				StorageKey::Users,
				&user.id,
				|| UserProfile::first_seen(user, now),
				|profile: &mut UserProfile| {
					profile.role = user.role;
					if user.name.is_some() {
						profile.name = user.name.clone();
					}
					if user.email.is_some() {
						profile.email = user.email.clone();
					}
					Ok::<(), OrderError>(())
				},
			)
			.await?)
	}

	/// Like [`record`](Self::record) but only logs failures.
	pub async fn touch(&self, user: &AuthenticatedUser) {
		if let Err(e) = self.record(user).await {
			tracing::warn!(user_id = %user.id, error = %e, "Failed to record user");
		}
	}

	pub async fn list(&self) -> Result<Vec<UserProfile>, OrderError> {
		Ok(self.storage.list(StorageKey::Users).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::storage;
	use shop_types::Role;

	#[tokio::test]
	async fn test_first_seen_date_is_kept() {
		let directory = UserDirectory::new(storage());
		let mut user = AuthenticatedUser {
			id: "u1".into(),
			role: Role::User,
			name: Some("Ada".into()),
			email: None,
		};
		let first = directory.record(&user).await.unwrap();

		user.role = Role::Manager;
		user.name = None;
		let second = directory.record(&user).await.unwrap();

		assert_eq!(second.created_at, first.created_at);
		assert_eq!(second.role, Role::Manager);
		assert_eq!(second.name.as_deref(), Some("Ada"));
		assert_eq!(directory.list().await.unwrap().len(), 1);
	}
}
