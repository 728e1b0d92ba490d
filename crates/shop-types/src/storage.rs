//! Storage namespaces used by the shop.

use std::str::FromStr;

/// Storage namespaces for the different data collections.
///
/// Replaces string literals with strongly typed variants so every component
/// agrees on where a record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Catalog entries.
	Products,
	/// Product categories.
	Categories,
	/// Customer orders.
	Orders,
	/// Reimbursement ledger entries.
	Reimbursements,
	/// The settings singleton.
	Settings,
	/// Inbox records.
	Notifications,
	/// Device tokens for push delivery.
	PushTokens,
	/// Directory of known users, used by the growth report.
	Users,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Products => "products",
			StorageKey::Categories => "categories",
			StorageKey::Orders => "orders",
			StorageKey::Reimbursements => "reimbursements",
			StorageKey::Settings => "settings",
			StorageKey::Notifications => "notifications",
			StorageKey::PushTokens => "push_tokens",
			StorageKey::Users => "users",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Products,
			Self::Categories,
			Self::Orders,
			Self::Reimbursements,
			Self::Settings,
			Self::Notifications,
			Self::PushTokens,
			Self::Users,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_namespace_names_round_trip() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("quotes".parse::<StorageKey>().is_err());
	}
}
