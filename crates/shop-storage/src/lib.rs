//! Storage module for the shop.
//!
//! This module provides a byte-level key-value abstraction with pluggable
//! backends (in-memory and file-based) and a typed [`StorageService`] on top
//! of it. Every read-modify-write of a shop record goes through
//! [`StorageService::modify`], which retries on the backend's
//! compare-and-swap so concurrent writers never lose updates.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shop_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// How many times a conditional write is attempted before giving up.
const MAX_CAS_ATTEMPTS: usize = 16;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// A conditional write kept losing against concurrent writers.
	#[error("Write conflict on {0}")]
	Conflict(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys have the form `namespace:id`. Besides plain reads and writes a
/// backend must offer prefix listing and an atomic compare-and-swap.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, overwriting any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key. Missing keys are not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every key starting with `prefix`, in ascending order.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Atomically replaces the value at `key` if it currently equals
	/// `expected` (`None` meaning absent). `new == None` deletes the key.
	///
	/// Returns whether the swap happened.
	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		new: Option<Vec<u8>>,
	) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples used by the service to
/// resolve `storage.primary`.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn record_key(namespace: StorageKey, id: &str) -> String {
	format!("{}:{}", namespace.as_str(), id)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// High-level storage service that provides typed operations.
///
/// Records are serialized as JSON under `namespace:id`.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a record, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.backend
			.set_bytes(&record_key(namespace, id), encode(data)?)
			.await
	}

	/// Retrieves and deserializes a record.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&record_key(namespace, id)).await?;
		decode(&bytes)
	}

	/// Like [`retrieve`](Self::retrieve) but maps a missing record to `None`.
	pub async fn find<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Removes a record.
	pub async fn remove(&self, namespace: StorageKey, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&record_key(namespace, id)).await
	}

	/// Checks if a record exists.
	pub async fn exists(&self, namespace: StorageKey, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&record_key(namespace, id)).await
	}

	/// Loads every record of a namespace.
	///
	/// Records deleted between listing and reading are skipped.
	pub async fn list<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
	) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace.as_str());
		let keys = self.backend.list_keys(&prefix).await?;
		let mut records = Vec::with_capacity(keys.len());
		for key in keys {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => records.push(decode(&bytes)?),
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(records)
	}

	/// Atomically applies `f` to an existing record.
	///
	/// The record is re-read and `f` re-run whenever another writer got in
	/// between, so `f` must be free of side effects besides mutating its
	/// argument. An `Err` from `f` aborts without writing.
	pub async fn modify<T, E, F>(&self, namespace: StorageKey, id: &str, f: F) -> Result<T, E>
	where
		T: Serialize + DeserializeOwned,
		E: From<StorageError>,
		F: FnMut(&mut T) -> Result<(), E>,
	{
		self.modify_or_insert_with(namespace, id, || None, f).await
	}

	/// Like [`modify`](Self::modify), but starts from `init()` when the
	/// record does not exist yet.
	pub async fn upsert<T, E, D, F>(
		&self,
		namespace: StorageKey,
		id: &str,
		init: D,
		f: F,
	) -> Result<T, E>
	where
		T: Serialize + DeserializeOwned,
		E: From<StorageError>,
		D: Fn() -> T,
		F: FnMut(&mut T) -> Result<(), E>,
	{
		self.modify_or_insert_with(namespace, id, || Some(init()), f)
			.await
	}

	async fn modify_or_insert_with<T, E, D, F>(
		&self,
		namespace: StorageKey,
		id: &str,
		init: D,
		mut f: F,
	) -> Result<T, E>
	where
		T: Serialize + DeserializeOwned,
		E: From<StorageError>,
		D: Fn() -> Option<T>,
		F: FnMut(&mut T) -> Result<(), E>,
	{
		let key = record_key(namespace, id);
		for attempt in 1..=MAX_CAS_ATTEMPTS {
			let current = match self.backend.get_bytes(&key).await {
				Ok(bytes) => Some(bytes),
				Err(StorageError::NotFound) => None,
				Err(e) => return Err(e.into()),
			};
			let mut value = match &current {
				Some(bytes) => decode(bytes)?,
				None => init().ok_or(StorageError::NotFound)?,
			};

			f(&mut value)?;

			let swapped = self
				.backend
				.compare_and_swap(&key, current.as_deref(), Some(encode(&value)?))
				.await?;
			if swapped {
				return Ok(value);
			}
			tracing::debug!(key = %key, attempt, "Concurrent write detected, retrying");
		}
		Err(StorageError::Conflict(key).into())
	}

	/// Atomically deletes a record after `check` accepts its current value.
	pub async fn remove_if<T, E, F>(&self, namespace: StorageKey, id: &str, check: F) -> Result<T, E>
	where
		T: DeserializeOwned,
		E: From<StorageError>,
		F: Fn(&T) -> Result<(), E>,
	{
		let key = record_key(namespace, id);
		for attempt in 1..=MAX_CAS_ATTEMPTS {
			let current = self.backend.get_bytes(&key).await?;
			let value: T = decode(&current)?;
			check(&value)?;

			if self
				.backend
				.compare_and_swap(&key, Some(&current), None)
				.await?
			{
				return Ok(value);
			}
			tracing::debug!(key = %key, attempt, "Concurrent write detected, retrying");
		}
		Err(StorageError::Conflict(key).into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;
	use std::sync::Arc;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Counter {
		value: u32,
	}

	#[derive(Debug)]
	enum TestError {
		Storage(StorageError),
		TooHigh,
	}

	impl From<StorageError> for TestError {
		fn from(e: StorageError) -> Self {
			TestError::Storage(e)
		}
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_store_retrieve_and_list() {
		let storage = service();
		storage
			.store(StorageKey::Products, "a", &Counter { value: 1 })
			.await
			.unwrap();
		storage
			.store(StorageKey::Products, "b", &Counter { value: 2 })
			.await
			.unwrap();
		storage
			.store(StorageKey::Orders, "a", &Counter { value: 9 })
			.await
			.unwrap();

		let products: Vec<Counter> = storage.list(StorageKey::Products).await.unwrap();
		assert_eq!(products, vec![Counter { value: 1 }, Counter { value: 2 }]);

		let missing: Option<Counter> = storage.find(StorageKey::Products, "zz").await.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_modify_requires_existing_record() {
		let storage = service();
		let result: Result<Counter, TestError> = storage
			.modify(StorageKey::Products, "nope", |c: &mut Counter| {
				c.value += 1;
				Ok(())
			})
			.await;
		assert!(matches!(result, Err(TestError::Storage(StorageError::NotFound))));
	}

	#[tokio::test]
	async fn test_modify_aborts_without_writing_on_error() {
		let storage = service();
		storage
			.store(StorageKey::Products, "a", &Counter { value: 5 })
			.await
			.unwrap();

		let result: Result<Counter, TestError> = storage
			.modify(StorageKey::Products, "a", |c: &mut Counter| {
				c.value += 10;
				if c.value > 10 {
					return Err(TestError::TooHigh);
				}
				Ok(())
			})
			.await;
		assert!(matches!(result, Err(TestError::TooHigh)));

		let stored: Counter = storage.retrieve(StorageKey::Products, "a").await.unwrap();
		assert_eq!(stored.value, 5);
	}

	#[tokio::test]
	async fn test_concurrent_modifications_are_not_lost() {
		let storage = Arc::new(service());
		storage
			.store(StorageKey::Products, "a", &Counter { value: 0 })
			.await
			.unwrap();

		let mut handles = Vec::new();
		for _ in 0..8 {
			let storage = storage.clone();
			handles.push(tokio::spawn(async move {
				let result: Result<Counter, StorageError> = storage
					.modify(StorageKey::Products, "a", |c: &mut Counter| {
						c.value += 1;
						Ok(())
					})
					.await;
				result.unwrap();
			}));
		}
		for handle in handles {
			handle.await.unwrap();
		}

		let stored: Counter = storage.retrieve(StorageKey::Products, "a").await.unwrap();
		assert_eq!(stored.value, 8);
	}

	#[tokio::test]
	async fn test_upsert_creates_from_default() {
		let storage = service();
		let created: Result<Counter, StorageError> = storage
			.upsert(
				StorageKey::Settings,
				"settings",
				|| Counter { value: 100 },
				|c| {
					c.value += 1;
					Ok(())
				},
			)
			.await;
		assert_eq!(created.unwrap().value, 101);
	}

	#[tokio::test]
	async fn test_remove_if_checks_current_value() {
		let storage = service();
		storage
			.store(StorageKey::Orders, "o1", &Counter { value: 3 })
			.await
			.unwrap();

		let rejected: Result<Counter, TestError> = storage
			.remove_if(StorageKey::Orders, "o1", |c: &Counter| {
				if c.value > 1 {
					Err(TestError::TooHigh)
				} else {
					Ok(())
				}
			})
			.await;
		assert!(rejected.is_err());
		assert!(storage.exists(StorageKey::Orders, "o1").await.unwrap());

		let removed: Result<Counter, TestError> = storage
			.remove_if(StorageKey::Orders, "o1", |_: &Counter| Ok(()))
			.await;
		assert_eq!(removed.unwrap().value, 3);
		assert!(!storage.exists(StorageKey::Orders, "o1").await.unwrap());
	}
}
