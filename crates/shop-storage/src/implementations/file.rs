//! File-based storage backend.
//!
//! Each record lives in `<storage_path>/<namespace>/<id>.json`. Writes go
//! to a temp file that is then renamed over the record, and every mutation
//! holds an exclusive `fs2` lock on `<storage_path>/.lock` so that
//! compare-and-swap is atomic across tasks and processes.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use shop_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const RECORD_EXTENSION: &str = "json";
const DEFAULT_NAMESPACE: &str = "_";

fn backend_error(e: impl std::fmt::Display) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// Escapes characters that may not appear in a file name.
fn escape_segment(segment: &str) -> String {
	let mut escaped = String::with_capacity(segment.len());
	for c in segment.chars() {
		match c {
			'%' => escaped.push_str("%25"),
			'/' => escaped.push_str("%2F"),
			'\\' => escaped.push_str("%5C"),
			':' => escaped.push_str("%3A"),
			'.' if escaped.is_empty() => escaped.push_str("%2E"),
			c => escaped.push(c),
		}
	}
	escaped
}

fn unescape_segment(segment: &str) -> String {
	let mut unescaped = String::with_capacity(segment.len());
	let mut rest = segment;
	while let Some(pos) = rest.find('%') {
		unescaped.push_str(&rest[..pos]);
		let decoded = match rest.get(pos + 1..pos + 3) {
			Some("25") => Some('%'),
			Some("2F") => Some('/'),
			Some("5C") => Some('\\'),
			Some("3A") => Some(':'),
			Some("2E") => Some('.'),
			_ => None,
		};
		match decoded {
			Some(c) => {
				unescaped.push(c);
				rest = &rest[pos + 3..];
			},
			None => {
				unescaped.push('%');
				rest = &rest[pos + 1..];
			},
		}
	}
	unescaped.push_str(rest);
	unescaped
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage rooted at `base_path`.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Maps `namespace:id` to its record file.
	fn record_path(base: &Path, key: &str) -> PathBuf {
		let (namespace, id) = key.split_once(':').unwrap_or((DEFAULT_NAMESPACE, key));
		base.join(escape_segment(namespace))
			.join(format!("{}.{}", escape_segment(id), RECORD_EXTENSION))
	}

	fn read_record(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(path) {
			Ok(data) => Ok(Some(data)),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(backend_error(e)),
		}
	}

	fn write_record(path: &Path, value: &[u8]) -> Result<(), StorageError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(backend_error)?;
		}
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value).map_err(backend_error)?;
		fs::rename(&temp_path, path).map_err(backend_error)
	}

	fn remove_record(path: &Path) -> Result<(), StorageError> {
		match fs::remove_file(path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(backend_error(e)),
		}
	}

	/// Runs `op` on a blocking thread while holding the exclusive lock.
	async fn locked<R, F>(&self, op: F) -> Result<R, StorageError>
	where
		R: Send + 'static,
		F: FnOnce(&Path) -> Result<R, StorageError> + Send + 'static,
	{
		let base = self.base_path.clone();
		tokio::task::spawn_blocking(move || {
			fs::create_dir_all(&base).map_err(backend_error)?;
			let lock = fs::OpenOptions::new()
				.create(true)
				.truncate(false)
				.write(true)
				.open(base.join(".lock"))
				.map_err(backend_error)?;
			lock.lock_exclusive().map_err(backend_error)?;
			let result = op(&base);
			if let Err(e) = FileExt::unlock(&lock) {
				tracing::warn!(error = %e, "Failed to release storage lock");
			}
			result
		})
		.await
		.map_err(backend_error)?
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = Self::record_path(&self.base_path, key);
		match tokio::fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(backend_error(e)),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let key = key.to_string();
		self.locked(move |base| Self::write_record(&Self::record_path(base, &key), &value))
			.await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let key = key.to_string();
		self.locked(move |base| Self::remove_record(&Self::record_path(base, &key)))
			.await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = Self::record_path(&self.base_path, key);
		tokio::fs::try_exists(&path).await.map_err(backend_error)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let (namespace, id_prefix) = prefix.split_once(':').unwrap_or((DEFAULT_NAMESPACE, prefix));
		let dir = self.base_path.join(escape_segment(namespace));

		let mut entries = match tokio::fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend_error(e)),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend_error)? {
			let path = entry.path();
			if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
				continue;
			}
			let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
				tracing::debug!(path = ?path, "Skipping non UTF-8 record file");
				continue;
			};
			let id = unescape_segment(stem);
			if id.starts_with(id_prefix) {
				keys.push(format!("{}:{}", namespace, id));
			}
		}
		keys.sort();
		Ok(keys)
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		new: Option<Vec<u8>>,
	) -> Result<bool, StorageError> {
		let key = key.to_string();
		let expected = expected.map(<[u8]>::to_vec);
		self.locked(move |base| {
			let path = Self::record_path(base, &key);
			if Self::read_record(&path)? != expected {
				return Ok(false);
			}
			match new {
				Some(value) => Self::write_record(&path, &value)?,
				None => Self::remove_record(&path)?,
			}
			Ok(true)
		})
		.await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if !path.trim().is_empty() => Ok(()),
					_ => Err("storage_path cannot be empty".to_string()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory for record files (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn storage() -> (TempDir, FileStorage) {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		(dir, storage)
	}

	#[tokio::test]
	async fn test_basic_operations() {
		let (_dir, storage) = storage();

		storage.set_bytes("orders:o1", b"one".to_vec()).await.unwrap();
		assert_eq!(storage.get_bytes("orders:o1").await.unwrap(), b"one");
		assert!(storage.exists("orders:o1").await.unwrap());

		storage.delete("orders:o1").await.unwrap();
		assert!(!storage.exists("orders:o1").await.unwrap());
		assert!(matches!(
			storage.get_bytes("orders:o1").await,
			Err(StorageError::NotFound)
		));
		storage.delete("orders:o1").await.unwrap();
	}

	#[tokio::test]
	async fn test_records_survive_reopen() {
		let (dir, storage) = storage();
		storage.set_bytes("settings:settings", b"{}".to_vec()).await.unwrap();
		drop(storage);

		let reopened = FileStorage::new(dir.path().to_path_buf());
		assert_eq!(reopened.get_bytes("settings:settings").await.unwrap(), b"{}");
	}

	#[tokio::test]
	async fn test_list_keys_round_trips_escaped_ids() {
		let (_dir, storage) = storage();
		for key in ["push_tokens:user:u1", "push_tokens:order:o/1", "orders:a"] {
			storage.set_bytes(key, vec![1]).await.unwrap();
		}

		assert_eq!(
			storage.list_keys("push_tokens:").await.unwrap(),
			vec![
				"push_tokens:order:o/1".to_string(),
				"push_tokens:user:u1".to_string()
			]
		);
		assert_eq!(
			storage.list_keys("push_tokens:user:").await.unwrap(),
			vec!["push_tokens:user:u1".to_string()]
		);
		assert!(storage.list_keys("missing:").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_compare_and_swap() {
		let (_dir, storage) = storage();

		assert!(storage
			.compare_and_swap("products:p1", None, Some(b"v1".to_vec()))
			.await
			.unwrap());
		assert!(!storage
			.compare_and_swap("products:p1", Some(&b"v0"[..]), Some(b"v2".to_vec()))
			.await
			.unwrap());
		assert!(storage
			.compare_and_swap("products:p1", Some(&b"v1"[..]), Some(b"v2".to_vec()))
			.await
			.unwrap());
		assert_eq!(storage.get_bytes("products:p1").await.unwrap(), b"v2");
		assert!(storage
			.compare_and_swap("products:p1", Some(&b"v2"[..]), None)
			.await
			.unwrap());
		assert!(!storage.exists("products:p1").await.unwrap());
	}

	#[test]
	fn test_schema_rejects_empty_path() {
		let config: toml::Value = toml::from_str("storage_path = \"\"").unwrap();
		assert!(FileStorageSchema.validate(&config).is_err());
		let config: toml::Value = toml::from_str("storage_path = \"/tmp/shop\"").unwrap();
		assert!(FileStorageSchema.validate(&config).is_ok());
	}
}
