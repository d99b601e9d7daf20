//! In-memory storage backend implementation.
//!
//! This module provides a memory-based implementation of the StorageInterface
//! trait, useful for testing and single-process deployments. Compare-and-swap
//! is atomic because the check and the write happen under the same write
//! lock.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use oms_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// Stores rows in a HashMap behind a read-write lock. No persistence across
/// restarts.
pub struct MemoryStorage {
	/// The in-memory store protected by a read-write lock.
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		new: Vec<u8>,
	) -> Result<bool, StorageError> {
		let mut store = self.store.write().await;
		let matches = match (store.get(key), expected) {
			(None, None) => true,
			(Some(current), Some(expected)) => current.as_slice() == expected,
			_ => false,
		};
		if matches {
			store.insert(key.to_string(), new);
		}
		Ok(matches)
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let store = self.store.read().await;
		Ok(store
			.keys()
			.filter(|k| k.starts_with(prefix))
			.cloned()
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "test_key";
		let value = b"test_value".to_vec();
		storage.set_bytes(key, value.clone()).await.unwrap();

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, value);

		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());

		let result = storage.get_bytes(key).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_compare_and_swap_on_absent_key() {
		let storage = MemoryStorage::new();

		// Creation succeeds only once with expected = None
		assert!(storage
			.compare_and_swap("k", None, b"v1".to_vec())
			.await
			.unwrap());
		assert!(!storage
			.compare_and_swap("k", None, b"v2".to_vec())
			.await
			.unwrap());
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"v1".to_vec());
	}

	#[tokio::test]
	async fn test_compare_and_swap_mismatch_leaves_value() {
		let storage = MemoryStorage::new();
		storage.set_bytes("k", b"current".to_vec()).await.unwrap();

		let swapped = storage
			.compare_and_swap("k", Some(b"stale"), b"new".to_vec())
			.await
			.unwrap();
		assert!(!swapped);
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"current".to_vec());

		let swapped = storage
			.compare_and_swap("k", Some(b"current"), b"new".to_vec())
			.await
			.unwrap();
		assert!(swapped);
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"new".to_vec());
	}

	#[tokio::test]
	async fn test_keys_prefix_filter() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:1", b"a".to_vec()).await.unwrap();
		storage.set_bytes("orders:2", b"b".to_vec()).await.unwrap();
		storage
			.set_bytes("complaints:1", b"c".to_vec())
			.await
			.unwrap();

		let mut keys = storage.keys("orders:").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["orders:1".to_string(), "orders:2".to_string()]);
	}
}
