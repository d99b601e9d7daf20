//! Storage module for the order management system.
//!
//! This module provides the port to the external order store: a key-value
//! abstraction with namespaced keys, a listing primitive for feed queries,
//! and an atomic compare-and-swap used to close the race window between two
//! couriers claiming the same order. Backends include in-memory and
//! file-based implementations.

use async_trait::async_trait;
use oms_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Maximum reloads of a contended row before giving up.
const MAX_CAS_RETRIES: usize = 16;

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
	/// Error that occurs when a row stays contended past the retry budget.
	#[error("Row contention exceeded retry budget")]
	Contention,
}

/// Outcome of a conditional mutation.
///
/// Distinguishes storage failures from domain-level rejections raised by the
/// mutation closure, so callers can treat the latter as ordinary branches.
#[derive(Debug, Error)]
pub enum MutateError<E> {
	/// The storage backend failed.
	#[error(transparent)]
	Storage(StorageError),
	/// The mutation closure rejected the current row state.
	#[error("Mutation rejected")]
	Rejected(E),
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the marketplace core. Besides basic key-value operations
/// it requires an atomic compare-and-swap, the single correctness-critical
/// guarantee for courier claim exclusivity.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, creating or overwriting the key.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Atomically replaces the value at `key` only if it currently equals
	/// `expected`. An `expected` of None means the key must be absent.
	///
	/// Returns Ok(true) when the swap happened, Ok(false) when the current
	/// value did not match.
	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		new: Vec<u8>,
	) -> Result<bool, StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists all keys starting with the given prefix.
	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must
/// provide to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage
/// implementations, used by the service layer to build its factory map.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed rows with automatic
/// serialization, plus a compare-and-swap backed `mutate` loop for
/// conditional updates.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable row, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	/// Stores a row only if the key does not exist yet.
	///
	/// Returns Ok(false) when the key was already present.
	pub async fn store_new<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<bool, StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.compare_and_swap(&Self::key(namespace, id), None, bytes)
			.await
	}

	/// Retrieves and deserializes a row from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Removes a row from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	/// Checks if a row exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}

	/// Retrieves and deserializes all rows in a namespace.
	///
	/// Rows that fail to deserialize are skipped with a warning rather than
	/// failing the whole listing.
	pub async fn list<T: DeserializeOwned>(&self, namespace: &str) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace);
		let keys = self.backend.keys(&prefix).await?;
		let mut rows = Vec::with_capacity(keys.len());
		for key in keys {
			let bytes = match self.backend.get_bytes(&key).await {
				Ok(bytes) => bytes,
				// Deleted between listing and read.
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			};
			match serde_json::from_slice(&bytes) {
				Ok(row) => rows.push(row),
				Err(e) => {
					tracing::warn!(key = %key, error = %e, "Skipping undeserializable row");
				}
			}
		}
		Ok(rows)
	}

	/// Applies a conditional mutation to a row under compare-and-swap.
	///
	/// The closure receives the current row and either patches it or rejects
	/// the mutation with a domain error. On contention the row is reloaded
	/// and the closure re-evaluated, so a claim that lost the race observes
	/// the winner's write and can reject accordingly.
	pub async fn mutate<T, E, F>(
		&self,
		namespace: &str,
		id: &str,
		mut apply: F,
	) -> Result<T, MutateError<E>>
	where
		T: Serialize + DeserializeOwned,
		F: FnMut(&mut T) -> Result<(), E>,
	{
		let key = Self::key(namespace, id);
		for _ in 0..MAX_CAS_RETRIES {
			let current = self
				.backend
				.get_bytes(&key)
				.await
				.map_err(MutateError::Storage)?;
			let mut row: T = serde_json::from_slice(&current)
				.map_err(|e| MutateError::Storage(StorageError::Serialization(e.to_string())))?;

			apply(&mut row).map_err(MutateError::Rejected)?;

			let new = serde_json::to_vec(&row)
				.map_err(|e| MutateError::Storage(StorageError::Serialization(e.to_string())))?;
			let swapped = self
				.backend
				.compare_and_swap(&key, Some(&current), new)
				.await
				.map_err(MutateError::Storage)?;
			if swapped {
				return Ok(row);
			}
			// Lost the race; reload and re-evaluate.
		}
		Err(MutateError::Storage(StorageError::Contention))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
	struct Row {
		owner: Option<String>,
		count: u32,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn store_and_retrieve_typed() {
		let storage = service();
		let row = Row {
			owner: None,
			count: 1,
		};
		storage.store("rows", "a", &row).await.unwrap();
		let loaded: Row = storage.retrieve("rows", "a").await.unwrap();
		assert_eq!(loaded, row);
	}

	#[tokio::test]
	async fn store_new_rejects_existing() {
		let storage = service();
		let row = Row {
			owner: None,
			count: 1,
		};
		assert!(storage.store_new("rows", "a", &row).await.unwrap());
		assert!(!storage.store_new("rows", "a", &row).await.unwrap());
	}

	#[tokio::test]
	async fn mutate_applies_patch() {
		let storage = service();
		storage
			.store(
				"rows",
				"a",
				&Row {
					owner: None,
					count: 0,
				},
			)
			.await
			.unwrap();

		let updated: Row = storage
			.mutate("rows", "a", |row: &mut Row| -> Result<(), String> {
				row.count += 1;
				Ok(())
			})
			.await
			.unwrap();
		assert_eq!(updated.count, 1);
	}

	#[tokio::test]
	async fn mutate_surfaces_rejection() {
		let storage = service();
		storage
			.store(
				"rows",
				"a",
				&Row {
					owner: Some("other".into()),
					count: 0,
				},
			)
			.await
			.unwrap();

		let result = storage
			.mutate("rows", "a", |row: &mut Row| {
				if row.owner.is_some() {
					return Err("taken");
				}
				row.owner = Some("me".into());
				Ok(())
			})
			.await;
		assert!(matches!(result, Err(MutateError::Rejected("taken"))));
	}

	#[tokio::test]
	async fn list_returns_namespace_rows() {
		let storage = service();
		for id in ["a", "b", "c"] {
			storage
				.store(
					"rows",
					id,
					&Row {
						owner: None,
						count: 0,
					},
				)
				.await
				.unwrap();
		}
		storage
			.store(
				"other",
				"x",
				&Row {
					owner: None,
					count: 9,
				},
			)
			.await
			.unwrap();

		let rows: Vec<Row> = storage.list("rows").await.unwrap();
		assert_eq!(rows.len(), 3);
	}
}
