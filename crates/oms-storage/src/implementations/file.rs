//! File-based storage backend implementation.
//!
//! This module provides a file-per-row implementation of the StorageInterface
//! trait. Keys of the form `namespace:id` map to `<base>/<namespace>/<id>.json`.
//! Compare-and-swap takes an exclusive advisory lock on the row file so
//! concurrent processes cannot interleave the read-compare-write sequence.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use oms_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory holding one subdirectory per namespace.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage rooted at the given directory.
	pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
		let base_path = base_path.into();
		fs::create_dir_all(&base_path)
			.map_err(|e| StorageError::Backend(format!("Failed to create storage dir: {}", e)))?;
		Ok(Self { base_path })
	}

	/// Maps a `namespace:id` key to its file path, sanitizing both parts.
	fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
		let (namespace, id) = key
			.split_once(':')
			.ok_or_else(|| StorageError::Backend(format!("Malformed key: {}", key)))?;
		Ok(self
			.base_path
			.join(sanitize(namespace))
			.join(format!("{}.json", sanitize(id))))
	}

	fn ensure_parent(path: &Path) -> Result<(), StorageError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.map_err(|e| StorageError::Backend(format!("Failed to create dir: {}", e)))?;
		}
		Ok(())
	}
}

/// Replaces path-hostile characters in a key segment.
fn sanitize(segment: &str) -> String {
	segment
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
				c
			} else {
				'_'
			}
		})
		.collect()
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.path_for(key)?;
		match fs::read(&path) {
			Ok(bytes) if bytes.is_empty() => Err(StorageError::NotFound),
			Ok(bytes) => Ok(bytes),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.path_for(key)?;
		Self::ensure_parent(&path)?;
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(false)
			.open(&path)
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		file.lock_exclusive()
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		let result = write_locked(&file, &value);
		let _ = fs2::FileExt::unlock(&file);
		result
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		new: Vec<u8>,
	) -> Result<bool, StorageError> {
		let path = self.path_for(key)?;
		Self::ensure_parent(&path)?;
		let mut file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(false)
			.open(&path)
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		file.lock_exclusive()
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let result = (|| {
			let mut current = Vec::new();
			file.read_to_end(&mut current)
				.map_err(|e| StorageError::Backend(e.to_string()))?;
			// An empty file is an absent key (created by this open call).
			let matches = match expected {
				None => current.is_empty(),
				Some(expected) => current.as_slice() == expected,
			};
			if matches {
				write_locked(&file, &new)?;
			}
			Ok(matches)
		})();
		let _ = fs2::FileExt::unlock(&file);
		result
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.path_for(key)?;
		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		match self.get_bytes(key).await {
			Ok(_) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let namespace = prefix.strip_suffix(':').unwrap_or(prefix);
		let dir = self.base_path.join(sanitize(namespace));
		let entries = match fs::read_dir(&dir) {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut keys = Vec::new();
		for entry in entries {
			let entry = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
			let name = entry.file_name();
			let name = name.to_string_lossy();
			if let Some(stem) = name.strip_suffix(".json") {
				keys.push(format!("{}:{}", namespace, stem));
			}
		}
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Truncates the locked file and writes the new contents.
fn write_locked(mut file: &std::fs::File, value: &[u8]) -> Result<(), StorageError> {
	file.set_len(0)
		.map_err(|e| StorageError::Backend(e.to_string()))?;
	file.seek(SeekFrom::Start(0))
		.map_err(|e| StorageError::Backend(e.to_string()))?;
	file.write_all(value)
		.map_err(|e| StorageError::Backend(e.to_string()))?;
	file.sync_data()
		.map_err(|e| StorageError::Backend(e.to_string()))?;
	Ok(())
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![Field::new("storage_path", FieldType::String)], vec![]);
		schema.validate(config)
	}
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

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory for row files
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StorageError::Configuration("storage_path is required".into()))?;
	Ok(Box::new(FileStorage::new(path)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_roundtrip_and_listing() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path()).unwrap();

		storage
			.set_bytes("orders:abc", b"{\"id\":1}".to_vec())
			.await
			.unwrap();
		storage
			.set_bytes("orders:def", b"{\"id\":2}".to_vec())
			.await
			.unwrap();

		assert_eq!(
			storage.get_bytes("orders:abc").await.unwrap(),
			b"{\"id\":1}".to_vec()
		);

		let mut keys = storage.keys("orders:").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["orders:abc", "orders:def"]);

		storage.delete("orders:abc").await.unwrap();
		assert!(!storage.exists("orders:abc").await.unwrap());
	}

	#[tokio::test]
	async fn test_compare_and_swap() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path()).unwrap();

		assert!(storage
			.compare_and_swap("orders:x", None, b"v1".to_vec())
			.await
			.unwrap());
		assert!(!storage
			.compare_and_swap("orders:x", Some(b"stale"), b"v2".to_vec())
			.await
			.unwrap());
		assert!(storage
			.compare_and_swap("orders:x", Some(b"v1"), b"v2".to_vec())
			.await
			.unwrap());
		assert_eq!(
			storage.get_bytes("orders:x").await.unwrap(),
			b"v2".to_vec()
		);
	}

	#[tokio::test]
	async fn test_sanitizes_hostile_ids() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path()).unwrap();

		storage
			.set_bytes("orders:../../etc/passwd", b"x".to_vec())
			.await
			.unwrap();
		let keys = storage.keys("orders:").await.unwrap();
		assert_eq!(keys.len(), 1);
		assert!(!keys[0].contains('/'));
	}
}
