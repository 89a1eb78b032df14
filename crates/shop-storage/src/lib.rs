//! Storage module for the shop order service.
//!
//! This module provides the storage collaborator: a byte-level backend trait
//! with an atomic conditional write, and a typed service that stores values
//! as JSON under `namespace:id` keys.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shop_types::{ConfigSchema, ImplementationRegistry};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

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
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys are opaque strings. Values are opaque bytes.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Replaces the value at `key` only if it currently equals `expected`.
	///
	/// The comparison and the write form one atomic step with respect to
	/// every other writer of this backend. Returns `Ok(false)` when the stored
	/// value differs and `Err(StorageError::NotFound)` when the key is absent.
	async fn compare_and_swap(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<bool, StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries from storage.
	/// Returns the number of entries removed.
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Outcome of [`StorageService::update_if`].
#[derive(Debug)]
pub enum ConditionalUpdate<T> {
	/// The new value was written over `previous`.
	Applied { previous: T, current: T },
	/// The update closure declined to produce a new value.
	Rejected(T),
	/// Another writer changed the value between read and write.
	Conflict,
}

/// High-level storage service that provides typed operations.
///
/// Values are serialized as JSON. The namespace and id are combined to form
/// the backend key.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

fn key_for(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value with optional time-to-live.
	pub async fn store_with_ttl<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&key_for(namespace, id), bytes, ttl)
			.await
	}

	/// Stores a serializable value without time-to-live.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.store_with_ttl(namespace, id, data, None).await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&key_for(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Reads a value, lets `update` derive a replacement, and writes it back
	/// only if nobody else wrote in between.
	///
	/// `update` returns `Some(new)` to write or `None` to leave the value
	/// untouched. The write is a compare-and-swap against the exact bytes
	/// that were read, so two concurrent callers can never both apply.
	pub async fn update_if<T, F>(
		&self,
		namespace: &str,
		id: &str,
		update: F,
	) -> Result<ConditionalUpdate<T>, StorageError>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce(&T) -> Option<T>,
	{
		let key = key_for(namespace, id);
		let current_bytes = self.backend.get_bytes(&key).await?;
		let current: T = serde_json::from_slice(&current_bytes)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;

		let Some(next) = update(&current) else {
			return Ok(ConditionalUpdate::Rejected(current));
		};

		let next_bytes =
			serde_json::to_vec(&next).map_err(|e| StorageError::Serialization(e.to_string()))?;
		if self
			.backend
			.compare_and_swap(&key, &current_bytes, next_bytes, None)
			.await?
		{
			Ok(ConditionalUpdate::Applied {
				previous: current,
				current: next,
			})
		} else {
			Ok(ConditionalUpdate::Conflict)
		}
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&key_for(namespace, id)).await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&key_for(namespace, id)).await
	}

	/// Removes expired entries from storage.
	///
	/// This is a no-op for backends that don't support TTL.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct Counter {
		value: u32,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_store_and_retrieve() {
		let storage = service();
		storage.store("counters", "a", &Counter { value: 1 }).await.unwrap();

		let counter: Counter = storage.retrieve("counters", "a").await.unwrap();
		assert_eq!(counter, Counter { value: 1 });
		assert!(storage.exists("counters", "a").await.unwrap());
		assert!(!storage.exists("counters", "b").await.unwrap());
	}

	#[tokio::test]
	async fn test_update_if_applies_and_rejects() {
		let storage = service();
		storage.store("counters", "a", &Counter { value: 1 }).await.unwrap();

		let applied = storage
			.update_if("counters", "a", |c: &Counter| Some(Counter { value: c.value + 1 }))
			.await
			.unwrap();
		assert!(matches!(
			applied,
			ConditionalUpdate::Applied {
				previous: Counter { value: 1 },
				current: Counter { value: 2 },
			}
		));

		let rejected = storage
			.update_if("counters", "a", |_: &Counter| None)
			.await
			.unwrap();
		assert!(matches!(rejected, ConditionalUpdate::Rejected(Counter { value: 2 })));

		let stored: Counter = storage.retrieve("counters", "a").await.unwrap();
		assert_eq!(stored.value, 2);
	}

	#[tokio::test]
	async fn test_update_if_missing_key() {
		let storage = service();
		let result = storage
			.update_if("counters", "missing", |c: &Counter| Some(Counter { value: c.value }))
			.await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_increments_never_lose_writes() {
		let storage = std::sync::Arc::new(service());
		storage.store("counters", "a", &Counter { value: 0 }).await.unwrap();

		let mut handles = Vec::new();
		for _ in 0..16 {
			let storage = storage.clone();
			handles.push(tokio::spawn(async move {
				// Retry until applied; each retry re-reads.
				loop {
					match storage
						.update_if("counters", "a", |c: &Counter| {
							Some(Counter { value: c.value + 1 })
						})
						.await
						.unwrap()
					{
						ConditionalUpdate::Applied { .. } => break,
						ConditionalUpdate::Conflict => continue,
						ConditionalUpdate::Rejected(_) => unreachable!(),
					}
				}
			}));
		}
		for handle in handles {
			handle.await.unwrap();
		}

		let counter: Counter = storage.retrieve("counters", "a").await.unwrap();
		assert_eq!(counter.value, 16);
	}
}
