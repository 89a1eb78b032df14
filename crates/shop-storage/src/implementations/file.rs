//! File-based storage backend.
//!
//! Each key is one file under the configured directory, named by the hex
//! encoding of the full key. Files carry a small header with an expiry
//! timestamp so namespaces can be given a TTL.
//!
//! Writers take an exclusive `fs2` lock on one of a fixed set of lock files
//! under `locks/`, picked by hashing the key. Writes to keys on different
//! shards never wait on each other, and the lock directory never grows past
//! `LOCK_SHARDS` files.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use shop_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageKey, ValidationError,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

/// Number of lock files a storage directory can hold.
const LOCK_SHARDS: usize = 256;

fn now_secs() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or_default()
}

/// Fixed-size file header.
///
/// Binary layout (16 bytes total):
/// - [0-3]: Magic bytes "SHOP"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, unix seconds, 0 = never)
/// - [14-15]: Reserved
#[derive(Debug, Clone, PartialEq)]
struct FileHeader {
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"SHOP";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			now_secs().saturating_add(ttl.as_secs())
		};
		Self { expires_at }
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&Self::VERSION.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Bad file magic".into()));
		}
		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}
		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);
		Ok(Self {
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && now_secs() >= self.expires_at
	}
}

/// TTL configuration per storage namespace.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	/// Reads `ttl_<namespace>` entries from the backend's table.
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();
		if let Some(table) = config.as_table() {
			for storage_key in StorageKey::all() {
				let config_key = format!("ttl_{}", storage_key.as_str());
				if let Some(secs) = table.get(&config_key).and_then(|v| v.as_integer()) {
					ttls.insert(storage_key, Duration::from_secs(secs.max(0) as u64));
				}
			}
		}
		Self { ttls }
	}

	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// Picks the lock shard for a key (FNV-1a).
fn lock_shard(key: &str) -> usize {
	let hash = key
		.bytes()
		.fold(0x811c_9dc5_u32, |hash, byte| (hash ^ byte as u32).wrapping_mul(0x0100_0193));
	hash as usize % LOCK_SHARDS
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	/// Maps a storage key to its file. The encoding is reversible, so two
	/// distinct keys never share a file.
	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(format!("{}.bin", hex::encode(key)))
	}

	/// Recovers the storage key from a file written by this backend.
	fn key_from_path(path: &Path) -> Option<String> {
		let stem = path.file_stem()?.to_str()?;
		String::from_utf8(hex::decode(stem).ok()?).ok()
	}

	fn lock_path(&self, key: &str) -> PathBuf {
		self.base_path
			.join("locks")
			.join(format!("{:02x}.lock", lock_shard(key)))
	}

	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");
		namespace
			.parse::<StorageKey>()
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	/// Takes an exclusive advisory lock on the key's shard, released on drop.
	async fn lock_key(&self, key: &str) -> Result<std::fs::File, StorageError> {
		let lock_path = self.lock_path(key);
		if let Some(parent) = lock_path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}
		tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
			let file = std::fs::OpenOptions::new()
				.create(true)
				.truncate(false)
				.write(true)
				.open(&lock_path)?;
			file.lock_exclusive()?;
			Ok(file)
		})
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?
		.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn write_file(
		&self,
		path: &Path,
		key: &str,
		value: &[u8],
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&FileHeader::new(ttl).serialize());
		file_data.extend_from_slice(value);

		// Write to a temp file then rename so readers never see a torn value.
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			let Some(key) = Self::key_from_path(&path) else {
				tracing::debug!("Skipping foreign file {:?}", path);
				continue;
			};
			if !Self::is_expired_file(&path).await {
				continue;
			}

			// Re-check under the lock so a concurrent write is never removed.
			let _file_lock = self.lock_key(&key).await?;
			if !Self::is_expired_file(&path).await {
				continue;
			}
			match fs::remove_file(&path).await {
				Ok(()) => removed += 1,
				Err(e) => tracing::warn!("Failed to remove expired file {:?}: {}", path, e),
			}
		}
		Ok(removed)
	}

	async fn is_expired_file(path: &Path) -> bool {
		match fs::read(path).await {
			Ok(data) => FileHeader::deserialize(&data).is_ok_and(|header| header.is_expired()),
			Err(_) => false,
		}
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);
		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Err(StorageError::NotFound);
		}
		Ok(data[FileHeader::SIZE..].to_vec())
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		let _file_lock = self.lock_key(key).await?;
		self.write_file(&path, key, &value, ttl).await
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		let _file_lock = self.lock_key(key).await?;

		let current = self.get_bytes(key).await?;
		if current.as_slice() != expected {
			return Ok(false);
		}
		self.write_file(&path, key, &value, ttl).await?;
		Ok(true)
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		let _file_lock = self.lock_key(key).await?;
		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
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

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];
		for storage_key in StorageKey::all() {
			optional_fields.push(Field::new(
				format!("ttl_{}", storage_key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}
		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `ttl_orders`: TTL in seconds for orders (default: 0, never expires)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
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
