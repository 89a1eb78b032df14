//! Configuration module for the shop order service.
//!
//! The whole service is configured by one TOML document, loaded and validated
//! once at start-up and then handed to every collaborator. Nothing else in
//! the workspace reads the environment.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

#[cfg(any(test, feature = "testing"))]
pub use builders::config::ConfigBuilder;

use regex::Regex;
use serde::Deserialize;
use shop_types::{Capability, Role};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Only the message; the default Display dumps the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the shop order service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Configuration specific to this service instance.
	pub shop: ShopConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the auth provider and role store.
	pub auth: AuthConfig,
	/// Capability-to-role policy.
	#[serde(default)]
	pub authorization: AuthorizationConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval_seconds() -> u64 {
	3600
}

/// Configuration for the auth collaborators.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
	/// Implementation that resolves session tokens.
	pub sessions: String,
	/// Implementation that answers role lookups.
	pub roles: String,
	/// Map of auth implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Which roles satisfy each capability.
///
/// Deserialized from `[authorization.capabilities]`. Capabilities that are
/// not listed keep their default grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "HashMap<String, Vec<String>>")]
pub struct CapabilityPolicy(HashMap<Capability, HashSet<Role>>);

impl CapabilityPolicy {
	/// Returns true if `role` satisfies `capability`.
	pub fn grants(&self, role: Role, capability: Capability) -> bool {
		self.0
			.get(&capability)
			.is_some_and(|roles| roles.contains(&role))
	}
}

impl Default for CapabilityPolicy {
	fn default() -> Self {
		let staff: HashSet<Role> = HashSet::from([Role::Admin, Role::Editor]);
		Self(HashMap::from([
			(Capability::ManageOrders, staff.clone()),
			(Capability::ViewOrders, staff),
		]))
	}
}

impl TryFrom<HashMap<String, Vec<String>>> for CapabilityPolicy {
	type Error = String;

	fn try_from(raw: HashMap<String, Vec<String>>) -> Result<Self, Self::Error> {
		let mut policy = CapabilityPolicy::default();
		for (name, role_names) in raw {
			let capability = Capability::from_str(&name)
				.map_err(|_| format!("unknown capability '{}'", name))?;
			let mut roles = HashSet::new();
			for role_name in role_names {
				let role = Role::from_str(&role_name).map_err(|_| {
					format!("unknown role '{}' for capability '{}'", role_name, name)
				})?;
				if role == Role::Unassigned {
					return Err(format!(
						"capability '{}' cannot be granted to role 'none'",
						name
					));
				}
				roles.insert(role);
			}
			if roles.is_empty() {
				return Err(format!("capability '{}' must grant at least one role", name));
			}
			policy.0.insert(capability, roles);
		}
		Ok(policy)
	}
}

/// Authorization policy section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationConfig {
	#[serde(default)]
	pub capabilities: CapabilityPolicy,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration. Permissive when absent.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.shop.id.trim().is_empty() {
			return Err(ConfigError::Validation("Shop ID cannot be empty".into()));
		}

		// Storage
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		// Auth
		for (seat, name) in [("sessions", &self.auth.sessions), ("roles", &self.auth.roles)] {
			if !self.auth.implementations.contains_key(name) {
				return Err(ConfigError::Validation(format!(
					"Auth {} implementation '{}' not found in auth.implementations",
					seat, name
				)));
			}
		}

		// API
		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"API timeout_seconds must be greater than 0".into(),
				));
			}
			if api.max_request_size == 0 {
				return Err(ConfigError::Validation(
					"API max_request_size must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
