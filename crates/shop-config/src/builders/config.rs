//! Configuration builder for tests and local development.

use crate::{
	ApiConfig, AuthConfig, AuthorizationConfig, CapabilityPolicy, Config, ShopConfig,
	StorageConfig,
};
use std::collections::HashMap;

/// Builder for `Config` with in-memory storage and local auth by default.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	shop_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	storage_cleanup_interval_seconds: u64,
	auth_config: toml::Value,
	capabilities: CapabilityPolicy,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			shop_id: "test-shop".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::Table::new()),
			storage_cleanup_interval_seconds: 60,
			auth_config: toml::Value::Table(toml::Table::new()),
			capabilities: CapabilityPolicy::default(),
			api: None,
		}
	}

	pub fn shop_id(mut self, id: impl Into<String>) -> Self {
		self.shop_id = id.into();
		self
	}

	/// Selects the primary storage implementation and its settings.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	/// Settings for the `local` auth implementation.
	pub fn local_auth(mut self, config: toml::Value) -> Self {
		self.auth_config = config;
		self
	}

	pub fn capabilities(mut self, policy: CapabilityPolicy) -> Self {
		self.capabilities = policy;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		Config {
			shop: ShopConfig { id: self.shop_id },
			storage: StorageConfig {
				implementations: HashMap::from([(
					self.storage_primary.clone(),
					self.storage_config,
				)]),
				primary: self.storage_primary,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			auth: AuthConfig {
				sessions: "local".to_string(),
				roles: "local".to_string(),
				implementations: HashMap::from([("local".to_string(), self.auth_config)]),
			},
			authorization: AuthorizationConfig {
				capabilities: self.capabilities,
			},
			api: self.api,
		}
	}
}
