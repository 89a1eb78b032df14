//! Factory registry for collaborator implementations.
//!
//! Every implementation crate exports its factories through
//! `get_all_implementations()`. The registry collects them once so the
//! configuration can pick implementations by name.

use shop_auth::AuthFactories;
use shop_config::Config;
use shop_core::{ShopBuilder, ShopEngine, ShopFactories};
use shop_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Registry of every known implementation factory.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub auth: HashMap<String, AuthFactories>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			auth: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_auth(&mut self, name: impl Into<String>, factories: AuthFactories) {
		self.auth.insert(name.into(), factories);
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in shop_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factories) in shop_auth::get_all_implementations() {
			tracing::debug!("Registering auth implementation: {}", name);
			registry.register_auth(name, factories);
		}

		registry
	})
}

/// Picks the registered factories for every configured implementation name.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the engine from the registry and the configuration.
pub fn build_shop_from_config(config: Config) -> Result<ShopEngine, Box<dyn std::error::Error>> {
	build_shop_with_registry(get_registry(), config)
}

/// Builds the engine from an explicit registry.
pub fn build_shop_with_registry(
	registry: &FactoryRegistry,
	config: Config,
) -> Result<ShopEngine, Box<dyn std::error::Error>> {
	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let auth_factories = build_factories!(registry, config.auth.implementations, auth, "auth");

	let factories = ShopFactories {
		storage_factories,
		auth_factories,
	};

	Ok(ShopBuilder::new(config).build(factories)?)
}
