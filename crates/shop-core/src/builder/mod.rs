//! Builder for constructing the shop engine.
//!
//! Collaborator implementations are chosen by name from the configuration and
//! created through factory functions, so the core never names a concrete
//! backend.

use crate::auth::{AuthorizationGuard, SessionResolver};
use crate::engine::{event_bus::EventBus, ShopEngine};
use crate::handlers::OrderHandler;
use crate::state::OrderStateMachine;
use shop_auth::{AuthFactories, RoleService, SessionService};
use shop_config::Config;
use shop_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Capacity of the event bus. Slow consumers lag beyond this.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable collaborator, keyed by
/// implementation name.
pub struct ShopFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
	pub auth_factories: HashMap<String, AuthFactories>,
}

/// Builder for a [`ShopEngine`].
pub struct ShopBuilder {
	config: Config,
}

impl ShopBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Creates every collaborator named in the configuration and wires them.
	pub fn build<SF>(self, factories: ShopFactories<SF>) -> Result<ShopEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let storage = Arc::new(StorageService::new(self.create_storage(&factories)?));

		let auth = &self.config.auth;
		let sessions_factory = self.auth_factories(&factories, &auth.sessions)?.sessions;
		let sessions = sessions_factory(self.auth_config(&auth.sessions)?).map_err(|e| {
			tracing::error!(
				component = "auth",
				implementation = %auth.sessions,
				error = %e,
				"Failed to create session provider"
			);
			BuilderError::Config(format!(
				"Failed to create session provider '{}': {}",
				auth.sessions, e
			))
		})?;
		tracing::info!(component = "sessions", implementation = %auth.sessions, "Loaded");

		let roles_factory = self.auth_factories(&factories, &auth.roles)?.roles;
		let roles = roles_factory(self.auth_config(&auth.roles)?).map_err(|e| {
			tracing::error!(
				component = "auth",
				implementation = %auth.roles,
				error = %e,
				"Failed to create role store"
			);
			BuilderError::Config(format!(
				"Failed to create role store '{}': {}",
				auth.roles, e
			))
		})?;
		tracing::info!(component = "roles", implementation = %auth.roles, "Loaded");

		let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));
		let order_handler = Arc::new(OrderHandler::new(
			Arc::new(SessionResolver::new(Arc::new(SessionService::new(sessions)))),
			Arc::new(AuthorizationGuard::new(
				Arc::new(RoleService::new(roles)),
				self.config.authorization.capabilities.clone(),
			)),
			state_machine.clone(),
			event_bus.clone(),
		));

		Ok(ShopEngine::new(
			self.config,
			storage,
			state_machine,
			order_handler,
			event_bus,
		))
	}

	fn create_storage<SF>(
		&self,
		factories: &ShopFactories<SF>,
	) -> Result<Box<dyn StorageInterface>, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;
		let config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!("Primary storage '{}' is not configured", primary))
			})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(implementation) => {
				tracing::info!(component = "storage", implementation = %primary, "Loaded");
				Ok(implementation)
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary,
					error = %e,
					"Failed to create storage implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary, e
				)))
			},
		}
	}

	fn auth_factories<SF>(
		&self,
		factories: &ShopFactories<SF>,
		name: &str,
	) -> Result<AuthFactories, BuilderError> {
		factories
			.auth_factories
			.get(name)
			.copied()
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("auth implementation '{}'", name))
			})
	}

	fn auth_config(&self, name: &str) -> Result<&toml::Value, BuilderError> {
		self.config
			.auth
			.implementations
			.get(name)
			.ok_or_else(|| {
				BuilderError::Config(format!("Auth implementation '{}' is not configured", name))
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use shop_config::ConfigBuilder;
	use shop_storage::StorageFactory;
	use shop_types::{Order, OrderStatus, SessionToken};

	fn factories() -> ShopFactories<StorageFactory> {
		ShopFactories {
			storage_factories: shop_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			auth_factories: shop_auth::get_all_implementations()
				.into_iter()
				.map(|(name, factories)| (name.to_string(), factories))
				.collect(),
		}
	}

	fn local_auth() -> toml::Value {
		toml::from_str(
			r#"
[[sessions]]
token = "tok-admin"
identity = "u-admin"

[roles]
u-admin = "admin"
"#,
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_build_wires_handler_to_storage() {
		let config = ConfigBuilder::new().local_auth(local_auth()).build();
		let engine = ShopBuilder::new(config).build(factories()).unwrap();

		let order = Order::new("O1", 1, serde_json::Value::Null);
		engine.state_machine().store_order(&order).await.unwrap();

		let updated = engine
			.order_handler()
			.update_status(Some(&SessionToken::from("tok-admin")), "O1", Some("paid"))
			.await
			.unwrap();
		assert_eq!(updated.status, OrderStatus::Paid);
		assert_eq!(
			engine.state_machine().get_order("O1").await.unwrap().status,
			OrderStatus::Paid
		);
	}

	#[test]
	fn test_unknown_storage_implementation() {
		let config = ConfigBuilder::new()
			.storage("redis", toml::Value::Table(toml::Table::new()))
			.build();
		assert!(matches!(
			ShopBuilder::new(config).build(factories()),
			Err(BuilderError::MissingComponent(_))
		));
	}

	#[test]
	fn test_invalid_auth_config_is_rejected() {
		let bad: toml::Value = toml::from_str("[roles]\nu1 = \"superuser\"").unwrap();
		let config = ConfigBuilder::new().local_auth(bad).build();
		assert!(matches!(
			ShopBuilder::new(config).build(factories()),
			Err(BuilderError::Config(_))
		));
	}

	#[tokio::test]
	async fn test_run_rejects_zero_cleanup_interval() {
		let config = ConfigBuilder::new()
			.storage_cleanup_interval_seconds(0)
			.build();
		let engine = ShopBuilder::new(config).build(factories()).unwrap();
		assert!(engine.run().await.is_err());
	}
}
