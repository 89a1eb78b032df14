//! Local auth implementation backed by configuration.
//!
//! Sessions and role assignments are listed in the config file. Intended for
//! development, staging and tests; production deployments point `[auth]` at
//! an implementation that calls the hosted auth provider.
//!
//! ```toml
//! [auth.implementations.local]
//! [[auth.implementations.local.sessions]]
//! token = "${ADMIN_SESSION_TOKEN}"
//! identity = "u-admin"
//! expires_at = 0          # optional, unix seconds, 0 = never
//!
//! [auth.implementations.local.roles]
//! u-admin = "admin"
//! ```

use crate::{AuthError, AuthFactories, AuthRegistry, RoleInterface, SessionInterface};
use async_trait::async_trait;
use serde::Deserialize;
use shop_types::{
	ConfigSchema, Field, FieldType, Identity, ImplementationRegistry, Role, Schema,
	SessionToken, ValidationError,
};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

const ROLE_NAMES: &[&str] = &["customer", "editor", "admin", "none"];

#[derive(Debug, Deserialize)]
struct SessionEntry {
	token: SessionToken,
	identity: String,
	#[serde(default)]
	expires_at: u64,
}

#[derive(Debug, Default, Deserialize)]
struct LocalAuthConfig {
	#[serde(default)]
	sessions: Vec<SessionEntry>,
	#[serde(default)]
	roles: HashMap<String, Role>,
}

/// Config-backed session provider and role store.
pub struct LocalAuth {
	sessions: Vec<SessionEntry>,
	roles: HashMap<String, Role>,
}

impl LocalAuth {
	fn from_config(config: &toml::Value) -> Result<Self, AuthError> {
		LocalAuthSchema
			.validate(config)
			.map_err(|e| AuthError::Configuration(e.to_string()))?;
		let parsed: LocalAuthConfig = config
			.clone()
			.try_into()
			.map_err(|e| AuthError::Configuration(e.to_string()))?;
		tracing::debug!(
			sessions = parsed.sessions.len(),
			assignments = parsed.roles.len(),
			"Loaded local auth tables"
		);
		Ok(Self {
			sessions: parsed.sessions,
			roles: parsed.roles,
		})
	}

	fn role_for(&self, identity_id: &str) -> Role {
		self.roles
			.get(identity_id)
			.copied()
			.unwrap_or(Role::Unassigned)
	}
}

#[async_trait]
impl SessionInterface for LocalAuth {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalAuthSchema)
	}

	async fn current_identity(&self, token: &SessionToken) -> Result<Identity, AuthError> {
		let entry = self
			.sessions
			.iter()
			.find(|entry| &entry.token == token)
			.ok_or(AuthError::InvalidSession)?;

		if entry.expires_at != 0 {
			let now = SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map_err(|e| AuthError::Unavailable(e.to_string()))?
				.as_secs();
			if now >= entry.expires_at {
				tracing::debug!(identity = %entry.identity, "Session token expired");
				return Err(AuthError::SessionExpired);
			}
		}

		Ok(Identity {
			id: entry.identity.clone(),
			role: self.role_for(&entry.identity),
		})
	}
}

#[async_trait]
impl RoleInterface for LocalAuth {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalAuthSchema)
	}

	async fn role_of(&self, identity_id: &str) -> Result<Role, AuthError> {
		Ok(self.role_for(identity_id))
	}
}

/// Configuration schema for LocalAuth.
pub struct LocalAuthSchema;

impl ConfigSchema for LocalAuthSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let session = Schema::new(
			vec![
				Field::new("token", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(s) if !s.trim().is_empty() => Ok(()),
						_ => Err("session token cannot be empty".into()),
					}
				}),
				Field::new("identity", FieldType::String),
			],
			vec![Field::new(
				"expires_at",
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)],
		);
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("sessions", FieldType::Array(Box::new(FieldType::Table(session)))),
				Field::new(
					"roles",
					FieldType::Map(Box::new(FieldType::OneOf(ROLE_NAMES))),
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create the local session provider.
pub fn create_session_provider(
	config: &toml::Value,
) -> Result<Box<dyn SessionInterface>, AuthError> {
	Ok(Box::new(LocalAuth::from_config(config)?))
}

/// Factory function to create the local role store.
pub fn create_role_store(config: &toml::Value) -> Result<Box<dyn RoleInterface>, AuthError> {
	Ok(Box::new(LocalAuth::from_config(config)?))
}

/// Registry for the local auth implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AuthFactories;

	fn factory() -> Self::Factory {
		AuthFactories {
			sessions: create_session_provider,
			roles: create_role_store,
		}
	}
}

impl AuthRegistry for Registry {}
