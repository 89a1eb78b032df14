//! Authentication collaborators for the shop order service.
//!
//! Two narrow interfaces sit here: the auth provider that turns a session
//! token into an identity, and the role store that answers which role an
//! identity currently holds. Both are external systems; implementations in
//! this crate adapt them to the core.

use async_trait::async_trait;
use shop_types::{ConfigSchema, Identity, ImplementationRegistry, Role, SessionToken};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during auth operations.
#[derive(Debug, Error)]
pub enum AuthError {
	/// The token does not belong to any session.
	#[error("Invalid session")]
	InvalidSession,
	/// The session existed but has expired.
	#[error("Session expired")]
	SessionExpired,
	/// The provider or store could not be reached.
	#[error("Auth backend unavailable: {0}")]
	Unavailable(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Interface of the external auth provider.
#[async_trait]
pub trait SessionInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Returns the identity the token was issued to.
	async fn current_identity(&self, token: &SessionToken) -> Result<Identity, AuthError>;
}

/// Interface of the role store.
#[async_trait]
pub trait RoleInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Returns the role currently assigned to an identity.
	///
	/// An identity without an assignment has [`Role::Unassigned`]; errors are
	/// reserved for lookups that could not be completed.
	async fn role_of(&self, identity_id: &str) -> Result<Role, AuthError>;
}

/// Type alias for session provider factory functions.
pub type SessionFactory = fn(&toml::Value) -> Result<Box<dyn SessionInterface>, AuthError>;

/// Type alias for role store factory functions.
pub type RoleFactory = fn(&toml::Value) -> Result<Box<dyn RoleInterface>, AuthError>;

/// Factories exposed by one auth implementation.
///
/// An implementation may serve as session provider, role store, or both;
/// `[auth] sessions` and `[auth] roles` pick which implementation fills each
/// seat.
#[derive(Clone, Copy)]
pub struct AuthFactories {
	pub sessions: SessionFactory,
	pub roles: RoleFactory,
}

/// Registry trait for auth implementations.
pub trait AuthRegistry: ImplementationRegistry<Factory = AuthFactories> {}

/// Get all registered auth implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AuthFactories)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service wrapping the configured auth provider.
pub struct SessionService {
	implementation: Box<dyn SessionInterface>,
}

impl SessionService {
	pub fn new(implementation: Box<dyn SessionInterface>) -> Self {
		Self { implementation }
	}

	/// Resolves a token to the identity it was issued to.
	pub async fn get_current_identity(&self, token: &SessionToken) -> Result<Identity, AuthError> {
		self.implementation.current_identity(token).await
	}
}

/// Service wrapping the configured role store.
pub struct RoleService {
	implementation: Box<dyn RoleInterface>,
}

impl RoleService {
	pub fn new(implementation: Box<dyn RoleInterface>) -> Self {
		Self { implementation }
	}

	/// Looks up the role currently assigned to an identity.
	pub async fn get_role(&self, identity_id: &str) -> Result<Role, AuthError> {
		self.implementation.role_of(identity_id).await
	}
}
