//! Identity and authorization types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role attribute of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Customer,
	Editor,
	Admin,
	/// No role assigned. Never satisfies a capability.
	#[serde(rename = "none")]
	Unassigned,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Customer => "customer",
			Role::Editor => "editor",
			Role::Admin => "admin",
			Role::Unassigned => "none",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = UnknownName;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"customer" => Ok(Role::Customer),
			"editor" => Ok(Role::Editor),
			"admin" => Ok(Role::Admin),
			"none" => Ok(Role::Unassigned),
			other => Err(UnknownName(other.to_string())),
		}
	}
}

/// A named permission required to perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
	/// Change the status of any order.
	ManageOrders,
	/// Read any order.
	ViewOrders,
}

impl Capability {
	pub fn as_str(&self) -> &'static str {
		match self {
			Capability::ManageOrders => "manage-orders",
			Capability::ViewOrders => "view-orders",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[Self::ManageOrders, Self::ViewOrders].into_iter()
	}
}

impl FromStr for Capability {
	type Err = UnknownName;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|cap| cap.as_str() == s)
			.ok_or_else(|| UnknownName(s.to_string()))
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when parsing a role or capability name fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown name: {0}")]
pub struct UnknownName(pub String);

/// An authenticated principal.
///
/// `role` is the claim the auth provider attached at login. Authorization
/// decisions never rely on it; the guard asks the role store instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	pub id: String,
	pub role: Role,
}

/// Result of resolving a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
	Authenticated(Identity),
	NoSession,
}

impl Session {
	pub fn identity(&self) -> Option<&Identity> {
		match self {
			Session::Authenticated(identity) => Some(identity),
			Session::NoSession => None,
		}
	}
}

/// Why an authorization check denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
	Unauthenticated,
	RoleLookupFailed,
	Forbidden,
}

impl DenyReason {
	/// Stable machine-readable reason code.
	pub fn code(&self) -> &'static str {
		match self {
			DenyReason::Unauthenticated => "UNAUTHENTICATED",
			DenyReason::RoleLookupFailed => "ROLE_LOOKUP_FAILED",
			DenyReason::Forbidden => "FORBIDDEN",
		}
	}
}

impl fmt::Display for DenyReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.code())
	}
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
	Allow,
	Deny(DenyReason),
}

impl AuthDecision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, AuthDecision::Allow)
	}
}
