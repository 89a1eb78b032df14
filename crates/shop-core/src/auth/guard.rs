//! Capability checks against the role store.

use shop_auth::RoleService;
use shop_config::CapabilityPolicy;
use shop_types::{AuthDecision, Capability, DenyReason, Session};
use std::sync::Arc;

/// Decides whether a session may exercise a capability.
///
/// The role is always read from the role store. The role claim carried by the
/// identity is never trusted, and a failed lookup denies.
pub struct AuthorizationGuard {
	roles: Arc<RoleService>,
	policy: CapabilityPolicy,
}

impl AuthorizationGuard {
	pub fn new(roles: Arc<RoleService>, policy: CapabilityPolicy) -> Self {
		Self { roles, policy }
	}

	pub async fn authorize(&self, session: &Session, capability: Capability) -> AuthDecision {
		let Some(identity) = session.identity() else {
			tracing::debug!(capability = %capability, "Denied: no session");
			return AuthDecision::Deny(DenyReason::Unauthenticated);
		};

		let role = match self.roles.get_role(&identity.id).await {
			Ok(role) => role,
			Err(e) => {
				tracing::warn!(
					identity = %identity.id,
					capability = %capability,
					error = %e,
					"Role lookup failed"
				);
				return AuthDecision::Deny(DenyReason::RoleLookupFailed);
			},
		};

		if self.policy.grants(role, capability) {
			AuthDecision::Allow
		} else {
			tracing::debug!(
				identity = %identity.id,
				role = %role,
				capability = %capability,
				"Denied: role lacks capability"
			);
			AuthDecision::Deny(DenyReason::Forbidden)
		}
	}
}
