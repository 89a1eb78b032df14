//! Session resolution.

use shop_auth::{AuthError, SessionService};
use shop_types::{Session, SessionToken};
use std::sync::Arc;

/// Turns a request credential into a [`Session`].
///
/// Never fails: a missing, empty, unknown or expired token and any provider
/// error all resolve to [`Session::NoSession`].
pub struct SessionResolver {
	sessions: Arc<SessionService>,
}

impl SessionResolver {
	pub fn new(sessions: Arc<SessionService>) -> Self {
		Self { sessions }
	}

	pub async fn resolve(&self, token: Option<&SessionToken>) -> Session {
		let Some(token) = token.filter(|t| !t.is_empty()) else {
			return Session::NoSession;
		};

		match self.sessions.get_current_identity(token).await {
			Ok(identity) => Session::Authenticated(identity),
			Err(AuthError::InvalidSession | AuthError::SessionExpired) => Session::NoSession,
			Err(e) => {
				tracing::warn!(error = %e, "Auth provider failed, treating request as unauthenticated");
				Session::NoSession
			},
		}
	}
}
