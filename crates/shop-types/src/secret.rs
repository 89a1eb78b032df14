//! Session token wrapper.
//!
//! Tokens are bearer credentials: whoever holds one is the identity behind
//! it. `SessionToken` zeroes its buffer on drop and never prints its value.

use serde::{Deserialize, Deserializer};
use std::fmt;
use zeroize::Zeroizing;

/// An opaque session token extracted from a request.
#[derive(Clone)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
	pub fn new(token: String) -> Self {
		Self(Zeroizing::new(token))
	}

	/// Exposes the raw token.
	///
	/// Only auth implementations should call this, to compare against their
	/// own records. Never log the result.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl fmt::Debug for SessionToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SessionToken(***REDACTED***)")
	}
}

impl fmt::Display for SessionToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "***REDACTED***")
	}
}

impl From<&str> for SessionToken {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl From<String> for SessionToken {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl PartialEq for SessionToken {
	fn eq(&self, other: &Self) -> bool {
		self.0.as_str() == other.0.as_str()
	}
}

impl Eq for SessionToken {}

// Tokens arrive from config files; they are never serialized back out.
impl<'de> Deserialize<'de> for SessionToken {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Ok(SessionToken::new(s))
	}
}
