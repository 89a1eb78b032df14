//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each collaborator crate (storage, auth) exposes a `Registry` struct per
/// implementation that declares the name used under
/// `[<section>.implementations.<name>]` and hands out its factory.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "memory" for `storage.implementations.memory` or "local" for
	/// `auth.implementations.local`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
