//! Common types module for the shop order service.
//!
//! This module defines the core data types shared by every crate in the
//! workspace: orders, identities and authorization outcomes, API bodies,
//! events and configuration validation.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Identity, role, capability and authorization decision types.
pub mod auth;
/// Event types published after state changes.
pub mod events;
/// Order and order status types.
pub mod order;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Redacting wrapper for session tokens.
pub mod secret;
/// Storage namespaces.
pub mod storage;
/// Configuration validation types for implementation-specific tables.
pub mod validation;

pub use api::*;
pub use auth::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret::SessionToken;
pub use storage::*;
pub use validation::*;
