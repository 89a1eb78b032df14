//! Core of the shop order service.
//!
//! Resolves sessions, checks capabilities against the role store and moves
//! orders through their lifecycle. Collaborators (auth provider, role store,
//! order storage) are passed in as trait objects; nothing here reads global
//! state.

pub mod auth;
pub mod builder;
pub mod engine;
pub mod handlers;
pub mod state;
pub mod utils;

pub use builder::{BuilderError, ShopBuilder, ShopFactories};
pub use engine::{event_bus::EventBus, EngineError, ShopEngine};
pub use handlers::{OrderHandler, OrderRequestError};
