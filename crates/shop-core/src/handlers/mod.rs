//! Request handlers.
//!
//! Each handler owns one entry point of the core and the mapping from
//! collaborator failures to request errors.

pub mod order;

pub use order::{OrderHandler, OrderRequestError};
