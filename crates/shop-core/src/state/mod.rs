//! Order lifecycle state.
//!
//! Holds the transition table and the only code path that writes an order's
//! status.

pub mod order;

pub use order::{OrderStateError, OrderStateMachine, StatusChange};
