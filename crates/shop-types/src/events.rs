//! Event types published by the core after state changes.
//!
//! Consumers (notification mailers, audit sinks) subscribe to the event bus
//! and react to changes without being on the request path.

use crate::OrderStatus;
use serde::{Deserialize, Serialize};

/// Main event type encompassing all shop events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShopEvent {
	/// Events from the order lifecycle.
	Order(OrderEvent),
}

/// Events related to the order lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderEvent {
	/// A status transition was applied.
	StatusChanged {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
		updated_at: u64,
		/// Identity that requested the change.
		actor: String,
	},
}
