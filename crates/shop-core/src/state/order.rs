//! Order state machine implementation.
//!
//! Orders move `pending -> paid -> fulfilled -> delivered`, with side branches
//! `pending|paid -> cancelled` and `paid -> refunded`. A transition is applied
//! with a single conditional write, so two writers racing on the same order
//! can never both succeed from the same starting status.

use once_cell::sync::Lazy;
use shop_storage::{ConditionalUpdate, StorageError, StorageService};
use shop_types::{Order, OrderStatus, StorageKey};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Order already exists: {0}")]
	OrderExists(String),
	#[error("Illegal state transition from {from} to {to}")]
	IllegalTransition { from: OrderStatus, to: OrderStatus },
	/// Another writer changed the order between read and write.
	#[error("Concurrent update on order {0}")]
	Conflict(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Time error: {0}")]
	TimeError(String),
}

/// A transition that was written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
	/// Status the order had before the write.
	pub from: OrderStatus,
	/// The order as persisted.
	pub order: Order,
}

// Each status maps to the statuses it may move to. Terminal statuses map to
// an empty set.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	use OrderStatus::*;
	HashMap::from([
		(Pending, HashSet::from([Paid, Cancelled])),
		(Paid, HashSet::from([Fulfilled, Cancelled, Refunded])),
		(Fulfilled, HashSet::from([Delivered])),
		(Delivered, HashSet::new()),
		(Cancelled, HashSet::new()),
		(Refunded, HashSet::new()),
	])
});

/// Manages order state transitions and persistence.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Checks if `(from, to)` is an edge of the transition table.
	///
	/// A status never transitions to itself.
	pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
		TRANSITIONS
			.get(&from)
			.is_some_and(|next| next.contains(&to))
	}

	/// Moves an order to `target` if the table allows it from the stored status.
	///
	/// The stored order is left untouched on every error path.
	pub async fn transition(
		&self,
		order_id: &str,
		target: OrderStatus,
	) -> Result<StatusChange, OrderStateError> {
		let now = now_millis()?;

		let outcome = self
			.storage
			.update_if(StorageKey::Orders.as_str(), order_id, |order: &Order| {
				if !Self::is_valid_transition(order.status, target) {
					return None;
				}
				let mut next = order.clone();
				next.status = target;
				// Strictly after the previous write, even within one millisecond.
				next.updated_at = now.max(order.updated_at.saturating_add(1));
				Some(next)
			})
			.await
			.map_err(|e| storage_error(order_id, e))?;

		match outcome {
			ConditionalUpdate::Applied { previous, current } => Ok(StatusChange {
				from: previous.status,
				order: current,
			}),
			ConditionalUpdate::Rejected(order) => Err(OrderStateError::IllegalTransition {
				from: order.status,
				to: target,
			}),
			ConditionalUpdate::Conflict => Err(OrderStateError::Conflict(order_id.to_string())),
		}
	}

	/// Gets an order by ID.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderStateError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| storage_error(order_id, e))
	}

	/// Stores a new order in its initial status.
	///
	/// Whatever status the caller set is replaced by `pending`.
	pub async fn store_order(&self, order: &Order) -> Result<Order, OrderStateError> {
		let exists = self
			.storage
			.exists(StorageKey::Orders.as_str(), &order.id)
			.await
			.map_err(|e| storage_error(&order.id, e))?;
		if exists {
			return Err(OrderStateError::OrderExists(order.id.clone()));
		}

		let mut order = order.clone();
		order.status = OrderStatus::Pending;
		order.updated_at = order.created_at;

		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, &order)
			.await
			.map_err(|e| storage_error(&order.id, e))?;
		Ok(order)
	}
}

fn storage_error(order_id: &str, error: StorageError) -> OrderStateError {
	match error {
		StorageError::NotFound => OrderStateError::OrderNotFound(order_id.to_string()),
		other => OrderStateError::Storage(other.to_string()),
	}
}

fn now_millis() -> Result<u64, OrderStateError> {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.map_err(|e| OrderStateError::TimeError(e.to_string()))
}
