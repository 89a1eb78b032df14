//! Order types for the shop order lifecycle.
//!
//! Orders are owned by the storage collaborator. The core only ever holds a
//! working copy for the duration of a single request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a status name is not one of the defined statuses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

/// Status of an order.
///
/// Orders start in `Pending`. `Delivered`, `Cancelled` and `Refunded` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Order placed, payment not yet captured.
	Pending,
	/// Payment captured.
	Paid,
	/// Parcel handed over to the carrier or pickup point.
	Fulfilled,
	/// Parcel received by the customer.
	Delivered,
	/// Order cancelled before fulfilment.
	Cancelled,
	/// Payment returned to the customer.
	Refunded,
}

impl OrderStatus {
	/// Returns the wire name of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Paid => "paid",
			OrderStatus::Fulfilled => "fulfilled",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
			OrderStatus::Refunded => "refunded",
		}
	}

	/// Returns true if no transition leaves this status.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
		)
	}

	/// Returns an iterator over all statuses.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Paid,
			Self::Fulfilled,
			Self::Delivered,
			Self::Cancelled,
			Self::Refunded,
		]
		.into_iter()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| UnknownStatus(s.to_string()))
	}
}

/// Returns the current unix time in milliseconds, or 0 if the clock is
/// before the epoch.
pub fn current_timestamp_millis() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

/// An order as persisted by the storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Timestamp when this order was created (unix milliseconds).
	pub created_at: u64,
	/// Timestamp of the last status change (unix milliseconds). Every applied
	/// transition moves it forward.
	pub updated_at: u64,
	/// Line items, customer reference and anything else checkout attached.
	#[serde(default)]
	pub payload: serde_json::Value,
}

impl Order {
	/// Creates a new pending order.
	pub fn new(id: impl Into<String>, created_at: u64, payload: serde_json::Value) -> Self {
		Self {
			id: id.into(),
			status: OrderStatus::Pending,
			created_at,
			updated_at: created_at,
			payload,
		}
	}
}
