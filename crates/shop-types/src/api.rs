//! API types for the shop HTTP API.
//!
//! This module defines the request and response bodies of the order
//! endpoints and the structured error type every endpoint returns.

use crate::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `PATCH /orders/{id}/status`.
///
/// `status` is kept as a raw string so an unknown value can be reported as
/// `INVALID_STATUS` rather than a generic body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
	pub status: Option<String>,
}

/// Minimal order view returned after a status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
	pub id: String,
	pub status: OrderStatus,
}

impl From<&Order> for OrderSummary {
	fn from(order: &Order) -> Self {
		Self {
			id: order.id.clone(),
			status: order.status,
		}
	}
}

/// Response for a successful status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusResponse {
	pub success: bool,
	pub order: OrderSummary,
}

/// Order details returned by `GET /orders/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderView {
	pub id: String,
	pub status: OrderStatus,
	#[serde(rename = "createdAt")]
	pub created_at: u64,
	#[serde(rename = "updatedAt")]
	pub updated_at: u64,
}

impl From<&Order> for OrderView {
	fn from(order: &Order) -> Self {
		Self {
			id: order.id.clone(),
			status: order.status,
			created_at: order.created_at,
			updated_at: order.updated_at,
		}
	}
}

/// Response for `GET /orders/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOrderResponse {
	pub order: OrderView,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Stable machine-readable reason code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Missing or malformed input (400)
	BadRequest { error_type: String, message: String },
	/// No valid session (401)
	Unauthorized { error_type: String, message: String },
	/// Authenticated but not permitted (403)
	Forbidden { error_type: String, message: String },
	/// Unknown resource (404)
	NotFound { error_type: String, message: String },
	/// Request conflicts with the resource's current state (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthorized { .. } => 401,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Stable reason code carried in the response body.
	pub fn error_type(&self) -> &str {
		match self {
			APIError::BadRequest { error_type, .. }
			| APIError::Unauthorized { error_type, .. }
			| APIError::Forbidden { error_type, .. }
			| APIError::NotFound { error_type, .. }
			| APIError::Conflict { error_type, .. }
			| APIError::InternalServerError { error_type, .. } => error_type,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::Conflict {
				error_type,
				message,
				details,
				retry_after,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
				retry_after: *retry_after,
			},
			APIError::BadRequest { error_type, message }
			| APIError::Unauthorized { error_type, message }
			| APIError::Forbidden { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::InternalServerError { error_type, message } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		write!(f, "{} ({}): {}", self.status_code(), response.error, response.message)
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
