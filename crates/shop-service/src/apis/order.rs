//! Order endpoints.
//!
//! Extracts the session credential from the request, calls the core order
//! handler and renders its outcome. Reason codes are stable; 500 responses
//! carry no collaborator detail.

use axum::http::{header, HeaderMap};
use serde_json::json;
use shop_core::{OrderHandler, OrderRequestError};
use shop_types::{
	APIError, DenyReason, GetOrderResponse, SessionToken, UpdateOrderStatusRequest,
	UpdateOrderStatusResponse,
};

/// Cookie carrying the session token when no `Authorization` header is sent.
pub const SESSION_COOKIE: &str = "session";

/// Reads the session token from the request.
///
/// `Authorization: Bearer <token>` wins over the cookie. A present but
/// malformed `Authorization` header yields no token.
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
	if let Some(value) = headers.get(header::AUTHORIZATION) {
		let value = value.to_str().ok()?;
		let (scheme, token) = value.split_once(' ')?;
		if !scheme.eq_ignore_ascii_case("bearer") {
			return None;
		}
		let token = token.trim();
		return (!token.is_empty()).then(|| SessionToken::from(token));
	}

	headers
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|cookies| cookies.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(name, _)| *name == SESSION_COOKIE)
		.map(|(_, token)| token.trim())
		.filter(|token| !token.is_empty())
		.map(SessionToken::from)
}

/// Handles `PATCH /orders/{id}/status`.
///
/// `body` is `None` when the request body could not be parsed; the session
/// and capability are still checked first.
pub async fn update_order_status(
	handler: &OrderHandler,
	headers: &HeaderMap,
	id: &str,
	body: Option<UpdateOrderStatusRequest>,
	rejection: Option<String>,
) -> Result<UpdateOrderStatusResponse, APIError> {
	let token = session_token(headers);
	let status = body.as_ref().and_then(|b| b.status.as_deref());

	match handler.update_status(token.as_ref(), id, status).await {
		Ok(order) => Ok(UpdateOrderStatusResponse {
			success: true,
			order: (&order).into(),
		}),
		Err(OrderRequestError::InvalidRequest(message)) => Err(APIError::BadRequest {
			error_type: "INVALID_REQUEST".into(),
			message: rejection.unwrap_or(message),
		}),
		Err(e) => Err(api_error(e)),
	}
}

/// Handles `GET /orders/{id}`.
pub async fn get_order(
	handler: &OrderHandler,
	headers: &HeaderMap,
	id: &str,
) -> Result<GetOrderResponse, APIError> {
	let token = session_token(headers);
	let order = handler
		.get_order(token.as_ref(), id)
		.await
		.map_err(api_error)?;
	Ok(GetOrderResponse {
		order: (&order).into(),
	})
}

/// Maps a core request error to its HTTP representation.
pub fn api_error(error: OrderRequestError) -> APIError {
	match error {
		OrderRequestError::Unauthenticated => APIError::Unauthorized {
			error_type: "UNAUTHENTICATED".into(),
			message: "Authentication required".into(),
		},
		OrderRequestError::Forbidden(reason) => APIError::Forbidden {
			error_type: reason.code().into(),
			message: match reason {
				DenyReason::RoleLookupFailed => "Permissions could not be verified".into(),
				_ => "Insufficient permissions".into(),
			},
		},
		OrderRequestError::InvalidRequest(message) => APIError::BadRequest {
			error_type: "INVALID_REQUEST".into(),
			message,
		},
		OrderRequestError::NotFound(id) => APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".into(),
			message: format!("Order {} not found", id),
		},
		OrderRequestError::InvalidStatus(status) => APIError::BadRequest {
			error_type: "INVALID_STATUS".into(),
			message: format!("Unknown order status '{}'", status),
		},
		OrderRequestError::IllegalTransition { from, to } => APIError::Conflict {
			error_type: "ILLEGAL_TRANSITION".into(),
			message: format!("Cannot move order from {} to {}", from, to),
			details: Some(json!({ "from": from, "to": to })),
			retry_after: None,
		},
		OrderRequestError::Conflict(_) => APIError::Conflict {
			error_type: "CONFLICT".into(),
			message: "Order was modified concurrently".into(),
			details: None,
			retry_after: Some(1),
		},
		OrderRequestError::UpstreamUnavailable => APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".into(),
			message: "Internal server error".into(),
		},
	}
}
