//! Order request handling.
//!
//! Composes session resolution, the capability check and the state machine
//! into the two order operations exposed over HTTP. Every failure comes back
//! as an [`OrderRequestError`]; collaborator detail is logged here and kept
//! out of the error's public message.

use crate::auth::{AuthorizationGuard, SessionResolver};
use crate::engine::event_bus::EventBus;
use crate::state::{OrderStateError, OrderStateMachine};
use crate::utils::truncate_id;
use shop_types::{
	AuthDecision, Capability, DenyReason, Identity, Order, OrderEvent, OrderStatus, SessionToken,
	ShopEvent,
};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Terminal outcomes of an order request other than success.
#[derive(Debug, Error)]
pub enum OrderRequestError {
	#[error("Authentication required")]
	Unauthenticated,
	#[error("Access denied: {0}")]
	Forbidden(DenyReason),
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Invalid status: {0}")]
	InvalidStatus(String),
	#[error("Cannot move order from {from} to {to}")]
	IllegalTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order {0} was modified concurrently")]
	Conflict(String),
	/// A collaborator failed. The detail has already been logged.
	#[error("Service temporarily unavailable")]
	UpstreamUnavailable,
}

/// Handler for order status changes and reads.
pub struct OrderHandler {
	resolver: Arc<SessionResolver>,
	guard: Arc<AuthorizationGuard>,
	state_machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
}

impl OrderHandler {
	pub fn new(
		resolver: Arc<SessionResolver>,
		guard: Arc<AuthorizationGuard>,
		state_machine: Arc<OrderStateMachine>,
		event_bus: EventBus,
	) -> Self {
		Self {
			resolver,
			guard,
			state_machine,
			event_bus,
		}
	}

	/// Changes the status of an order on behalf of the session holder.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn update_status(
		&self,
		token: Option<&SessionToken>,
		order_id: &str,
		status: Option<&str>,
	) -> Result<Order, OrderRequestError> {
		let identity = self.authorize(token, Capability::ManageOrders).await?;

		let status = status
			.ok_or_else(|| OrderRequestError::InvalidRequest("status is required".into()))?;
		let target = OrderStatus::from_str(status)
			.map_err(|e| OrderRequestError::InvalidStatus(e.0))?;

		let change = self
			.state_machine
			.transition(order_id, target)
			.await
			.map_err(|e| state_error(order_id, e))?;

		tracing::info!(
			from = %change.from,
			to = %change.order.status,
			identity = %identity.id,
			"Order status changed"
		);

		self.event_bus
			.publish(ShopEvent::Order(OrderEvent::StatusChanged {
				order_id: change.order.id.clone(),
				from: change.from,
				to: change.order.status,
				updated_at: change.order.updated_at,
				actor: identity.id,
			}))
			.ok();

		Ok(change.order)
	}

	/// Reads an order on behalf of the session holder.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn get_order(
		&self,
		token: Option<&SessionToken>,
		order_id: &str,
	) -> Result<Order, OrderRequestError> {
		self.authorize(token, Capability::ViewOrders).await?;
		self.state_machine
			.get_order(order_id)
			.await
			.map_err(|e| state_error(order_id, e))
	}

	async fn authorize(
		&self,
		token: Option<&SessionToken>,
		capability: Capability,
	) -> Result<Identity, OrderRequestError> {
		let session = self.resolver.resolve(token).await;
		match self.guard.authorize(&session, capability).await {
			AuthDecision::Allow => session
				.identity()
				.cloned()
				.ok_or(OrderRequestError::Unauthenticated),
			AuthDecision::Deny(DenyReason::Unauthenticated) => {
				Err(OrderRequestError::Unauthenticated)
			},
			AuthDecision::Deny(reason) => Err(OrderRequestError::Forbidden(reason)),
		}
	}
}

fn state_error(order_id: &str, error: OrderStateError) -> OrderRequestError {
	match error {
		OrderStateError::OrderNotFound(id) => OrderRequestError::NotFound(id),
		OrderStateError::IllegalTransition { from, to } => {
			tracing::info!(from = %from, to = %to, "Rejected illegal transition");
			OrderRequestError::IllegalTransition { from, to }
		},
		OrderStateError::Conflict(id) => {
			tracing::info!("Lost concurrent update");
			OrderRequestError::Conflict(id)
		},
		e @ (OrderStateError::OrderExists(_)
		| OrderStateError::Storage(_)
		| OrderStateError::TimeError(_)) => {
			tracing::error!(order_id = %truncate_id(order_id), error = %e, "Order storage failed");
			OrderRequestError::UpstreamUnavailable
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use mockall::mock;
	use shop_auth::implementations::local;
	use shop_auth::{AuthError, RoleInterface, RoleService, SessionService};
	use shop_config::CapabilityPolicy;
	use shop_storage::implementations::memory::MemoryStorage;
	use shop_storage::StorageService;
	use shop_types::{current_timestamp_millis, ConfigSchema, Role, StorageKey};

	mock! {
		Roles {}

		#[async_trait]
		impl RoleInterface for Roles {
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
			async fn role_of(&self, identity_id: &str) -> Result<Role, AuthError>;
		}
	}

	const AUTH: &str = r#"
[[sessions]]
token = "tok-admin"
identity = "u-admin"

[[sessions]]
token = "tok-shopper"
identity = "u-shopper"

[roles]
u-admin = "admin"
u-shopper = "customer"
"#;

	struct Fixture {
		handler: OrderHandler,
		storage: Arc<StorageService>,
		events: tokio::sync::broadcast::Receiver<ShopEvent>,
	}

	fn fixture_with_roles(roles: Box<dyn RoleInterface>) -> Fixture {
		let auth: toml::Value = toml::from_str(AUTH).unwrap();
		let sessions = SessionService::new(local::create_session_provider(&auth).unwrap());
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let event_bus = EventBus::new(16);
		let events = event_bus.subscribe();

		let handler = OrderHandler::new(
			Arc::new(SessionResolver::new(Arc::new(sessions))),
			Arc::new(AuthorizationGuard::new(
				Arc::new(RoleService::new(roles)),
				CapabilityPolicy::default(),
			)),
			Arc::new(OrderStateMachine::new(storage.clone())),
			event_bus,
		);
		Fixture {
			handler,
			storage,
			events,
		}
	}

	fn fixture() -> Fixture {
		let auth: toml::Value = toml::from_str(AUTH).unwrap();
		fixture_with_roles(local::create_role_store(&auth).unwrap())
	}

	async fn seed(storage: &StorageService, id: &str, status: OrderStatus) -> Order {
		let mut order = Order::new(id, current_timestamp_millis(), serde_json::Value::Null);
		order.status = status;
		storage
			.store(StorageKey::Orders.as_str(), id, &order)
			.await
			.unwrap();
		order
	}

	async fn status_of(storage: &StorageService, id: &str) -> OrderStatus {
		let order: Order = storage
			.retrieve(StorageKey::Orders.as_str(), id)
			.await
			.unwrap();
		order.status
	}

	fn admin() -> SessionToken {
		SessionToken::from("tok-admin")
	}

	#[tokio::test]
	async fn test_admin_pays_pending_order() {
		let mut f = fixture();
		let seeded = seed(&f.storage, "O1", OrderStatus::Pending).await;

		let order = f
			.handler
			.update_status(Some(&admin()), "O1", Some("paid"))
			.await
			.unwrap();
		assert_eq!(order.status, OrderStatus::Paid);
		assert!(order.updated_at > seeded.updated_at);
		assert_eq!(status_of(&f.storage, "O1").await, OrderStatus::Paid);

		let ShopEvent::Order(event) = f.events.recv().await.unwrap();
		assert_eq!(
			event,
			OrderEvent::StatusChanged {
				order_id: "O1".into(),
				from: OrderStatus::Pending,
				to: OrderStatus::Paid,
				updated_at: order.updated_at,
				actor: "u-admin".into(),
			}
		);
	}

	#[tokio::test]
	async fn test_unauthenticated_request_leaves_order_unchanged() {
		let f = fixture();
		seed(&f.storage, "O1", OrderStatus::Pending).await;

		for token in [None, Some(SessionToken::from("tok-unknown"))] {
			let result = f
				.handler
				.update_status(token.as_ref(), "O1", Some("paid"))
				.await;
			assert!(matches!(result, Err(OrderRequestError::Unauthenticated)));
		}
		assert_eq!(status_of(&f.storage, "O1").await, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_customer_is_forbidden_for_every_target() {
		let f = fixture();
		seed(&f.storage, "O1", OrderStatus::Pending).await;
		let shopper = SessionToken::from("tok-shopper");

		for target in OrderStatus::all() {
			let result = f
				.handler
				.update_status(Some(&shopper), "O1", Some(target.as_str()))
				.await;
			assert!(matches!(
				result,
				Err(OrderRequestError::Forbidden(DenyReason::Forbidden))
			));
		}
		assert_eq!(status_of(&f.storage, "O1").await, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_paid_to_pending_is_illegal() {
		let f = fixture();
		seed(&f.storage, "O1", OrderStatus::Paid).await;

		let result = f
			.handler
			.update_status(Some(&admin()), "O1", Some("pending"))
			.await;
		assert!(matches!(
			result,
			Err(OrderRequestError::IllegalTransition {
				from: OrderStatus::Paid,
				to: OrderStatus::Pending,
			})
		));
		assert_eq!(status_of(&f.storage, "O1").await, OrderStatus::Paid);
	}

	#[tokio::test]
	async fn test_unknown_order_is_not_found() {
		let f = fixture();
		let result = f
			.handler
			.update_status(Some(&admin()), "O-missing", Some("paid"))
			.await;
		assert!(matches!(result, Err(OrderRequestError::NotFound(id)) if id == "O-missing"));
	}

	#[tokio::test]
	async fn test_invalid_and_missing_status() {
		let f = fixture();
		seed(&f.storage, "O1", OrderStatus::Pending).await;

		assert!(matches!(
			f.handler
				.update_status(Some(&admin()), "O1", Some("shipped"))
				.await,
			Err(OrderRequestError::InvalidStatus(s)) if s == "shipped"
		));
		assert!(matches!(
			f.handler.update_status(Some(&admin()), "O1", None).await,
			Err(OrderRequestError::InvalidRequest(_))
		));
	}

	#[tokio::test]
	async fn test_auth_is_checked_before_input() {
		let f = fixture();
		assert!(matches!(
			f.handler.update_status(None, "O-missing", Some("shipped")).await,
			Err(OrderRequestError::Unauthenticated)
		));
	}

	#[tokio::test]
	async fn test_role_lookup_failure_is_forbidden() {
		let mut roles = MockRoles::new();
		roles
			.expect_role_of()
			.returning(|_| Err(AuthError::Unavailable("role store down".into())));
		let f = fixture_with_roles(Box::new(roles));
		seed(&f.storage, "O1", OrderStatus::Pending).await;

		let result = f
			.handler
			.update_status(Some(&admin()), "O1", Some("paid"))
			.await;
		assert!(matches!(
			result,
			Err(OrderRequestError::Forbidden(DenyReason::RoleLookupFailed))
		));
		assert_eq!(status_of(&f.storage, "O1").await, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_get_order_requires_view_capability() {
		let f = fixture();
		seed(&f.storage, "O1", OrderStatus::Fulfilled).await;

		let order = f.handler.get_order(Some(&admin()), "O1").await.unwrap();
		assert_eq!(order.status, OrderStatus::Fulfilled);

		let shopper = SessionToken::from("tok-shopper");
		assert!(matches!(
			f.handler.get_order(Some(&shopper), "O1").await,
			Err(OrderRequestError::Forbidden(DenyReason::Forbidden))
		));
		assert!(matches!(
			f.handler.get_order(Some(&admin()), "O-missing").await,
			Err(OrderRequestError::NotFound(_))
		));
	}
}
