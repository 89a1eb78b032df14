//! HTTP server for the shop order API.

use axum::{
	body::Body,
	extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
	http::{HeaderMap, HeaderValue, Request},
	response::Json,
	routing::{get, patch},
	Router,
};
use serde_json::{json, Value};
use shop_config::ApiConfig;
use shop_core::ShopEngine;
use shop_types::{APIError, GetOrderResponse, UpdateOrderStatusRequest, UpdateOrderStatusResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};
use uuid::Uuid;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<ShopEngine>,
}

/// Builds the API router with its middleware stack.
pub fn router(api_config: &ApiConfig, engine: Arc<ShopEngine>) -> Router {
	let cors = match &api_config.cors {
		Some(cors) => {
			let origins: Vec<HeaderValue> = cors
				.allowed_origins
				.iter()
				.filter_map(|origin| match HeaderValue::from_str(origin) {
					Ok(value) => Some(value),
					Err(_) => {
						tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
						None
					},
				})
				.collect();
			CorsLayer::new()
				.allow_origin(AllowOrigin::list(origins))
				.allow_methods(tower_http::cors::Any)
				.allow_headers(tower_http::cors::Any)
		},
		None => CorsLayer::permissive(),
	};

	Router::new()
		.route("/health", get(handle_health))
		.route("/orders/{id}", get(handle_get_order))
		.route("/orders/{id}/status", patch(handle_update_status))
		.layer(
			ServiceBuilder::new()
				.layer(
					TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
						tracing::info_span!(
							"request",
							request_id = %Uuid::new_v4(),
							method = %request.method(),
							uri = %request.uri(),
						)
					}),
				)
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors)
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<ShopEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Shop API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn handle_health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

/// Handles PATCH /orders/{id}/status requests.
async fn handle_update_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<UpdateOrderStatusRequest>, JsonRejection>,
) -> Result<Json<UpdateOrderStatusResponse>, APIError> {
	let (body, rejection) = match payload {
		Ok(Json(body)) => (Some(body), None),
		Err(rejection) => (None, Some(rejection.body_text())),
	};
	crate::apis::order::update_order_status(
		state.engine.order_handler(),
		&headers,
		&id,
		body,
		rejection,
	)
	.await
	.map(Json)
}

/// Handles GET /orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<GetOrderResponse>, APIError> {
	crate::apis::order::get_order(state.engine.order_handler(), &headers, &id)
		.await
		.map(Json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory_registry::{build_shop_with_registry, FactoryRegistry};
	use axum::http::{header, Method, StatusCode};
	use http_body_util::BodyExt;
	use shop_auth::implementations::local::{self, LocalAuthSchema};
	use shop_auth::{AuthError, AuthFactories, RoleInterface};
	use shop_config::ConfigBuilder;
	use shop_storage::StorageService;
	use shop_types::{
		current_timestamp_millis, ConfigSchema, Order, OrderEvent, OrderStatus, Role, ShopEvent,
		StorageKey,
	};
	use tower::ServiceExt;

	const LOCAL_AUTH: &str = r#"
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

	fn api_config() -> ApiConfig {
		toml::from_str("enabled = true").unwrap()
	}

	fn engine() -> Arc<ShopEngine> {
		let config = ConfigBuilder::new()
			.local_auth(toml::from_str(LOCAL_AUTH).unwrap())
			.api(Some(api_config()))
			.build();
		Arc::new(crate::factory_registry::build_shop_from_config(config).unwrap())
	}

	async fn seed(storage: &StorageService, id: &str, status: OrderStatus) -> Order {
		let mut order = Order::new(id, current_timestamp_millis(), Value::Null);
		order.status = status;
		storage
			.store(StorageKey::Orders.as_str(), id, &order)
			.await
			.unwrap();
		order
	}

	async fn send(
		engine: &Arc<ShopEngine>,
		method: Method,
		uri: &str,
		token: Option<&str>,
		body: Option<&str>,
	) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		if let Some(token) = token {
			request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
		}
		let request = match body {
			Some(body) => request
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(body.to_string())),
			None => request.body(Body::empty()),
		}
		.unwrap();

		let response = router(&api_config(), engine.clone())
			.oneshot(request)
			.await
			.unwrap();
		let status = response.status();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
		(status, json)
	}

	async fn patch_status(
		engine: &Arc<ShopEngine>,
		id: &str,
		token: Option<&str>,
		status: &str,
	) -> (StatusCode, Value) {
		let body = json!({ "status": status }).to_string();
		send(
			engine,
			Method::PATCH,
			&format!("/orders/{}/status", id),
			token,
			Some(&body),
		)
		.await
	}

	async fn stored_status(engine: &Arc<ShopEngine>, id: &str) -> OrderStatus {
		engine.state_machine().get_order(id).await.unwrap().status
	}

	#[tokio::test]
	async fn test_admin_marks_pending_order_paid() {
		let engine = engine();
		let seeded = seed(engine.storage(), "O1", OrderStatus::Pending).await;

		let (status, body) = patch_status(&engine, "O1", Some("tok-admin"), "paid").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "success": true, "order": { "id": "O1", "status": "paid" } }));

		let order = engine.state_machine().get_order("O1").await.unwrap();
		assert_eq!(order.status, OrderStatus::Paid);
		assert!(order.updated_at > seeded.updated_at);
	}

	#[tokio::test]
	async fn test_applied_transition_reaches_event_subscribers() {
		let engine = engine();
		seed(engine.storage(), "O1", OrderStatus::Pending).await;
		let mut events = engine.event_bus().subscribe();

		let (status, _) = patch_status(&engine, "O1", Some("tok-admin"), "paid").await;
		assert_eq!(status, StatusCode::OK);

		let ShopEvent::Order(OrderEvent::StatusChanged {
			order_id, from, to, actor, ..
		}) = events.recv().await.unwrap();
		assert_eq!(order_id, "O1");
		assert_eq!((from, to), (OrderStatus::Pending, OrderStatus::Paid));
		assert_eq!(actor, "u-admin");
	}

	#[tokio::test]
	async fn test_unauthenticated_returns_401() {
		let engine = engine();
		seed(engine.storage(), "O1", OrderStatus::Pending).await;

		let (status, body) = patch_status(&engine, "O1", None, "paid").await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["error"], "UNAUTHENTICATED");
		assert_eq!(stored_status(&engine, "O1").await, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_session_cookie_is_accepted() {
		let engine = engine();
		seed(engine.storage(), "O1", OrderStatus::Pending).await;

		let request = Request::builder()
			.method(Method::PATCH)
			.uri("/orders/O1/status")
			.header(header::COOKIE, "session=tok-admin")
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(r#"{"status":"cancelled"}"#))
			.unwrap();
		let response = router(&api_config(), engine.clone())
			.oneshot(request)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(stored_status(&engine, "O1").await, OrderStatus::Cancelled);
	}

	#[tokio::test]
	async fn test_customer_returns_403() {
		let engine = engine();
		seed(engine.storage(), "O1", OrderStatus::Pending).await;

		let (status, body) = patch_status(&engine, "O1", Some("tok-shopper"), "paid").await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"], "FORBIDDEN");
		assert_eq!(stored_status(&engine, "O1").await, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_paid_to_pending_returns_409() {
		let engine = engine();
		seed(engine.storage(), "O1", OrderStatus::Paid).await;

		let (status, body) = patch_status(&engine, "O1", Some("tok-admin"), "pending").await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "ILLEGAL_TRANSITION");
		assert_eq!(body["details"], json!({ "from": "paid", "to": "pending" }));
		assert_eq!(stored_status(&engine, "O1").await, OrderStatus::Paid);
	}

	#[tokio::test]
	async fn test_unknown_order_returns_404() {
		let engine = engine();
		let (status, body) = patch_status(&engine, "O-missing", Some("tok-admin"), "paid").await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "ORDER_NOT_FOUND");
	}

	#[tokio::test]
	async fn test_bad_input_returns_400() {
		let engine = engine();
		seed(engine.storage(), "O1", OrderStatus::Pending).await;

		let (status, body) = patch_status(&engine, "O1", Some("tok-admin"), "shipped").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_STATUS");

		for payload in ["{}", "not json"] {
			let (status, body) = send(
				&engine,
				Method::PATCH,
				"/orders/O1/status",
				Some("tok-admin"),
				Some(payload),
			)
			.await;
			assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
			assert_eq!(body["error"], "INVALID_REQUEST");
		}
		assert_eq!(stored_status(&engine, "O1").await, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_role_lookup_failure_returns_403() {
		struct UnreachableRoles;

		#[async_trait::async_trait]
		impl RoleInterface for UnreachableRoles {
			fn config_schema(&self) -> Box<dyn ConfigSchema> {
				Box::new(LocalAuthSchema)
			}

			async fn role_of(&self, _identity_id: &str) -> Result<Role, AuthError> {
				Err(AuthError::Unavailable("connection refused".into()))
			}
		}

		fn unreachable_roles(_: &toml::Value) -> Result<Box<dyn RoleInterface>, AuthError> {
			Ok(Box::new(UnreachableRoles))
		}

		let mut registry = FactoryRegistry::new();
		for (name, factory) in shop_storage::get_all_implementations() {
			registry.register_storage(name, factory);
		}
		registry.register_auth(
			"local",
			AuthFactories {
				sessions: local::create_session_provider,
				roles: unreachable_roles,
			},
		);
		let config = ConfigBuilder::new()
			.local_auth(toml::from_str(LOCAL_AUTH).unwrap())
			.build();
		let engine = Arc::new(build_shop_with_registry(&registry, config).unwrap());
		seed(engine.storage(), "O1", OrderStatus::Pending).await;

		let (status, body) = patch_status(&engine, "O1", Some("tok-admin"), "paid").await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"], "ROLE_LOOKUP_FAILED");
		assert_eq!(stored_status(&engine, "O1").await, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_get_order() {
		let engine = engine();
		seed(engine.storage(), "O1", OrderStatus::Fulfilled).await;

		let (status, body) = send(&engine, Method::GET, "/orders/O1", Some("tok-admin"), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["order"]["status"], "fulfilled");
		assert_eq!(body["order"]["createdAt"], 1);

		let (status, _) = send(&engine, Method::GET, "/orders/O1", None, None).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn test_health() {
		let engine = engine();
		let (status, body) = send(&engine, Method::GET, "/health", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "status": "ok" }));
	}
}
