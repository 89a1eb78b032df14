//! Shop engine.
//!
//! Owns the wired collaborators and runs the background work that is not on
//! any request path: periodic storage cleanup and consumption of order events.

pub mod event_bus;

use crate::handlers::OrderHandler;
use crate::state::OrderStateMachine;
use crate::utils::truncate_id;
use shop_config::Config;
use shop_storage::StorageService;
use shop_types::{OrderEvent, ShopEvent};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Main engine holding the order handler and its collaborators.
#[derive(Clone)]
pub struct ShopEngine {
	config: Config,
	storage: Arc<StorageService>,
	state_machine: Arc<OrderStateMachine>,
	order_handler: Arc<OrderHandler>,
	event_bus: event_bus::EventBus,
}

impl ShopEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		state_machine: Arc<OrderStateMachine>,
		order_handler: Arc<OrderHandler>,
		event_bus: event_bus::EventBus,
	) -> Self {
		Self {
			config,
			storage,
			state_machine,
			order_handler,
			event_bus,
		}
	}

	/// Runs background tasks until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		let cleanup_seconds = self.config.storage.cleanup_interval_seconds;
		if cleanup_seconds == 0 {
			return Err(EngineError::Config(
				"cleanup_interval_seconds must be greater than 0".into(),
			));
		}

		let mut events = self.event_bus.subscribe();

		let storage = self.storage.clone();
		let mut cleanup_interval = tokio::time::interval(Duration::from_secs(cleanup_seconds));
		let cleanup_handle = tokio::spawn(async move {
			loop {
				cleanup_interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(0) => {},
					Ok(count) => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
				}
			}
		});

		tracing::info!(shop_id = %self.config.shop.id, "Engine started");

		loop {
			tokio::select! {
				event = events.recv() => {
					match event {
						Ok(event) => Self::handle_event(event),
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(skipped, "Event consumer lagged");
						},
						Err(RecvError::Closed) => break,
					}
				}

				_ = tokio::signal::ctrl_c() => {
					break;
				}
			}
		}

		cleanup_handle.abort();
		tracing::info!("Engine stopped");
		Ok(())
	}

	/// Emits the notification record for a status change.
	fn handle_event(event: ShopEvent) {
		match event {
			ShopEvent::Order(OrderEvent::StatusChanged {
				order_id,
				from,
				to,
				updated_at,
				actor,
			}) => {
				tracing::info!(
					target: "shop::notifications",
					order_id = %truncate_id(&order_id),
					from = %from,
					to = %to,
					updated_at,
					actor = %actor,
					"Order status notification"
				);
			},
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn state_machine(&self) -> &Arc<OrderStateMachine> {
		&self.state_machine
	}

	pub fn order_handler(&self) -> &Arc<OrderHandler> {
		&self.order_handler
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}
}
