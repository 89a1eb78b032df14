//! Broadcast channel for shop events.

use shop_types::ShopEvent;
use tokio::sync::broadcast;

/// Fan-out channel from the request path to background consumers.
///
/// Publishing never waits. Slow subscribers lag and lose the oldest events.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<ShopEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ShopEvent> {
		self.sender.subscribe()
	}

	/// Sends an event to every current subscriber.
	///
	/// Fails only when nobody is subscribed.
	pub fn publish(&self, event: ShopEvent) -> Result<(), broadcast::error::SendError<ShopEvent>> {
		self.sender.send(event).map(|_| ())
	}
}
