//! In-process event bus.
//!
//! Handlers publish a [`ShopEvent`] after committing a change. The engine's
//! notification loop and every live event stream subscribe independently;
//! a slow subscriber only ever loses its own backlog.

use shop_types::ShopEvent;
use tokio::sync::broadcast;

/// Broadcast channel shared by every component that publishes or observes
/// shop events.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<ShopEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ShopEvent> {
		self.sender.subscribe()
	}

	/// Number of live subscribers.
	pub fn receiver_count(&self) -> usize {
		self.sender.receiver_count()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is listening, which callers may ignore.
	pub fn publish(
		&self,
		event: ShopEvent,
	) -> Result<usize, broadcast::error::SendError<ShopEvent>> {
		self.sender.send(event)
	}
}
