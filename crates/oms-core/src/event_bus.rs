//! Event bus for broadcasting marketplace events.
//!
//! Built on a tokio broadcast channel: every subscriber sees every event
//! published after it subscribed, and slow subscribers lag rather than
//! block publishers. Publishing with no subscribers is not an error.

use oms_types::MarketEvent;
use tokio::sync::broadcast;

/// Broadcast bus carrying [`MarketEvent`]s between the core and adapters.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<MarketEvent>,
}

impl EventBus {
	/// Creates an event bus with the given channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	pub fn publish(
		&self,
		event: MarketEvent,
	) -> Result<(), broadcast::error::SendError<MarketEvent>> {
		self.sender.send(event)?;
		Ok(())
	}

	/// Creates a new subscription to the event stream.
	pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use oms_types::{OrderEvent, OrderStatus};

	#[tokio::test]
	async fn subscribers_receive_published_events() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		bus.publish(MarketEvent::Order(OrderEvent::StatusChanged {
			order_id: "ord-1".into(),
			from: OrderStatus::Pending,
			to: OrderStatus::Preparing,
		}))
		.unwrap();
		match rx.recv().await.unwrap() {
			MarketEvent::Order(OrderEvent::StatusChanged { order_id, .. }) => {
				assert_eq!(order_id, "ord-1");
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn publish_without_subscribers_is_an_error_callers_ignore() {
		let bus = EventBus::new(16);
		let result = bus.publish(MarketEvent::Order(OrderEvent::Cancelled {
			order_id: "ord-1".into(),
			reason: "test".into(),
		}));
		assert!(result.is_err());
	}
}
