//! Event types for inter-service communication.
//!
//! This module defines the events the core publishes to its event bus as
//! order state changes. Events are categorized by the service that produces
//! them; concrete delivery to clients (websocket, SSE, polling) is an adapter
//! outside the core.

use crate::{ComplaintPriority, Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all marketplace events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
	/// Events from the order lifecycle.
	Order(OrderEvent),
	/// Events from the claim coordinator and handoff verifier.
	Dispatch(DispatchEvent),
	/// Events from the settlement and complaint services.
	Settlement(SettlementEvent),
}

/// Events related to order lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order entered the system in pending status.
	Created { order: Order },
	/// An order moved between lifecycle states.
	StatusChanged {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// An order was cancelled before delivery.
	Cancelled { order_id: String, reason: String },
}

/// Events related to courier assignment and handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DispatchEvent {
	/// A courier won the claim race for an order.
	Claimed {
		order_id: String,
		courier_id: String,
	},
	/// The assigned courier completed the security-code handoff.
	Delivered {
		order_id: String,
		courier_id: String,
	},
}

/// Events related to settlement operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettlementEvent {
	/// A complaint was filed against a delivered order.
	ComplaintFiled {
		complaint_id: String,
		order_id: String,
		priority: ComplaintPriority,
	},
	/// An admin resolved a complaint.
	ComplaintResolved {
		complaint_id: String,
		approved: bool,
	},
	/// A refund was issued for an order.
	RefundIssued {
		order_id: String,
		amount: f64,
		reference: String,
	},
	/// A payout transfer was recorded for a restaurant.
	TransferRecorded {
		transfer_id: String,
		restaurant_id: String,
		amount: f64,
	},
}
