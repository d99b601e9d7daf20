//! Order types for the marketplace order lifecycle.
//!
//! This module defines the order row persisted in the order store together
//! with its status and payment enums and the line-item variants decoded once
//! at the intake boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A marketplace order with its full lifecycle state.
///
/// Orders are created by the intake flow in `Pending` status with a freshly
/// generated security code, then mutated by the restaurant (accept/reject),
/// the claim coordinator (courier assignment), the handoff verifier
/// (delivery) and the settlement reconciler (cancellation/refund). Orders
/// are never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Restaurant fulfilling this order.
	pub restaurant_id: String,
	/// Customer who placed this order.
	pub customer_id: String,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp when this order was last updated.
	pub updated_at: DateTime<Utc>,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Line items, decoded once at the intake boundary.
	pub items: Vec<LineItem>,
	/// Total amount charged to the customer, delivery fee included.
	pub total: f64,
	/// Delivery fee portion of the total.
	pub delivery_fee: f64,
	/// Restaurant display name, surfaced in courier alerts.
	pub restaurant_name: String,
	/// Restaurant pickup address, surfaced in courier alerts.
	pub restaurant_address: String,
	/// Preparation duration in minutes, set when the restaurant accepts.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prep_minutes: Option<u32>,
	/// Timestamp when preparation started.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prep_started_at: Option<DateTime<Utc>>,
	/// Courier assigned by the claim coordinator, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub courier_id: Option<String>,
	/// Security code shared with the customer, checked at handoff.
	/// Immutable after creation. Absent only on legacy rows.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub security_code: Option<String>,
	/// Number of failed security-code submissions at handoff.
	#[serde(default)]
	pub code_attempts: u32,
	/// Payment state mirrored from the payment collaborator.
	pub payment_status: PaymentStatus,
	/// Payment reference at the external payment collaborator.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payment_reference: Option<String>,
	/// Refund amount, set at most once when the order is refunded.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refund_amount: Option<f64>,
	/// Refund reference at the external payment collaborator.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refund_reference: Option<String>,
	/// Timestamp when the courier completed the handoff.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<DateTime<Utc>>,
	/// Timestamp when the restaurant was paid out for this order.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub restaurant_paid_at: Option<DateTime<Utc>>,
}

impl Order {
	/// Returns the item subtotal, i.e. the total minus the delivery fee.
	pub fn subtotal(&self) -> f64 {
		self.total - self.delivery_fee
	}
}

/// Status of an order in the marketplace lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
	/// Order has been placed and awaits the restaurant's decision.
	Pending,
	/// Restaurant accepted the order and is preparing it.
	Preparing,
	/// Order is ready for courier pickup.
	Ready,
	/// A courier has exclusively claimed the order.
	Claimed,
	/// Courier completed the security-code-gated handoff.
	Delivered,
	/// Restaurant rejected the order.
	Rejected,
	/// Order was cancelled before delivery.
	Cancelled,
}

impl OrderStatus {
	/// True for states no further transition may leave.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			OrderStatus::Delivered | OrderStatus::Rejected | OrderStatus::Cancelled
		)
	}

	/// True for states preceding a successful delivery.
	pub fn is_pre_delivery(&self) -> bool {
		matches!(
			self,
			OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready | OrderStatus::Claimed
		)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Pending => write!(f, "Pending"),
			OrderStatus::Preparing => write!(f, "Preparing"),
			OrderStatus::Ready => write!(f, "Ready"),
			OrderStatus::Claimed => write!(f, "Claimed"),
			OrderStatus::Delivered => write!(f, "Delivered"),
			OrderStatus::Rejected => write!(f, "Rejected"),
			OrderStatus::Cancelled => write!(f, "Cancelled"),
		}
	}
}

/// Payment state of an order as known to the marketplace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PaymentStatus {
	/// No successful charge recorded yet.
	Unpaid,
	/// Charge captured by the payment collaborator.
	Paid,
	/// Charge refunded to the customer.
	Refunded,
	/// Charge failed at the payment collaborator.
	Failed,
	/// Charge cancelled before capture.
	Cancelled,
}

/// A single order line item.
///
/// Item customizations arrive as one of three explicit shapes, decoded once
/// at the intake boundary rather than re-parsed ad hoc downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LineItem {
	/// A plain menu item.
	Single {
		name: String,
		quantity: u32,
		unit_price: f64,
	},
	/// A fixed-price bundle composed of sub-items.
	Bundle {
		name: String,
		quantity: u32,
		unit_price: f64,
		components: Vec<BundleComponent>,
	},
	/// A menu item with priced add-ons.
	WithAddons {
		name: String,
		quantity: u32,
		unit_price: f64,
		addons: Vec<Addon>,
	},
}

impl LineItem {
	/// Returns the total price of this line, add-ons included.
	pub fn line_total(&self) -> f64 {
		match self {
			LineItem::Single {
				quantity,
				unit_price,
				..
			} => *quantity as f64 * unit_price,
			LineItem::Bundle {
				quantity,
				unit_price,
				..
			} => *quantity as f64 * unit_price,
			LineItem::WithAddons {
				quantity,
				unit_price,
				addons,
				..
			} => {
				let addon_total: f64 = addons.iter().map(|a| a.price).sum();
				*quantity as f64 * (unit_price + addon_total)
			}
		}
	}
}

/// A sub-item inside a bundle line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleComponent {
	/// Sub-item display name.
	pub name: String,
	/// Chosen option for this slot, if the bundle offers choices.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub choice: Option<String>,
}

/// A priced add-on attached to a line item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Addon {
	/// Add-on display name.
	pub name: String,
	/// Add-on price per item.
	pub price: f64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn line_total_includes_addons() {
		let item = LineItem::WithAddons {
			name: "burger".into(),
			quantity: 2,
			unit_price: 8.0,
			addons: vec![
				Addon {
					name: "cheese".into(),
					price: 1.0,
				},
				Addon {
					name: "bacon".into(),
					price: 1.5,
				},
			],
		};
		assert_eq!(item.line_total(), 21.0);
	}

	#[test]
	fn status_terminality() {
		assert!(OrderStatus::Delivered.is_terminal());
		assert!(OrderStatus::Cancelled.is_terminal());
		assert!(!OrderStatus::Claimed.is_terminal());
		assert!(OrderStatus::Claimed.is_pre_delivery());
		assert!(!OrderStatus::Rejected.is_pre_delivery());
	}
}
