//! Settlement service for the order marketplace.
//!
//! Owns the money-facing side of the order lifecycle: computing and issuing
//! refunds when a complaint is approved, reconciling restaurant payouts
//! against recorded transfers, and the complaint workflow itself.
//!
//! The refund path talks to an external payment processor through the
//! [`PaymentGateway`] port. The external call happens before any local row
//! is modified, and the gateway is consulted for an existing refund first,
//! so a crash between the two steps is repaired by re-running the
//! resolution rather than by issuing a second refund.

use async_trait::async_trait;
use oms_config::SettlementConfig;
use oms_storage::{StorageError, StorageService};
use oms_types::{amounts_equal, round_cents, Order, StorageKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod complaint;
pub mod payout;

/// Errors produced by settlement operations.
#[derive(Debug, Error)]
pub enum SettlementError {
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Complaint not found: {0}")]
	ComplaintNotFound(String),
	#[error("Order has not been delivered")]
	OrderNotDelivered,
	#[error("Complaint window is not open: {0}")]
	WindowClosed(String),
	#[error("Complaint has already been resolved")]
	AlreadyResolved,
	#[error("An open complaint already exists for order {0}")]
	DuplicateComplaint(String),
	#[error("Invalid amount: {0}")]
	InvalidAmount(String),
	#[error("Payment gateway error: {0}")]
	Payment(#[from] PaymentError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Errors returned by the external payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
	#[error("Payment processor unavailable: {0}")]
	Unavailable(String),
	#[error("Refund rejected by processor: {0}")]
	Rejected(String),
}

/// A refund already issued by the payment processor.
#[derive(Debug, Clone)]
pub struct RefundRecord {
	/// Processor-side refund reference.
	pub reference: String,
	/// Refunded amount.
	pub amount: f64,
}

/// Port to the external payment processor.
///
/// `find_refund` is the idempotency half of the two-step refund: resolution
/// looks up an existing refund for the order before creating one, so a
/// retried resolution never double-refunds.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
	/// Issues a refund against a captured payment. Returns the processor
	/// refund reference.
	async fn create_refund(
		&self,
		payment_reference: &str,
		amount: f64,
		metadata: serde_json::Value,
	) -> Result<String, PaymentError>;

	/// Looks up a refund previously issued for this order, if any.
	async fn find_refund(&self, order_id: &str) -> Result<Option<RefundRecord>, PaymentError>;
}

/// Local mirror of a payment ledger row, keyed by order.
///
/// Written best-effort alongside refunds; the order row remains the source
/// of truth for payment state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLedgerRow {
	pub order_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reference: Option<String>,
	pub status: String,
	pub amount: f64,
}

/// Refund issued as part of a complaint resolution.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
	pub amount: f64,
	pub reference: String,
}

/// Settlement service: refunds, payouts and complaints.
pub struct SettlementService {
	storage: Arc<StorageService>,
	gateway: Arc<dyn PaymentGateway>,
	commission_rate: f64,
	internal_restaurant_id: Option<String>,
	window_open_minutes: i64,
	window_close_hours: i64,
}

impl SettlementService {
	/// Creates a settlement service over the given storage and gateway.
	pub fn new(
		storage: Arc<StorageService>,
		gateway: Arc<dyn PaymentGateway>,
		config: &SettlementConfig,
	) -> Self {
		Self {
			storage,
			gateway,
			commission_rate: config.commission_rate,
			internal_restaurant_id: config.internal_restaurant_id.clone(),
			window_open_minutes: config.complaint_window_open_minutes,
			window_close_hours: config.complaint_window_close_hours,
		}
	}

	async fn load_order(&self, order_id: &str) -> Result<Order, SettlementError> {
		match self
			.storage
			.retrieve::<Order>(StorageKey::Orders.as_str(), order_id)
			.await
		{
			Ok(order) => Ok(order),
			Err(StorageError::NotFound) => {
				Err(SettlementError::OrderNotFound(order_id.to_string()))
			}
			Err(e) => Err(e.into()),
		}
	}
}

/// Computes the amount to refund for an approved complaint.
///
/// The base is the admin's final amount when one was entered, otherwise the
/// customer's requested amount. When the base equals the order subtotal
/// (within a cent), the delivery fee is added on top so a full-order refund
/// returns everything the customer paid; any other base is refunded as-is.
pub fn compute_refund(order: &Order, requested: f64, final_amount: Option<f64>) -> f64 {
	let base = final_amount.unwrap_or(requested);
	if amounts_equal(base, order.subtotal()) {
		round_cents(base + order.delivery_fee)
	} else {
		round_cents(base)
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use chrono::{TimeZone, Utc};
	use oms_storage::implementations::memory::MemoryStorage;
	use oms_types::{LineItem, OrderStatus, PaymentStatus};
	use std::sync::Mutex;

	pub fn storage() -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	pub fn delivered_order(id: &str, restaurant: &str) -> Order {
		let now = Utc.with_ymd_and_hms(2026, 7, 14, 12, 0, 0).unwrap();
		Order {
			id: id.to_string(),
			restaurant_id: restaurant.to_string(),
			customer_id: "cust-1".to_string(),
			created_at: now,
			updated_at: now,
			status: OrderStatus::Delivered,
			items: vec![LineItem::Single {
				name: "Pad Thai".to_string(),
				quantity: 1,
				unit_price: 20.0,
			}],
			total: 23.5,
			delivery_fee: 3.5,
			restaurant_name: "Thai Corner".to_string(),
			restaurant_address: "12 Noodle St".to_string(),
			prep_minutes: Some(20),
			prep_started_at: Some(now),
			courier_id: Some("courier-1".to_string()),
			security_code: Some("7731".to_string()),
			code_attempts: 0,
			payment_status: PaymentStatus::Paid,
			payment_reference: Some("pay_123".to_string()),
			refund_amount: None,
			refund_reference: None,
			delivered_at: Some(now),
			restaurant_paid_at: None,
		}
	}

	/// Gateway that records refunds in memory.
	pub struct MockGateway {
		pub refunds: Mutex<Vec<(String, f64)>>,
		pub existing: Mutex<Option<RefundRecord>>,
	}

	impl MockGateway {
		pub fn new() -> Arc<Self> {
			Arc::new(Self {
				refunds: Mutex::new(Vec::new()),
				existing: Mutex::new(None),
			})
		}
	}

	#[async_trait]
	impl PaymentGateway for MockGateway {
		async fn create_refund(
			&self,
			payment_reference: &str,
			amount: f64,
			_metadata: serde_json::Value,
		) -> Result<String, PaymentError> {
			let mut refunds = self.refunds.lock().unwrap();
			refunds.push((payment_reference.to_string(), amount));
			Ok(format!("re_{}", refunds.len()))
		}

		async fn find_refund(
			&self,
			_order_id: &str,
		) -> Result<Option<RefundRecord>, PaymentError> {
			Ok(self.existing.lock().unwrap().clone())
		}
	}

	pub fn service(
		storage: Arc<StorageService>,
		gateway: Arc<dyn PaymentGateway>,
	) -> SettlementService {
		SettlementService::new(storage, gateway, &SettlementConfig::default())
	}
}
