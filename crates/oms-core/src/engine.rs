//! Core marketplace engine that orchestrates the order lifecycle.
//!
//! The engine coordinates the lifecycle state machine, the claim
//! coordinator, the settlement service and the external collaborators
//! (payments, notifications), and enforces per-operation authorization:
//! every operation is invoked on behalf of an [`Actor`] whose role and
//! identity are checked against the order row before anything is written.
//!
//! State changes go through [`StorageService::mutate`] so concurrent
//! writers serialize per order row, and each successful change publishes a
//! [`MarketEvent`] on the event bus. Notifications are fire-and-forget.

use crate::event_bus::EventBus;
use chrono::Utc;
use oms_config::Config;
use oms_dispatch::{DispatchError, DispatchService};
use oms_lifecycle::{transition, ImminentAlert, LifecycleError, OrderAction, PreventiveAlert, TransitionPolicy};
use oms_settlement::{RefundOutcome, SettlementError, SettlementService};
use oms_storage::{MutateError, StorageError, StorageService};
use oms_types::{
	round_cents, Actor, Complaint, ComplaintDecision, ComplaintKind, DispatchEvent, LineItem,
	MarketEvent, NotificationKind, Notifier, Order, OrderEvent, OrderStatus, PaymentStatus,
	PayoutSummary, Role, SettlementEvent, StorageKey, Transfer,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Not authorized: {0}")]
	Unauthorized(String),
	#[error("Invalid request: {0}")]
	Validation(String),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error(transparent)]
	Lifecycle(#[from] LifecycleError),
	#[error(transparent)]
	Dispatch(#[from] DispatchError),
	#[error(transparent)]
	Settlement(#[from] SettlementError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl EngineError {
	fn from_mutate(order_id: &str, e: MutateError<EngineError>) -> EngineError {
		match e {
			MutateError::Rejected(e) => e,
			MutateError::Storage(StorageError::NotFound) => {
				EngineError::OrderNotFound(order_id.to_string())
			}
			MutateError::Storage(e) => EngineError::Storage(e),
		}
	}
}

/// Order intake request, decoded at the API boundary.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateOrderRequest {
	pub restaurant_id: String,
	pub restaurant_name: String,
	pub restaurant_address: String,
	pub items: Vec<LineItem>,
	pub delivery_fee: f64,
}

/// Main marketplace engine.
#[derive(Clone)]
pub struct Engine {
	/// Marketplace configuration.
	pub(crate) config: Config,
	/// Storage service for persisting rows.
	pub(crate) storage: Arc<StorageService>,
	/// Claim coordinator and handoff verifier.
	pub(crate) dispatch: Arc<DispatchService>,
	/// Settlement, payout and complaint service.
	pub(crate) settlement: Arc<SettlementService>,
	/// Notification collaborator.
	pub(crate) notifier: Arc<dyn Notifier>,
	/// Event bus for marketplace events.
	pub(crate) event_bus: EventBus,
}

fn require_role(actor: &Actor, role: Role) -> Result<(), EngineError> {
	if actor.role != role {
		return Err(EngineError::Unauthorized(format!(
			"operation requires the {} role",
			role
		)));
	}
	Ok(())
}

/// Security codes are four digits, shared with the customer at intake and
/// checked by the handoff verifier.
fn generate_security_code() -> String {
	format!("{:04}", Uuid::new_v4().as_u128() % 10_000)
}

fn redacted(mut order: Order) -> Order {
	order.security_code = None;
	order
}

impl Engine {
	/// Returns a handle to the event bus.
	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Subscribes to the marketplace event stream.
	pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MarketEvent> {
		self.event_bus.subscribe()
	}

	fn policy(&self) -> TransitionPolicy {
		TransitionPolicy {
			claim_from_preparing: self.config.dispatch.claim_from_preparing,
		}
	}

	async fn notify(&self, recipient: &str, kind: NotificationKind, data: serde_json::Value) {
		if let Err(e) = self.notifier.notify(recipient, kind, data).await {
			warn!(recipient = %recipient, kind = ?kind, error = %e, "Notification delivery failed");
		}
	}

	async fn load_order(&self, order_id: &str) -> Result<Order, EngineError> {
		match self
			.storage
			.retrieve::<Order>(StorageKey::Orders.as_str(), order_id)
			.await
		{
			Ok(order) => Ok(order),
			Err(StorageError::NotFound) => Err(EngineError::OrderNotFound(order_id.to_string())),
			Err(e) => Err(e.into()),
		}
	}

	// ---- intake ----

	/// Creates a new order in pending status with a fresh security code.
	pub async fn create_order(
		&self,
		actor: &Actor,
		request: CreateOrderRequest,
	) -> Result<Order, EngineError> {
		require_role(actor, Role::Customer)?;
		if request.items.is_empty() {
			return Err(EngineError::Validation("order has no items".to_string()));
		}
		for item in &request.items {
			let (name, quantity) = match item {
				LineItem::Single { name, quantity, .. }
				| LineItem::Bundle { name, quantity, .. }
				| LineItem::WithAddons { name, quantity, .. } => (name, *quantity),
			};
			if quantity == 0 {
				return Err(EngineError::Validation(format!(
					"line item '{}' has zero quantity",
					name
				)));
			}
			if item.line_total() < 0.0 {
				return Err(EngineError::Validation(format!(
					"line item '{}' has a negative total",
					name
				)));
			}
		}
		if request.delivery_fee < 0.0 {
			return Err(EngineError::Validation(
				"delivery fee must not be negative".to_string(),
			));
		}

		let now = Utc::now();
		let subtotal: f64 = request.items.iter().map(LineItem::line_total).sum();
		let order = Order {
			id: Uuid::new_v4().to_string(),
			restaurant_id: request.restaurant_id,
			customer_id: actor.id.clone(),
			created_at: now,
			updated_at: now,
			status: OrderStatus::Pending,
			items: request.items,
			total: round_cents(subtotal + request.delivery_fee),
			delivery_fee: request.delivery_fee,
			restaurant_name: request.restaurant_name,
			restaurant_address: request.restaurant_address,
			prep_minutes: None,
			prep_started_at: None,
			courier_id: None,
			security_code: Some(generate_security_code()),
			code_attempts: 0,
			payment_status: PaymentStatus::Unpaid,
			payment_reference: None,
			refund_amount: None,
			refund_reference: None,
			delivered_at: None,
			restaurant_paid_at: None,
		};
		let created = self
			.storage
			.store_new(StorageKey::Orders.as_str(), &order.id, &order)
			.await?;
		if !created {
			return Err(EngineError::Storage(StorageError::Backend(
				"order id collision".to_string(),
			)));
		}
		info!(order_id = %order.id, restaurant_id = %order.restaurant_id, total = order.total, "Order created");
		self.event_bus
			.publish(MarketEvent::Order(OrderEvent::Created {
				order: order.clone(),
			}))
			.ok();
		Ok(order)
	}

	// ---- restaurant operations ----

	/// Restaurant accepts a pending order with a preparation duration.
	pub async fn accept_order(
		&self,
		actor: &Actor,
		order_id: &str,
		prep_minutes: u32,
	) -> Result<Order, EngineError> {
		require_role(actor, Role::Restaurant)?;
		let policy = self.policy();
		let restaurant = actor.id.clone();
		let mut from = OrderStatus::Pending;
		let order = self
			.storage
			.mutate(StorageKey::Orders.as_str(), order_id, |row: &mut Order| {
				if row.restaurant_id != restaurant {
					return Err(EngineError::Unauthorized(
						"order belongs to another restaurant".to_string(),
					));
				}
				from = row.status;
				let to = transition(row.status, &OrderAction::Accept { prep_minutes }, policy)?;
				let now = Utc::now();
				row.status = to;
				row.prep_minutes = Some(prep_minutes);
				row.prep_started_at = Some(now);
				row.updated_at = now;
				Ok(())
			})
			.await
			.map_err(|e| EngineError::from_mutate(order_id, e))?;

		info!(order_id = %order_id, prep_minutes = prep_minutes, "Order accepted");
		self.publish_status_change(order_id, from, order.status);
		self.notify(
			&order.customer_id,
			NotificationKind::OrderAccepted,
			serde_json::json!({ "order_id": order_id, "prep_minutes": prep_minutes }),
		)
		.await;
		Ok(order)
	}

	/// Restaurant rejects a pending order.
	pub async fn reject_order(&self, actor: &Actor, order_id: &str) -> Result<Order, EngineError> {
		require_role(actor, Role::Restaurant)?;
		let policy = self.policy();
		let restaurant = actor.id.clone();
		let mut from = OrderStatus::Pending;
		let order = self
			.storage
			.mutate(StorageKey::Orders.as_str(), order_id, |row: &mut Order| {
				if row.restaurant_id != restaurant {
					return Err(EngineError::Unauthorized(
						"order belongs to another restaurant".to_string(),
					));
				}
				from = row.status;
				row.status = transition(row.status, &OrderAction::Reject, policy)?;
				row.updated_at = Utc::now();
				Ok(())
			})
			.await
			.map_err(|e| EngineError::from_mutate(order_id, e))?;

		info!(order_id = %order_id, "Order rejected");
		self.publish_status_change(order_id, from, order.status);
		self.notify(
			&order.customer_id,
			NotificationKind::OrderRejected,
			serde_json::json!({ "order_id": order_id }),
		)
		.await;
		Ok(order)
	}

	/// Restaurant marks an order as ready for pickup.
	pub async fn mark_ready(&self, actor: &Actor, order_id: &str) -> Result<Order, EngineError> {
		require_role(actor, Role::Restaurant)?;
		let policy = self.policy();
		let restaurant = actor.id.clone();
		let mut from = OrderStatus::Preparing;
		let order = self
			.storage
			.mutate(StorageKey::Orders.as_str(), order_id, |row: &mut Order| {
				if row.restaurant_id != restaurant {
					return Err(EngineError::Unauthorized(
						"order belongs to another restaurant".to_string(),
					));
				}
				from = row.status;
				row.status = transition(row.status, &OrderAction::MarkReady, policy)?;
				row.updated_at = Utc::now();
				Ok(())
			})
			.await
			.map_err(|e| EngineError::from_mutate(order_id, e))?;

		info!(order_id = %order_id, "Order ready for pickup");
		self.publish_status_change(order_id, from, order.status);
		self.notify(
			&order.customer_id,
			NotificationKind::OrderReady,
			serde_json::json!({ "order_id": order_id }),
		)
		.await;
		Ok(order)
	}

	// ---- cancellation ----

	/// Cancels a pre-delivery order.
	///
	/// Customers may cancel their own order at any point before it is
	/// delivered; admins may cancel any order that has not been delivered.
	pub async fn cancel_order(
		&self,
		actor: &Actor,
		order_id: &str,
		reason: String,
	) -> Result<Order, EngineError> {
		if !matches!(actor.role, Role::Customer | Role::Admin) {
			return Err(EngineError::Unauthorized(
				"only customers and admins may cancel orders".to_string(),
			));
		}
		let policy = self.policy();
		let caller = actor.clone();
		let order = self
			.storage
			.mutate(StorageKey::Orders.as_str(), order_id, |row: &mut Order| {
				if caller.role == Role::Customer && row.customer_id != caller.id {
					return Err(EngineError::Unauthorized(
						"order belongs to another customer".to_string(),
					));
				}
				row.status = transition(row.status, &OrderAction::Cancel, policy)?;
				if row.payment_status == PaymentStatus::Unpaid {
					row.payment_status = PaymentStatus::Cancelled;
				}
				row.updated_at = Utc::now();
				Ok(())
			})
			.await
			.map_err(|e| EngineError::from_mutate(order_id, e))?;

		info!(order_id = %order_id, reason = %reason, "Order cancelled");
		self.event_bus
			.publish(MarketEvent::Order(OrderEvent::Cancelled {
				order_id: order_id.to_string(),
				reason: reason.clone(),
			}))
			.ok();
		self.notify(
			&order.customer_id,
			NotificationKind::OrderCancelled,
			serde_json::json!({ "order_id": order_id, "reason": reason }),
		)
		.await;
		Ok(order)
	}

	// ---- courier operations ----

	/// Courier claims an order exclusively.
	pub async fn claim_order(&self, actor: &Actor, order_id: &str) -> Result<Order, EngineError> {
		require_role(actor, Role::Courier)?;
		let order = self.dispatch.claim(order_id, &actor.id).await?;
		self.event_bus
			.publish(MarketEvent::Dispatch(DispatchEvent::Claimed {
				order_id: order_id.to_string(),
				courier_id: actor.id.clone(),
			}))
			.ok();
		self.notify(
			&order.customer_id,
			NotificationKind::OrderClaimed,
			serde_json::json!({ "order_id": order_id }),
		)
		.await;
		Ok(redacted(order))
	}

	/// Courier completes the handoff with the customer's security code.
	pub async fn complete_delivery(
		&self,
		actor: &Actor,
		order_id: &str,
		security_code: &str,
	) -> Result<Order, EngineError> {
		require_role(actor, Role::Courier)?;
		let order = self.dispatch.complete(order_id, &actor.id, security_code).await?;
		self.event_bus
			.publish(MarketEvent::Dispatch(DispatchEvent::Delivered {
				order_id: order_id.to_string(),
				courier_id: actor.id.clone(),
			}))
			.ok();
		self.notify(
			&order.customer_id,
			NotificationKind::OrderDelivered,
			serde_json::json!({ "order_id": order_id }),
		)
		.await;
		Ok(redacted(order))
	}

	/// Orders available to claim, without their security codes.
	pub async fn available_orders(&self, actor: &Actor) -> Result<Vec<Order>, EngineError> {
		require_role(actor, Role::Courier)?;
		let orders = self.dispatch.available_orders().await?;
		Ok(orders.into_iter().map(redacted).collect())
	}

	/// The order the courier is currently delivering, if any.
	pub async fn current_order(&self, actor: &Actor) -> Result<Option<Order>, EngineError> {
		require_role(actor, Role::Courier)?;
		Ok(self
			.dispatch
			.current_order(&actor.id)
			.await?
			.map(redacted))
	}

	/// Preventive pickup alerts for orders still in preparation.
	pub async fn preventive_alerts(&self, actor: &Actor) -> Result<Vec<PreventiveAlert>, EngineError> {
		require_role(actor, Role::Courier)?;
		Ok(self.dispatch.preventive_alerts().await?)
	}

	/// Imminent pickup alerts for the courier's claimed orders.
	pub async fn imminent_alerts(&self, actor: &Actor) -> Result<Vec<ImminentAlert>, EngineError> {
		require_role(actor, Role::Courier)?;
		Ok(self.dispatch.imminent_alerts(&actor.id).await?)
	}

	// ---- visibility ----

	/// Fetches one order, enforcing per-role visibility.
	///
	/// The security code is only shown to the customer and admins.
	pub async fn get_order(&self, actor: &Actor, order_id: &str) -> Result<Order, EngineError> {
		let order = self.load_order(order_id).await?;
		let visible = match actor.role {
			Role::Admin => true,
			Role::Customer => order.customer_id == actor.id,
			Role::Restaurant => order.restaurant_id == actor.id,
			Role::Courier => order.courier_id.as_deref() == Some(actor.id.as_str()),
		};
		if !visible {
			return Err(EngineError::Unauthorized(
				"order is not visible to this actor".to_string(),
			));
		}
		Ok(match actor.role {
			Role::Customer | Role::Admin => order,
			Role::Restaurant | Role::Courier => redacted(order),
		})
	}

	/// Lists the orders visible to this actor.
	pub async fn list_orders(&self, actor: &Actor) -> Result<Vec<Order>, EngineError> {
		let orders: Vec<Order> = self.storage.list(StorageKey::Orders.as_str()).await?;
		let mut visible: Vec<Order> = match actor.role {
			Role::Admin => orders,
			Role::Customer => orders
				.into_iter()
				.filter(|o| o.customer_id == actor.id)
				.collect(),
			Role::Restaurant => orders
				.into_iter()
				.filter(|o| o.restaurant_id == actor.id)
				.map(redacted)
				.collect(),
			Role::Courier => {
				return Err(EngineError::Unauthorized(
					"couriers use the dispatch feeds".to_string(),
				))
			}
		};
		visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(visible)
	}

	// ---- complaints and settlement ----

	/// Customer files a complaint against their delivered order.
	pub async fn file_complaint(
		&self,
		actor: &Actor,
		order_id: &str,
		kind: ComplaintKind,
		requested_amount: f64,
		description: String,
	) -> Result<Complaint, EngineError> {
		require_role(actor, Role::Customer)?;
		let order = self.load_order(order_id).await?;
		if order.customer_id != actor.id {
			return Err(EngineError::Unauthorized(
				"order belongs to another customer".to_string(),
			));
		}
		let complaint = self
			.settlement
			.file_complaint(
				order_id,
				&actor.id,
				kind,
				requested_amount,
				description,
				Utc::now(),
			)
			.await?;
		self.event_bus
			.publish(MarketEvent::Settlement(SettlementEvent::ComplaintFiled {
				complaint_id: complaint.id.clone(),
				order_id: order_id.to_string(),
				priority: complaint.priority,
			}))
			.ok();
		Ok(complaint)
	}

	/// Admin resolves a complaint; approval issues the refund.
	pub async fn resolve_complaint(
		&self,
		actor: &Actor,
		complaint_id: &str,
		decision: ComplaintDecision,
		admin_response: String,
		final_amount: Option<f64>,
	) -> Result<(Complaint, Option<RefundOutcome>), EngineError> {
		require_role(actor, Role::Admin)?;
		let (complaint, refund) = self
			.settlement
			.resolve_complaint(complaint_id, decision, admin_response, final_amount, Utc::now())
			.await?;
		self.event_bus
			.publish(MarketEvent::Settlement(SettlementEvent::ComplaintResolved {
				complaint_id: complaint_id.to_string(),
				approved: decision == ComplaintDecision::Approve,
			}))
			.ok();
		if let Some(refund) = &refund {
			self.event_bus
				.publish(MarketEvent::Settlement(SettlementEvent::RefundIssued {
					order_id: complaint.order_id.clone(),
					amount: refund.amount,
					reference: refund.reference.clone(),
				}))
				.ok();
			self.notify(
				&complaint.customer_id,
				NotificationKind::RefundIssued,
				serde_json::json!({ "order_id": complaint.order_id, "amount": refund.amount }),
			)
			.await;
		}
		self.notify(
			&complaint.customer_id,
			NotificationKind::ComplaintResolved,
			serde_json::json!({ "complaint_id": complaint_id, "status": complaint.status.to_string() }),
		)
		.await;
		Ok((complaint, refund))
	}

	/// Lists complaints: all for admins, own for customers.
	pub async fn list_complaints(&self, actor: &Actor) -> Result<Vec<Complaint>, EngineError> {
		let complaints: Vec<Complaint> =
			self.storage.list(StorageKey::Complaints.as_str()).await?;
		let mut visible: Vec<Complaint> = match actor.role {
			Role::Admin => complaints,
			Role::Customer => complaints
				.into_iter()
				.filter(|c| c.customer_id == actor.id)
				.collect(),
			_ => {
				return Err(EngineError::Unauthorized(
					"complaints are visible to customers and admins".to_string(),
				))
			}
		};
		visible.sort_by(|a, b| b.filed_at.cmp(&a.filed_at));
		Ok(visible)
	}

	/// Admin records a completed payout transfer.
	pub async fn record_transfer(
		&self,
		actor: &Actor,
		restaurant_id: &str,
		amount: f64,
		reference: Option<String>,
		period: Option<String>,
	) -> Result<Transfer, EngineError> {
		require_role(actor, Role::Admin)?;
		let transfer = self
			.settlement
			.record_transfer(restaurant_id, amount, reference, period, Utc::now())
			.await?;
		self.event_bus
			.publish(MarketEvent::Settlement(SettlementEvent::TransferRecorded {
				transfer_id: transfer.id.clone(),
				restaurant_id: restaurant_id.to_string(),
				amount,
			}))
			.ok();
		Ok(transfer)
	}

	/// Payout summary: admins for any restaurant, restaurants for themselves.
	pub async fn payout_summary(
		&self,
		actor: &Actor,
		restaurant_id: &str,
	) -> Result<PayoutSummary, EngineError> {
		let allowed = match actor.role {
			Role::Admin => true,
			Role::Restaurant => actor.id == restaurant_id,
			_ => false,
		};
		if !allowed {
			return Err(EngineError::Unauthorized(
				"payout summary is visible to admins and the restaurant itself".to_string(),
			));
		}
		Ok(self.settlement.payout_summary(restaurant_id).await?)
	}

	// ---- payment collaborator webhooks ----

	/// Records a successful charge reported by the payment collaborator.
	pub async fn payment_captured(
		&self,
		order_id: &str,
		reference: String,
	) -> Result<Order, EngineError> {
		let order = self
			.storage
			.mutate(StorageKey::Orders.as_str(), order_id, |row: &mut Order| {
				row.payment_status = PaymentStatus::Paid;
				row.payment_reference = Some(reference.clone());
				row.updated_at = Utc::now();
				Ok(())
			})
			.await
			.map_err(|e| EngineError::from_mutate(order_id, e))?;
		info!(order_id = %order_id, "Payment captured");
		Ok(order)
	}

	/// Records a failed charge; pre-delivery orders are cancelled.
	pub async fn payment_failed(&self, order_id: &str) -> Result<Order, EngineError> {
		let policy = self.policy();
		let order = self
			.storage
			.mutate(StorageKey::Orders.as_str(), order_id, |row: &mut Order| {
				row.payment_status = PaymentStatus::Failed;
				if row.status.is_pre_delivery() {
					row.status = transition(row.status, &OrderAction::Cancel, policy)?;
				}
				row.updated_at = Utc::now();
				Ok(())
			})
			.await
			.map_err(|e| EngineError::from_mutate(order_id, e))?;
		warn!(order_id = %order_id, status = %order.status, "Payment failed");
		if order.status == OrderStatus::Cancelled {
			self.event_bus
				.publish(MarketEvent::Order(OrderEvent::Cancelled {
					order_id: order_id.to_string(),
					reason: "payment failed".to_string(),
				}))
				.ok();
			self.notify(
				&order.customer_id,
				NotificationKind::OrderCancelled,
				serde_json::json!({ "order_id": order_id, "reason": "payment failed" }),
			)
			.await;
		}
		Ok(order)
	}

	/// Opens a high-priority complaint for a dispute raised at the payment
	/// network.
	pub async fn payment_disputed(
		&self,
		order_id: &str,
		disputed_amount: f64,
		reason: String,
	) -> Result<Complaint, EngineError> {
		let complaint = self
			.settlement
			.open_dispute(order_id, disputed_amount, reason, Utc::now())
			.await?;
		self.event_bus
			.publish(MarketEvent::Settlement(SettlementEvent::ComplaintFiled {
				complaint_id: complaint.id.clone(),
				order_id: order_id.to_string(),
				priority: complaint.priority,
			}))
			.ok();
		Ok(complaint)
	}

	fn publish_status_change(&self, order_id: &str, from: OrderStatus, to: OrderStatus) {
		self.event_bus
			.publish(MarketEvent::Order(OrderEvent::StatusChanged {
				order_id: order_id.to_string(),
				from,
				to,
			}))
			.ok();
	}
}
