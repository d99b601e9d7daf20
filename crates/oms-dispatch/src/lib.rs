//! Dispatch module for the order management system.
//!
//! This module resolves the race between couriers observing the same ready
//! order and gates the terminal handoff behind the order's security code.
//! Claiming is a single conditional update against the order store: the
//! compare-and-swap closes the window in which two couriers could both win.

use chrono::Utc;
use oms_config::DispatchConfig;
use oms_lifecycle::{
	imminent_alert, preventive_alert, transition, ImminentAlert, OrderAction, PreventiveAlert,
	TransitionPolicy,
};
use oms_storage::{MutateError, StorageError, StorageService};
use oms_types::{Order, OrderStatus, StorageKey};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during dispatch operations.
///
/// `AlreadyClaimed`, `CodeMismatch` and `HandoffLocked` are expected
/// outcomes of concurrent operation, not crashes; callers surface them as
/// ordinary branches.
#[derive(Debug, Error)]
pub enum DispatchError {
	/// The order does not exist.
	#[error("Order not found")]
	NotFound,
	/// Another courier won the claim race.
	#[error("Order already taken by another courier")]
	AlreadyClaimed,
	/// The order is not in a claimable or deliverable state.
	#[error("Order is not available in status {0}")]
	InvalidState(OrderStatus),
	/// The caller is not the courier assigned to this order.
	#[error("Order is assigned to a different courier")]
	NotAssigned,
	/// The submitted security code does not match the stored one.
	#[error("Security code mismatch")]
	CodeMismatch,
	/// Too many failed code submissions; the handoff is locked.
	#[error("Handoff locked after repeated code mismatches")]
	HandoffLocked,
	/// The order store failed.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl From<MutateError<DispatchError>> for DispatchError {
	fn from(err: MutateError<DispatchError>) -> Self {
		match err {
			MutateError::Storage(StorageError::NotFound) => DispatchError::NotFound,
			MutateError::Storage(e) => DispatchError::Storage(e),
			MutateError::Rejected(e) => e,
		}
	}
}

/// Service coordinating courier claims and delivery handoffs.
pub struct DispatchService {
	/// Order store handle.
	storage: Arc<StorageService>,
	/// Transition policy derived from configuration.
	policy: TransitionPolicy,
	/// Maximum failed code submissions before the handoff locks, if set.
	max_code_attempts: Option<u32>,
	/// Minutes before readiness at which imminent alerts fire.
	imminent_threshold_minutes: u32,
}

impl DispatchService {
	/// Creates a new DispatchService with the given store and policy.
	pub fn new(storage: Arc<StorageService>, config: &DispatchConfig) -> Self {
		Self {
			storage,
			policy: TransitionPolicy {
				claim_from_preparing: config.claim_from_preparing,
			},
			max_code_attempts: config.max_code_attempts,
			imminent_threshold_minutes: config.imminent_threshold_minutes,
		}
	}

	/// Atomically claims an order for a courier.
	///
	/// The whole check-and-assign runs as one conditional update: if another
	/// courier's write lands first, the compare-and-swap fails, the row is
	/// reloaded, and the re-evaluation observes the winner and rejects with
	/// `AlreadyClaimed`.
	pub async fn claim(&self, order_id: &str, courier_id: &str) -> Result<Order, DispatchError> {
		let policy = self.policy;
		let courier = courier_id.to_string();
		let order = self
			.storage
			.mutate(StorageKey::Orders.as_str(), order_id, |order: &mut Order| {
				if order.courier_id.is_some() {
					return Err(DispatchError::AlreadyClaimed);
				}
				let next = transition(order.status, &OrderAction::Claim, policy)
					.map_err(|_| DispatchError::InvalidState(order.status))?;
				order.status = next;
				order.courier_id = Some(courier.clone());
				order.updated_at = Utc::now();
				Ok(())
			})
			.await?;

		tracing::info!(order_id = %order_id, courier_id = %courier_id, "Order claimed");
		Ok(order)
	}

	/// Completes the delivery handoff, gated by the security code.
	///
	/// Only the assigned courier may complete. A mismatching code leaves the
	/// order state unchanged unless an attempt limit is configured, in which
	/// case only the attempt counter is written.
	pub async fn complete(
		&self,
		order_id: &str,
		courier_id: &str,
		submitted_code: &str,
	) -> Result<Order, DispatchError> {
		let policy = self.policy;
		let max_attempts = self.max_code_attempts;
		let courier = courier_id.to_string();
		let code = submitted_code.trim().to_string();
		// Set inside the closure when the code mismatches but the attempt
		// counter must still be persisted.
		let mut mismatch = false;
		let mut locked = false;

		let order = self
			.storage
			.mutate(StorageKey::Orders.as_str(), order_id, |order: &mut Order| {
				mismatch = false;
				locked = false;

				if order.status != OrderStatus::Claimed {
					return Err(DispatchError::InvalidState(order.status));
				}
				if order.courier_id.as_deref() != Some(courier.as_str()) {
					return Err(DispatchError::NotAssigned);
				}
				if let Some(max) = max_attempts {
					if order.code_attempts >= max {
						return Err(DispatchError::HandoffLocked);
					}
				}

				// Legacy rows without a stored code auto-pass.
				let matches = match order.security_code.as_deref() {
					None => true,
					Some(stored) => stored == code,
				};
				if !matches {
					match max_attempts {
						// Persist the failed attempt, then report the mismatch.
						Some(max) => {
							order.code_attempts += 1;
							mismatch = true;
							locked = order.code_attempts >= max;
							return Ok(());
						}
						None => return Err(DispatchError::CodeMismatch),
					}
				}

				let next = transition(order.status, &OrderAction::CompleteDelivery, policy)
					.map_err(|_| DispatchError::InvalidState(order.status))?;
				order.status = next;
				order.delivered_at = Some(Utc::now());
				order.updated_at = Utc::now();
				Ok(())
			})
			.await?;

		if mismatch {
			tracing::warn!(
				order_id = %order_id,
				courier_id = %courier_id,
				attempts = order.code_attempts,
				"Security code mismatch"
			);
			return Err(if locked {
				DispatchError::HandoffLocked
			} else {
				DispatchError::CodeMismatch
			});
		}

		tracing::info!(order_id = %order_id, courier_id = %courier_id, "Delivery completed");
		Ok(order)
	}

	/// Orders visible to unassigned couriers: in preparation or ready, with
	/// no courier yet. Claimed orders disappear from this feed.
	pub async fn available_orders(&self) -> Result<Vec<Order>, DispatchError> {
		let orders: Vec<Order> = self.storage.list(StorageKey::Orders.as_str()).await?;
		Ok(orders
			.into_iter()
			.filter(|o| {
				o.courier_id.is_none()
					&& matches!(o.status, OrderStatus::Preparing | OrderStatus::Ready)
			})
			.collect())
	}

	/// The order a courier is currently delivering, if any.
	pub async fn current_order(&self, courier_id: &str) -> Result<Option<Order>, DispatchError> {
		let orders: Vec<Order> = self.storage.list(StorageKey::Orders.as_str()).await?;
		Ok(orders.into_iter().find(|o| {
			o.status == OrderStatus::Claimed && o.courier_id.as_deref() == Some(courier_id)
		}))
	}

	/// Preventive alerts for all orders still in preparation.
	pub async fn preventive_alerts(&self) -> Result<Vec<PreventiveAlert>, DispatchError> {
		let now = Utc::now();
		let orders: Vec<Order> = self.storage.list(StorageKey::Orders.as_str()).await?;
		Ok(orders
			.iter()
			.filter_map(|o| preventive_alert(o, now))
			.collect())
	}

	/// Imminent alerts for the orders claimed by the given courier.
	pub async fn imminent_alerts(
		&self,
		courier_id: &str,
	) -> Result<Vec<ImminentAlert>, DispatchError> {
		let now = Utc::now();
		let orders: Vec<Order> = self.storage.list(StorageKey::Orders.as_str()).await?;
		Ok(orders
			.iter()
			.filter_map(|o| imminent_alert(o, now, self.imminent_threshold_minutes))
			.filter(|a| a.courier_id == courier_id)
			.collect())
	}
}
