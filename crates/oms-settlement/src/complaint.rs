//! Complaint filing, dispute intake and admin resolution.
//!
//! Filing is gated on a delivered order and a time window measured from the
//! handoff. Resolution is a single admin decision; approval runs the
//! two-step refund (external processor first, local rows second) before the
//! complaint leaves `Pending`.

use crate::{
	compute_refund, PaymentLedgerRow, RefundOutcome, SettlementError, SettlementService,
};
use chrono::{DateTime, Duration, Utc};
use oms_storage::{MutateError, StorageError};
use oms_types::{
	Complaint, ComplaintDecision, ComplaintKind, ComplaintPriority, ComplaintStatus, Order,
	OrderStatus, PaymentStatus, StorageKey,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Refund already written to the order rows, if any. A single open
/// complaint exists per order, so a recorded refund belongs to the
/// complaint under resolution.
fn applied_refund(order: &Order) -> Option<RefundOutcome> {
	if order.payment_status != PaymentStatus::Refunded {
		return None;
	}
	match (order.refund_amount, order.refund_reference.as_ref()) {
		(Some(amount), Some(reference)) => Some(RefundOutcome {
			amount,
			reference: reference.clone(),
		}),
		_ => None,
	}
}

impl SettlementService {
	/// Files a customer complaint against a delivered order.
	///
	/// The window opens one hour after the handoff (immediate gripes go to
	/// the restaurant directly) and closes 48 hours after it. At most one
	/// open complaint may exist per order, and the requested amount must be
	/// positive and no larger than the order total.
	pub async fn file_complaint(
		&self,
		order_id: &str,
		customer_id: &str,
		kind: ComplaintKind,
		requested_amount: f64,
		description: String,
		now: DateTime<Utc>,
	) -> Result<Complaint, SettlementError> {
		let order = self.load_order(order_id).await?;
		if order.status != OrderStatus::Delivered {
			return Err(SettlementError::OrderNotDelivered);
		}
		let delivered_at = order
			.delivered_at
			.ok_or(SettlementError::OrderNotDelivered)?;
		let elapsed = now - delivered_at;
		if elapsed <= Duration::minutes(self.window_open_minutes) {
			return Err(SettlementError::WindowClosed(format!(
				"opens {} minutes after delivery",
				self.window_open_minutes
			)));
		}
		if elapsed > Duration::hours(self.window_close_hours) {
			return Err(SettlementError::WindowClosed(format!(
				"closed {} hours after delivery",
				self.window_close_hours
			)));
		}
		self.validate_amount(&order, requested_amount)?;
		self.reject_if_open_complaint(order_id).await?;

		let complaint = Complaint {
			id: Uuid::new_v4().to_string(),
			order_id: order_id.to_string(),
			customer_id: customer_id.to_string(),
			kind,
			requested_amount,
			description,
			status: ComplaintStatus::Pending,
			priority: ComplaintPriority::Normal,
			admin_response: None,
			final_amount: None,
			filed_at: now,
			resolved_at: None,
		};
		self.storage
			.store_new(StorageKey::Complaints.as_str(), &complaint.id, &complaint)
			.await?;
		info!(
			complaint_id = %complaint.id,
			order_id = %order_id,
			requested = requested_amount,
			"Complaint filed"
		);
		Ok(complaint)
	}

	/// Opens a high-priority complaint for a payment-network dispute.
	///
	/// Disputes arrive from the processor regardless of our local order
	/// state, so this bypasses the filing window and the delivered gate and
	/// goes straight to admin triage. The amount is still capped at the
	/// order total.
	pub async fn open_dispute(
		&self,
		order_id: &str,
		disputed_amount: f64,
		reason: String,
		now: DateTime<Utc>,
	) -> Result<Complaint, SettlementError> {
		let order = self.load_order(order_id).await?;
		self.reject_if_open_complaint(order_id).await?;
		let amount = if disputed_amount <= 0.0 || disputed_amount > order.total {
			order.total
		} else {
			disputed_amount
		};

		let complaint = Complaint {
			id: Uuid::new_v4().to_string(),
			order_id: order_id.to_string(),
			customer_id: order.customer_id.clone(),
			kind: ComplaintKind::Other,
			requested_amount: amount,
			description: reason,
			status: ComplaintStatus::Pending,
			priority: ComplaintPriority::High,
			admin_response: None,
			final_amount: None,
			filed_at: now,
			resolved_at: None,
		};
		self.storage
			.store_new(StorageKey::Complaints.as_str(), &complaint.id, &complaint)
			.await?;
		warn!(
			complaint_id = %complaint.id,
			order_id = %order_id,
			amount = amount,
			"Payment dispute opened as high-priority complaint"
		);
		Ok(complaint)
	}

	/// Resolves a complaint with an admin decision.
	///
	/// A complaint is resolved exactly once. Approval requires the order to
	/// still be in `Delivered`, issues the refund through the payment
	/// processor, then cancels and marks the order refunded before the
	/// complaint row itself is flipped.
	pub async fn resolve_complaint(
		&self,
		complaint_id: &str,
		decision: ComplaintDecision,
		admin_response: String,
		final_amount: Option<f64>,
		now: DateTime<Utc>,
	) -> Result<(Complaint, Option<RefundOutcome>), SettlementError> {
		let complaint = match self
			.storage
			.retrieve::<Complaint>(StorageKey::Complaints.as_str(), complaint_id)
			.await
		{
			Ok(c) => c,
			Err(StorageError::NotFound) => {
				return Err(SettlementError::ComplaintNotFound(complaint_id.to_string()))
			}
			Err(e) => return Err(e.into()),
		};
		if complaint.status.is_resolved() {
			return Err(SettlementError::AlreadyResolved);
		}

		let refund = match decision {
			ComplaintDecision::Reject => None,
			ComplaintDecision::Approve => {
				let order = self.load_order(&complaint.order_id).await?;
				// A crash between the order rows and the complaint flip
				// leaves the refund already recorded on the order; pick it
				// up and finish the flip instead of re-running the gate.
				if let Some(outcome) = applied_refund(&order) {
					info!(
						order_id = %order.id,
						reference = %outcome.reference,
						"Order already carries the refund; completing resolution"
					);
					self.mirror_payment_row(&order, &outcome).await;
					Some(outcome)
				} else {
					if order.status != OrderStatus::Delivered {
						return Err(SettlementError::OrderNotDelivered);
					}
					if let Some(amount) = final_amount {
						self.validate_amount(&order, amount)?;
					}
					let amount =
						compute_refund(&order, complaint.requested_amount, final_amount);
					let outcome = self.issue_refund(&order, &complaint, amount).await?;
					self.apply_refund_to_order(&order.id, &outcome, now).await?;
					self.mirror_payment_row(&order, &outcome).await;
					Some(outcome)
				}
			}
		};

		let resolved = self
			.storage
			.mutate::<Complaint, SettlementError, _>(
				StorageKey::Complaints.as_str(),
				complaint_id,
				|row| {
					if row.status.is_resolved() {
						return Err(SettlementError::AlreadyResolved);
					}
					row.status = match decision {
						ComplaintDecision::Approve => ComplaintStatus::Approved,
						ComplaintDecision::Reject => ComplaintStatus::Rejected,
					};
					row.admin_response = Some(admin_response.clone());
					row.final_amount = refund.as_ref().map(|r| r.amount);
					row.resolved_at = Some(now);
					Ok(())
				},
			)
			.await
			.map_err(|e| match e {
				MutateError::Rejected(e) => e,
				MutateError::Storage(e) => SettlementError::Storage(e),
			})?;
		info!(
			complaint_id = %complaint_id,
			status = %resolved.status,
			refunded = refund.as_ref().map(|r| r.amount),
			"Complaint resolved"
		);
		Ok((resolved, refund))
	}

	fn validate_amount(&self, order: &Order, amount: f64) -> Result<(), SettlementError> {
		if amount <= 0.0 {
			return Err(SettlementError::InvalidAmount(
				"refund amount must be positive".to_string(),
			));
		}
		if amount > order.total {
			return Err(SettlementError::InvalidAmount(format!(
				"refund amount {} exceeds order total {}",
				amount, order.total
			)));
		}
		Ok(())
	}

	async fn reject_if_open_complaint(&self, order_id: &str) -> Result<(), SettlementError> {
		let complaints: Vec<Complaint> =
			self.storage.list(StorageKey::Complaints.as_str()).await?;
		if complaints
			.iter()
			.any(|c| c.order_id == order_id && !c.status.is_resolved())
		{
			return Err(SettlementError::DuplicateComplaint(order_id.to_string()));
		}
		Ok(())
	}

	/// Issues the external refund, consulting the processor for an existing
	/// one first so a retried resolution never refunds twice.
	async fn issue_refund(
		&self,
		order: &Order,
		complaint: &Complaint,
		amount: f64,
	) -> Result<RefundOutcome, SettlementError> {
		if let Some(existing) = self.gateway.find_refund(&order.id).await? {
			info!(
				order_id = %order.id,
				reference = %existing.reference,
				"Reusing refund already issued by the processor"
			);
			return Ok(RefundOutcome {
				amount: existing.amount,
				reference: existing.reference,
			});
		}
		let payment_reference = order.payment_reference.as_deref().unwrap_or(&order.id);
		let reference = self
			.gateway
			.create_refund(
				payment_reference,
				amount,
				serde_json::json!({
					"order_id": order.id,
					"complaint_id": complaint.id,
				}),
			)
			.await?;
		Ok(RefundOutcome { amount, reference })
	}

	/// Cancels the order and records the refund on it. Refund fields are
	/// written at most once.
	async fn apply_refund_to_order(
		&self,
		order_id: &str,
		refund: &RefundOutcome,
		now: DateTime<Utc>,
	) -> Result<(), SettlementError> {
		self.storage
			.mutate::<Order, SettlementError, _>(StorageKey::Orders.as_str(), order_id, |row| {
				row.status = OrderStatus::Cancelled;
				row.payment_status = PaymentStatus::Refunded;
				if row.refund_amount.is_none() {
					row.refund_amount = Some(refund.amount);
					row.refund_reference = Some(refund.reference.clone());
				}
				row.updated_at = now;
				Ok(())
			})
			.await
			.map_err(|e| match e {
				MutateError::Rejected(e) => e,
				MutateError::Storage(StorageError::NotFound) => {
					SettlementError::OrderNotFound(order_id.to_string())
				}
				MutateError::Storage(e) => SettlementError::Storage(e),
			})?;
		Ok(())
	}

	/// Best-effort mirror into the payments namespace. The order row is the
	/// source of truth; a failure here is logged and swallowed.
	async fn mirror_payment_row(&self, order: &Order, refund: &RefundOutcome) {
		let row = PaymentLedgerRow {
			order_id: order.id.clone(),
			reference: order.payment_reference.clone(),
			status: "refunded".to_string(),
			amount: refund.amount,
		};
		if let Err(e) = self
			.storage
			.store(StorageKey::Payments.as_str(), &order.id, &row)
			.await
		{
			warn!(order_id = %order.id, error = %e, "Failed to mirror refund into payments namespace");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{delivered_order, service, storage, MockGateway};
	use crate::RefundRecord;

	async fn seed(order: &Order) -> std::sync::Arc<oms_storage::StorageService> {
		let storage = storage();
		storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.unwrap();
		storage
	}

	#[tokio::test]
	async fn filing_window_opens_after_an_hour() {
		let order = delivered_order("ord-1", "rest-1");
		let storage = seed(&order).await;
		let svc = service(storage, MockGateway::new());
		let delivered = order.delivered_at.unwrap();

		let err = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::FoodQuality,
				10.0,
				"cold".into(),
				delivered + Duration::minutes(30),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, SettlementError::WindowClosed(_)));

		let complaint = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::FoodQuality,
				10.0,
				"cold".into(),
				delivered + Duration::hours(2),
			)
			.await
			.unwrap();
		assert_eq!(complaint.status, ComplaintStatus::Pending);
		assert_eq!(complaint.priority, ComplaintPriority::Normal);
	}

	#[tokio::test]
	async fn filing_window_closes_after_48_hours() {
		let order = delivered_order("ord-1", "rest-1");
		let storage = seed(&order).await;
		let svc = service(storage, MockGateway::new());
		let err = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::DeliveryIssue,
				10.0,
				"late".into(),
				order.delivered_at.unwrap() + Duration::hours(49),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, SettlementError::WindowClosed(_)));
	}

	#[tokio::test]
	async fn filing_requires_delivered_order() {
		let mut order = delivered_order("ord-1", "rest-1");
		order.status = OrderStatus::Claimed;
		order.delivered_at = None;
		let storage = seed(&order).await;
		let svc = service(storage, MockGateway::new());
		let err = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::MissingItems,
				5.0,
				"missing".into(),
				Utc::now(),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, SettlementError::OrderNotDelivered));
	}

	#[tokio::test]
	async fn requested_amount_is_bounded_by_order_total() {
		let order = delivered_order("ord-1", "rest-1");
		let when = order.delivered_at.unwrap() + Duration::hours(2);
		let storage = seed(&order).await;
		let svc = service(storage, MockGateway::new());
		for amount in [0.0, -3.0, 99.0] {
			let err = svc
				.file_complaint(
					"ord-1",
					"cust-1",
					ComplaintKind::WrongOrder,
					amount,
					"bad".into(),
					when,
				)
				.await
				.unwrap_err();
			assert!(matches!(err, SettlementError::InvalidAmount(_)));
		}
	}

	#[tokio::test]
	async fn one_open_complaint_per_order() {
		let order = delivered_order("ord-1", "rest-1");
		let when = order.delivered_at.unwrap() + Duration::hours(2);
		let storage = seed(&order).await;
		let svc = service(storage, MockGateway::new());
		svc.file_complaint(
			"ord-1",
			"cust-1",
			ComplaintKind::FoodQuality,
			10.0,
			"cold".into(),
			when,
		)
		.await
		.unwrap();
		let err = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::FoodQuality,
				10.0,
				"still cold".into(),
				when,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, SettlementError::DuplicateComplaint(_)));
	}

	#[tokio::test]
	async fn approval_refunds_cancels_and_marks_refunded() {
		let order = delivered_order("ord-1", "rest-1");
		let when = order.delivered_at.unwrap() + Duration::hours(2);
		let storage = seed(&order).await;
		let gateway = MockGateway::new();
		let svc = service(storage.clone(), gateway.clone());
		let complaint = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::FoodQuality,
				20.0,
				"cold".into(),
				when,
			)
			.await
			.unwrap();

		let (resolved, refund) = svc
			.resolve_complaint(
				&complaint.id,
				ComplaintDecision::Approve,
				"agreed".into(),
				None,
				when + Duration::hours(1),
			)
			.await
			.unwrap();
		// Full subtotal requested, so the delivery fee rides along.
		let refund = refund.unwrap();
		assert_eq!(refund.amount, 23.5);
		assert_eq!(resolved.status, ComplaintStatus::Approved);
		assert_eq!(resolved.final_amount, Some(23.5));

		let updated: Order = storage
			.retrieve(StorageKey::Orders.as_str(), "ord-1")
			.await
			.unwrap();
		assert_eq!(updated.status, OrderStatus::Cancelled);
		assert_eq!(updated.payment_status, PaymentStatus::Refunded);
		assert_eq!(updated.refund_amount, Some(23.5));
		assert_eq!(updated.refund_reference.as_deref(), Some(refund.reference.as_str()));
		assert_eq!(gateway.refunds.lock().unwrap().len(), 1);

		let mirrored: PaymentLedgerRow = storage
			.retrieve(StorageKey::Payments.as_str(), "ord-1")
			.await
			.unwrap();
		assert_eq!(mirrored.status, "refunded");
	}

	#[tokio::test]
	async fn rejection_leaves_order_untouched() {
		let order = delivered_order("ord-1", "rest-1");
		let when = order.delivered_at.unwrap() + Duration::hours(2);
		let storage = seed(&order).await;
		let gateway = MockGateway::new();
		let svc = service(storage.clone(), gateway.clone());
		let complaint = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::Other,
				10.0,
				"meh".into(),
				when,
			)
			.await
			.unwrap();
		let (resolved, refund) = svc
			.resolve_complaint(
				&complaint.id,
				ComplaintDecision::Reject,
				"no grounds".into(),
				None,
				when,
			)
			.await
			.unwrap();
		assert!(refund.is_none());
		assert_eq!(resolved.status, ComplaintStatus::Rejected);
		assert_eq!(resolved.admin_response.as_deref(), Some("no grounds"));
		let updated: Order = storage
			.retrieve(StorageKey::Orders.as_str(), "ord-1")
			.await
			.unwrap();
		assert_eq!(updated.status, OrderStatus::Delivered);
		assert!(gateway.refunds.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn complaint_resolves_exactly_once() {
		let order = delivered_order("ord-1", "rest-1");
		let when = order.delivered_at.unwrap() + Duration::hours(2);
		let storage = seed(&order).await;
		let svc = service(storage, MockGateway::new());
		let complaint = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::FoodQuality,
				10.0,
				"cold".into(),
				when,
			)
			.await
			.unwrap();
		svc.resolve_complaint(
			&complaint.id,
			ComplaintDecision::Reject,
			"no".into(),
			None,
			when,
		)
		.await
		.unwrap();
		let err = svc
			.resolve_complaint(
				&complaint.id,
				ComplaintDecision::Approve,
				"changed my mind".into(),
				None,
				when,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, SettlementError::AlreadyResolved));
	}

	#[tokio::test]
	async fn approval_reuses_refund_already_at_the_processor() {
		let order = delivered_order("ord-1", "rest-1");
		let when = order.delivered_at.unwrap() + Duration::hours(2);
		let storage = seed(&order).await;
		let gateway = MockGateway::new();
		*gateway.existing.lock().unwrap() = Some(RefundRecord {
			reference: "re_prior".into(),
			amount: 23.5,
		});
		let svc = service(storage, gateway.clone());
		let complaint = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::FoodQuality,
				20.0,
				"cold".into(),
				when,
			)
			.await
			.unwrap();
		let (_, refund) = svc
			.resolve_complaint(
				&complaint.id,
				ComplaintDecision::Approve,
				"agreed".into(),
				None,
				when,
			)
			.await
			.unwrap();
		let refund = refund.unwrap();
		assert_eq!(refund.reference, "re_prior");
		// No second refund was created.
		assert!(gateway.refunds.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn approval_is_blocked_when_order_left_delivered() {
		let order = delivered_order("ord-1", "rest-1");
		let when = order.delivered_at.unwrap() + Duration::hours(2);
		let storage = seed(&order).await;
		let gateway = MockGateway::new();
		let svc = service(storage.clone(), gateway.clone());
		let complaint = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::FoodQuality,
				20.0,
				"cold".into(),
				when,
			)
			.await
			.unwrap();

		// Admin cancels the order after the complaint was filed.
		let mut cancelled = order.clone();
		cancelled.status = OrderStatus::Cancelled;
		storage
			.store(StorageKey::Orders.as_str(), "ord-1", &cancelled)
			.await
			.unwrap();

		let err = svc
			.resolve_complaint(
				&complaint.id,
				ComplaintDecision::Approve,
				"agreed".into(),
				None,
				when,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, SettlementError::OrderNotDelivered));

		let pending: Complaint = storage
			.retrieve(StorageKey::Complaints.as_str(), &complaint.id)
			.await
			.unwrap();
		assert_eq!(pending.status, ComplaintStatus::Pending);
		let untouched: Order = storage
			.retrieve(StorageKey::Orders.as_str(), "ord-1")
			.await
			.unwrap();
		assert!(untouched.refund_amount.is_none());
		assert!(gateway.refunds.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn rerun_completes_resolution_after_crash_between_order_and_complaint() {
		let order = delivered_order("ord-1", "rest-1");
		let when = order.delivered_at.unwrap() + Duration::hours(2);
		let storage = seed(&order).await;
		let gateway = MockGateway::new();
		let svc = service(storage.clone(), gateway.clone());
		let complaint = svc
			.file_complaint(
				"ord-1",
				"cust-1",
				ComplaintKind::FoodQuality,
				20.0,
				"cold".into(),
				when,
			)
			.await
			.unwrap();

		// A previous resolution attempt died after writing the refund to
		// the order rows but before flipping the complaint.
		let mut refunded = order.clone();
		refunded.status = OrderStatus::Cancelled;
		refunded.payment_status = PaymentStatus::Refunded;
		refunded.refund_amount = Some(23.5);
		refunded.refund_reference = Some("re_prior".into());
		storage
			.store(StorageKey::Orders.as_str(), "ord-1", &refunded)
			.await
			.unwrap();
		*gateway.existing.lock().unwrap() = Some(RefundRecord {
			reference: "re_prior".into(),
			amount: 23.5,
		});

		let (resolved, refund) = svc
			.resolve_complaint(
				&complaint.id,
				ComplaintDecision::Approve,
				"agreed".into(),
				None,
				when,
			)
			.await
			.unwrap();
		let refund = refund.unwrap();
		assert_eq!(refund.reference, "re_prior");
		assert_eq!(resolved.status, ComplaintStatus::Approved);
		assert_eq!(resolved.final_amount, Some(23.5));
		// No second refund reached the processor.
		assert!(gateway.refunds.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn dispute_bypasses_window_and_is_high_priority() {
		let order = delivered_order("ord-1", "rest-1");
		let storage = seed(&order).await;
		let svc = service(storage, MockGateway::new());
		// 10 minutes after delivery, inside the normally-closed window.
		let complaint = svc
			.open_dispute(
				"ord-1",
				23.5,
				"chargeback".into(),
				order.delivered_at.unwrap() + Duration::minutes(10),
			)
			.await
			.unwrap();
		assert_eq!(complaint.priority, ComplaintPriority::High);
		assert_eq!(complaint.status, ComplaintStatus::Pending);
		assert_eq!(complaint.customer_id, "cust-1");
	}
}
