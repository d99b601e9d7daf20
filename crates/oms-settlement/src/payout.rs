//! Restaurant payout reconciliation.
//!
//! Revenue owed is computed on the fly from delivered, paid orders minus the
//! marketplace commission; transfers are an append-only ledger recorded by
//! an admin, and the remaining amount is the difference floored at zero.

use crate::{SettlementError, SettlementService};
use chrono::{DateTime, Utc};
use oms_storage::MutateError;
use oms_types::{
	round_cents, Order, OrderStatus, PaymentStatus, PayoutSummary, StorageKey, Transfer,
	TransferStatus,
};
use tracing::{info, warn};
use uuid::Uuid;

impl SettlementService {
	/// Commission rate applied to a restaurant's revenue. The marketplace's
	/// own kitchen, when configured, keeps the full amount.
	fn commission_for(&self, restaurant_id: &str) -> f64 {
		match &self.internal_restaurant_id {
			Some(internal) if internal == restaurant_id => 0.0,
			_ => self.commission_rate,
		}
	}

	/// Computes the payout summary for one restaurant.
	pub async fn payout_summary(
		&self,
		restaurant_id: &str,
	) -> Result<PayoutSummary, SettlementError> {
		let orders: Vec<Order> = self.storage.list(StorageKey::Orders.as_str()).await?;
		let revenue: f64 = orders
			.iter()
			.filter(|o| {
				o.restaurant_id == restaurant_id
					&& o.status == OrderStatus::Delivered
					&& o.payment_status == PaymentStatus::Paid
			})
			.map(|o| o.total)
			.sum();
		let rate = self.commission_for(restaurant_id);
		let owed = round_cents(revenue * (1.0 - rate));

		let mut transfers: Vec<Transfer> = self
			.storage
			.list::<Transfer>(StorageKey::Transfers.as_str())
			.await?
			.into_iter()
			.filter(|t| t.restaurant_id == restaurant_id)
			.collect();
		transfers.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
		let transferred = round_cents(transfers.iter().map(|t| t.amount).sum());
		let remaining = round_cents((owed - transferred).max(0.0));

		Ok(PayoutSummary {
			restaurant_id: restaurant_id.to_string(),
			owed,
			transferred,
			remaining,
			commission_rate: rate,
			transfers,
		})
	}

	/// Records a completed payout transfer to a restaurant.
	///
	/// The ledger is append-only; corrections are new entries, never edits.
	/// Delivered orders not yet covered by a payout are stamped with the
	/// transfer time, best-effort.
	pub async fn record_transfer(
		&self,
		restaurant_id: &str,
		amount: f64,
		reference: Option<String>,
		period: Option<String>,
		now: DateTime<Utc>,
	) -> Result<Transfer, SettlementError> {
		if amount <= 0.0 {
			return Err(SettlementError::InvalidAmount(
				"transfer amount must be positive".to_string(),
			));
		}
		let transfer = Transfer {
			id: Uuid::new_v4().to_string(),
			restaurant_id: restaurant_id.to_string(),
			amount,
			recorded_at: now,
			reference,
			period,
			status: TransferStatus::Completed,
		};
		self.storage
			.store_new(StorageKey::Transfers.as_str(), &transfer.id, &transfer)
			.await?;
		info!(
			transfer_id = %transfer.id,
			restaurant_id = %restaurant_id,
			amount = amount,
			"Payout transfer recorded"
		);
		self.stamp_paid_orders(restaurant_id, now).await;
		Ok(transfer)
	}

	/// Marks the restaurant's delivered-and-unstamped orders as paid out.
	/// Failures are logged; the transfer ledger already holds the truth.
	async fn stamp_paid_orders(&self, restaurant_id: &str, now: DateTime<Utc>) {
		let orders: Vec<Order> = match self.storage.list(StorageKey::Orders.as_str()).await {
			Ok(orders) => orders,
			Err(e) => {
				warn!(error = %e, "Failed to list orders while stamping payout");
				return;
			}
		};
		for order in orders.iter().filter(|o| {
			o.restaurant_id == restaurant_id
				&& o.status == OrderStatus::Delivered
				&& o.restaurant_paid_at.is_none()
		}) {
			let result = self
				.storage
				.mutate::<Order, SettlementError, _>(
					StorageKey::Orders.as_str(),
					&order.id,
					|row| {
						if row.restaurant_paid_at.is_none() {
							row.restaurant_paid_at = Some(now);
						}
						Ok(())
					},
				)
				.await;
			if let Err(MutateError::Storage(e)) = result {
				warn!(order_id = %order.id, error = %e, "Failed to stamp order as paid out");
			}
		}
	}
}
