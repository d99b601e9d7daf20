//! Restaurant payout ledger types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A manually recorded payout transfer to a restaurant.
///
/// Transfers are append-only; the reconciler computes the remaining amount
/// owed as computed revenue minus the sum of completed transfers, floored
/// at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
	/// Unique identifier for this transfer.
	pub id: String,
	/// Restaurant receiving the payout.
	pub restaurant_id: String,
	/// Amount transferred.
	pub amount: f64,
	/// Timestamp when the transfer was recorded.
	pub recorded_at: DateTime<Utc>,
	/// Bank or processor reference number, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reference: Option<String>,
	/// Human-readable period this transfer covers (e.g. "2026-07").
	#[serde(skip_serializing_if = "Option::is_none")]
	pub period: Option<String>,
	/// Transfer state. Only completed transfers are recorded.
	pub status: TransferStatus,
}

/// State of a payout transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferStatus {
	Completed,
}

/// Payout reconciliation summary for one restaurant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutSummary {
	/// Restaurant the summary covers.
	pub restaurant_id: String,
	/// Revenue owed after commission, over delivered and paid orders.
	pub owed: f64,
	/// Sum of completed transfer amounts.
	pub transferred: f64,
	/// Remaining to pay, floored at zero.
	pub remaining: f64,
	/// Commission rate applied.
	pub commission_rate: f64,
	/// Transfer history, most recent first.
	pub transfers: Vec<Transfer>,
}
