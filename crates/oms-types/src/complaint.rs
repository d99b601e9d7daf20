//! Complaint types for the post-delivery dispute workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A customer complaint against a delivered order.
///
/// At most one open complaint may exist per order. A complaint is resolved
/// exactly once by an admin; approval triggers the refund reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
	/// Unique identifier for this complaint.
	pub id: String,
	/// Order this complaint disputes.
	pub order_id: String,
	/// Customer who filed the complaint.
	pub customer_id: String,
	/// Category of the dispute.
	pub kind: ComplaintKind,
	/// Refund amount requested by the customer.
	pub requested_amount: f64,
	/// Free-form description supplied at filing time.
	pub description: String,
	/// Resolution state. Monotonic: never leaves Approved or Rejected.
	pub status: ComplaintStatus,
	/// Triage priority. Disputes raised by the payment network are High.
	pub priority: ComplaintPriority,
	/// Admin response recorded at resolution.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub admin_response: Option<String>,
	/// Final refund amount decided by the admin, may differ from requested.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub final_amount: Option<f64>,
	/// Timestamp when the complaint was filed.
	pub filed_at: DateTime<Utc>,
	/// Timestamp when the complaint was resolved.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolved_at: Option<DateTime<Utc>>,
}

/// Category of a customer complaint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintKind {
	FoodQuality,
	DeliveryIssue,
	MissingItems,
	WrongOrder,
	Other,
}

/// Resolution state of a complaint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ComplaintStatus {
	/// Awaiting an admin decision.
	Pending,
	/// Approved; the refund reconciler ran.
	Approved,
	/// Rejected with an admin response.
	Rejected,
}

impl ComplaintStatus {
	/// True once an admin decision has been recorded.
	pub fn is_resolved(&self) -> bool {
		!matches!(self, ComplaintStatus::Pending)
	}
}

impl fmt::Display for ComplaintStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ComplaintStatus::Pending => write!(f, "Pending"),
			ComplaintStatus::Approved => write!(f, "Approved"),
			ComplaintStatus::Rejected => write!(f, "Rejected"),
		}
	}
}

/// Triage priority of a complaint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ComplaintPriority {
	Normal,
	High,
}

/// Admin decision on a complaint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ComplaintDecision {
	Approve,
	Reject,
}
