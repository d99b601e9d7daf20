//! Notification collaborator port.
//!
//! Notifications are fire-and-forget: failures are logged by callers and
//! never block or roll back the transition they are attached to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of notification sent to a marketplace user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
	OrderAccepted,
	OrderRejected,
	OrderReady,
	OrderClaimed,
	OrderDelivered,
	OrderCancelled,
	RefundIssued,
	ComplaintResolved,
}

/// Errors returned by the notification collaborator.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// Delivery to the notification channel failed.
	#[error("Notification delivery failed: {0}")]
	Delivery(String),
}

/// External notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
	/// Sends a notification to the given recipient.
	async fn notify(
		&self,
		recipient: &str,
		kind: NotificationKind,
		data: serde_json::Value,
	) -> Result<(), NotifyError>;
}
