//! Payment collaborator webhook endpoint.
//!
//! The processor reports charge outcomes here. Calls are authenticated with
//! the same bearer tokens as the rest of the API and must resolve to an
//! admin actor, standing in for processor signature verification.

use crate::apis::map_engine_error;
use crate::server::{authenticate, AppState};
use axum::{extract::State, http::HeaderMap, response::Json};
use oms_types::{ApiError, Role};
use serde::Deserialize;

/// Payment event kinds delivered by the processor.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentEvent {
	Captured,
	Failed,
	Disputed,
}

/// Body for POST /api/webhooks/payments.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
	pub order_id: String,
	pub event: PaymentEvent,
	#[serde(default)]
	pub reference: Option<String>,
	#[serde(default)]
	pub amount: Option<f64>,
	#[serde(default)]
	pub reason: Option<String>,
}

/// Handles POST /api/webhooks/payments.
pub async fn payment_webhook(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(webhook): Json<PaymentWebhook>,
) -> Result<Json<serde_json::Value>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	if actor.role != Role::Admin {
		return Err(ApiError::Forbidden {
			message: "payment webhooks require an admin token".to_string(),
		});
	}
	tracing::info!(order_id = %webhook.order_id, event = ?webhook.event, "Payment webhook received");
	match webhook.event {
		PaymentEvent::Captured => {
			let reference = webhook.reference.ok_or_else(|| ApiError::BadRequest {
				error_type: "validation".to_string(),
				message: "captured events require a payment reference".to_string(),
			})?;
			state
				.engine
				.payment_captured(&webhook.order_id, reference)
				.await
				.map_err(map_engine_error)?;
		}
		PaymentEvent::Failed => {
			state
				.engine
				.payment_failed(&webhook.order_id)
				.await
				.map_err(map_engine_error)?;
		}
		PaymentEvent::Disputed => {
			state
				.engine
				.payment_disputed(
					&webhook.order_id,
					webhook.amount.unwrap_or(0.0),
					webhook.reason.unwrap_or_else(|| "payment dispute".to_string()),
				)
				.await
				.map_err(map_engine_error)?;
		}
	}
	Ok(Json(serde_json::json!({ "status": "ok" })))
}
