//! Adapters for the external collaborators: notifications and payments.
//!
//! Two implementations of each port: an HTTP one for real deployments and a
//! log-only fallback so the service runs without any external systems
//! configured.

use async_trait::async_trait;
use oms_config::PaymentsConfig;
use oms_settlement::{PaymentError, PaymentGateway, RefundRecord};
use oms_types::{NotificationKind, Notifier, NotifyError};
use serde::Deserialize;
use uuid::Uuid;

/// Notifier that only logs. Used when no webhook URL is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
	async fn notify(
		&self,
		recipient: &str,
		kind: NotificationKind,
		data: serde_json::Value,
	) -> Result<(), NotifyError> {
		tracing::info!(recipient = %recipient, kind = ?kind, data = %data, "Notification");
		Ok(())
	}
}

/// Notifier that posts each notification to a webhook as JSON.
pub struct WebhookNotifier {
	client: reqwest::Client,
	url: String,
}

impl WebhookNotifier {
	pub fn new(client: reqwest::Client, url: String) -> Self {
		Self { client, url }
	}
}

#[async_trait]
impl Notifier for WebhookNotifier {
	async fn notify(
		&self,
		recipient: &str,
		kind: NotificationKind,
		data: serde_json::Value,
	) -> Result<(), NotifyError> {
		let body = serde_json::json!({
			"recipient": recipient,
			"kind": kind,
			"data": data,
		});
		let response = self
			.client
			.post(&self.url)
			.json(&body)
			.send()
			.await
			.map_err(|e| NotifyError::Delivery(e.to_string()))?;
		if !response.status().is_success() {
			return Err(NotifyError::Delivery(format!(
				"webhook returned {}",
				response.status()
			)));
		}
		Ok(())
	}
}

/// Gateway used when no payment processor is configured: refunds are logged
/// with a locally generated reference and handled manually by operations.
pub struct ManualPaymentGateway;

#[async_trait]
impl PaymentGateway for ManualPaymentGateway {
	async fn create_refund(
		&self,
		payment_reference: &str,
		amount: f64,
		metadata: serde_json::Value,
	) -> Result<String, PaymentError> {
		let reference = format!("manual-{}", Uuid::new_v4());
		tracing::warn!(
			payment_reference = %payment_reference,
			amount = amount,
			reference = %reference,
			metadata = %metadata,
			"No payment processor configured; refund requires manual processing"
		);
		Ok(reference)
	}

	async fn find_refund(&self, _order_id: &str) -> Result<Option<RefundRecord>, PaymentError> {
		Ok(None)
	}
}

/// Gateway backed by the payment processor's HTTP refund API.
pub struct HttpPaymentGateway {
	client: reqwest::Client,
	endpoint: String,
	api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
	reference: String,
	#[serde(default)]
	amount: Option<f64>,
}

impl HttpPaymentGateway {
	pub fn new(client: reqwest::Client, config: &PaymentsConfig) -> Self {
		Self {
			client,
			endpoint: config.endpoint.trim_end_matches('/').to_string(),
			api_key: config.api_key.clone(),
		}
	}

	fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		match &self.api_key {
			Some(key) => builder.bearer_auth(key),
			None => builder,
		}
	}
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
	async fn create_refund(
		&self,
		payment_reference: &str,
		amount: f64,
		metadata: serde_json::Value,
	) -> Result<String, PaymentError> {
		let body = serde_json::json!({
			"payment_reference": payment_reference,
			"amount": amount,
			"metadata": metadata,
		});
		let response = self
			.request(self.client.post(format!("{}/refunds", self.endpoint)))
			.json(&body)
			.send()
			.await
			.map_err(|e| PaymentError::Unavailable(e.to_string()))?;
		let status = response.status();
		if status.is_client_error() {
			let message = response.text().await.unwrap_or_default();
			return Err(PaymentError::Rejected(format!("{}: {}", status, message)));
		}
		if !status.is_success() {
			return Err(PaymentError::Unavailable(format!(
				"processor returned {}",
				status
			)));
		}
		let refund: RefundResponse = response
			.json()
			.await
			.map_err(|e| PaymentError::Unavailable(e.to_string()))?;
		Ok(refund.reference)
	}

	async fn find_refund(&self, order_id: &str) -> Result<Option<RefundRecord>, PaymentError> {
		let response = self
			.request(
				self.client
					.get(format!("{}/refunds", self.endpoint))
					.query(&[("order_id", order_id)]),
			)
			.send()
			.await
			.map_err(|e| PaymentError::Unavailable(e.to_string()))?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(None);
		}
		if !response.status().is_success() {
			return Err(PaymentError::Unavailable(format!(
				"processor returned {}",
				response.status()
			)));
		}
		let refunds: Vec<RefundResponse> = response
			.json()
			.await
			.map_err(|e| PaymentError::Unavailable(e.to_string()))?;
		Ok(refunds.into_iter().next().map(|r| RefundRecord {
			amount: r.amount.unwrap_or(0.0),
			reference: r.reference,
		}))
	}
}
