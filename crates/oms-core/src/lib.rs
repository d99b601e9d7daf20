//! Core engine for the marketplace order system.
//!
//! This crate wires the lifecycle state machine, the claim coordinator, the
//! settlement service and the external collaborators into a single
//! [`Engine`], built through the factory-based [`EngineBuilder`]. The
//! engine enforces per-actor authorization on every operation and publishes
//! [`oms_types::MarketEvent`]s on its event bus as state changes.

pub mod builder;
pub mod engine;
pub mod event_bus;

pub use builder::EngineBuilder;
pub use engine::{CreateOrderRequest, Engine, EngineError};
pub use event_bus::EventBus;

#[cfg(test)]
mod tests {
	use crate::builder::EngineBuilder;
	use crate::engine::{CreateOrderRequest, Engine, EngineError};
	use async_trait::async_trait;
	use oms_config::Config;
	use oms_settlement::{PaymentError, PaymentGateway, RefundRecord};
	use oms_types::{
		Actor, ComplaintDecision, ComplaintKind, ComplaintStatus, LineItem, NotificationKind,
		Notifier, NotifyError, OrderStatus, PaymentStatus, Role,
	};
	use std::sync::{Arc, Mutex};

	struct RecordingNotifier {
		sent: Mutex<Vec<(String, NotificationKind)>>,
	}

	impl RecordingNotifier {
		fn new() -> Arc<Self> {
			Arc::new(Self {
				sent: Mutex::new(Vec::new()),
			})
		}
	}

	#[async_trait]
	impl Notifier for RecordingNotifier {
		async fn notify(
			&self,
			recipient: &str,
			kind: NotificationKind,
			_data: serde_json::Value,
		) -> Result<(), NotifyError> {
			self.sent
				.lock()
				.unwrap()
				.push((recipient.to_string(), kind));
			Ok(())
		}
	}

	struct RecordingGateway {
		refunds: Mutex<Vec<f64>>,
	}

	impl RecordingGateway {
		fn new() -> Arc<Self> {
			Arc::new(Self {
				refunds: Mutex::new(Vec::new()),
			})
		}
	}

	#[async_trait]
	impl PaymentGateway for RecordingGateway {
		async fn create_refund(
			&self,
			_payment_reference: &str,
			amount: f64,
			_metadata: serde_json::Value,
		) -> Result<String, PaymentError> {
			let mut refunds = self.refunds.lock().unwrap();
			refunds.push(amount);
			Ok(format!("re_{}", refunds.len()))
		}

		async fn find_refund(
			&self,
			_order_id: &str,
		) -> Result<Option<RefundRecord>, PaymentError> {
			Ok(None)
		}
	}

	fn test_config() -> Config {
		Config::from_toml_str(
			r#"
			[marketplace]
			id = "oms-test"

			[storage]
			primary = "memory"

			[storage.implementations.memory]
			"#,
		)
		.unwrap()
	}

	fn build_engine(notifier: Arc<RecordingNotifier>, gateway: Arc<RecordingGateway>) -> Engine {
		EngineBuilder::new(test_config())
			.with_storage_factory("memory", oms_storage::implementations::memory::create_storage)
			.with_notifier(notifier)
			.with_payment_gateway(gateway)
			.build()
			.unwrap()
	}

	fn customer() -> Actor {
		Actor::new("cust-1", Role::Customer)
	}

	fn restaurant() -> Actor {
		Actor::new("rest-1", Role::Restaurant)
	}

	fn order_request() -> CreateOrderRequest {
		CreateOrderRequest {
			restaurant_id: "rest-1".into(),
			restaurant_name: "Thai Corner".into(),
			restaurant_address: "12 Noodle St".into(),
			items: vec![LineItem::Single {
				name: "Pad Thai".into(),
				quantity: 2,
				unit_price: 10.0,
			}],
			delivery_fee: 3.5,
		}
	}

	#[tokio::test]
	async fn full_lifecycle_from_intake_to_delivery() {
		let notifier = RecordingNotifier::new();
		let engine = build_engine(notifier.clone(), RecordingGateway::new());

		// Intake: pending, four-digit code, totals computed from the items.
		let order = engine.create_order(&customer(), order_request()).await.unwrap();
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.total, 23.5);
		assert_eq!(order.subtotal(), 20.0);
		let code = order.security_code.clone().unwrap();
		assert_eq!(code.len(), 4);

		engine
			.payment_captured(&order.id, "pay_123".into())
			.await
			.unwrap();

		let accepted = engine
			.accept_order(&restaurant(), &order.id, 20)
			.await
			.unwrap();
		assert_eq!(accepted.status, OrderStatus::Preparing);
		assert_eq!(accepted.prep_minutes, Some(20));

		let ready = engine.mark_ready(&restaurant(), &order.id).await.unwrap();
		assert_eq!(ready.status, OrderStatus::Ready);

		// Two couriers race for the claim; exactly one wins.
		let a = tokio::spawn({
			let engine = engine.clone();
			let id = order.id.clone();
			async move {
				engine
					.claim_order(&Actor::new("courier-a", Role::Courier), &id)
					.await
			}
		});
		let b = tokio::spawn({
			let engine = engine.clone();
			let id = order.id.clone();
			async move {
				engine
					.claim_order(&Actor::new("courier-b", Role::Courier), &id)
					.await
			}
		});
		let results = [a.await.unwrap(), b.await.unwrap()];
		let winners = results.iter().filter(|r| r.is_ok()).count();
		assert_eq!(winners, 1);
		let winner_id = results
			.iter()
			.find_map(|r| r.as_ref().ok())
			.and_then(|o| o.courier_id.clone())
			.unwrap();
		let winner = Actor::new(winner_id, Role::Courier);

		// Wrong code is rejected without changing the order.
		let wrong = if code == "0000" { "1111" } else { "0000" };
		let err = engine
			.complete_delivery(&winner, &order.id, wrong)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			EngineError::Dispatch(oms_dispatch::DispatchError::CodeMismatch)
		));

		let delivered = engine
			.complete_delivery(&winner, &order.id, &code)
			.await
			.unwrap();
		assert_eq!(delivered.status, OrderStatus::Delivered);
		assert!(delivered.delivered_at.is_some());

		// Customer was notified at each step.
		let kinds: Vec<NotificationKind> = notifier
			.sent
			.lock()
			.unwrap()
			.iter()
			.map(|(_, kind)| *kind)
			.collect();
		assert_eq!(
			kinds,
			vec![
				NotificationKind::OrderAccepted,
				NotificationKind::OrderReady,
				NotificationKind::OrderClaimed,
				NotificationKind::OrderDelivered,
			]
		);
	}

	#[tokio::test]
	async fn restaurant_operations_require_ownership() {
		let engine = build_engine(RecordingNotifier::new(), RecordingGateway::new());
		let order = engine.create_order(&customer(), order_request()).await.unwrap();

		let err = engine
			.accept_order(&customer(), &order.id, 20)
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::Unauthorized(_)));

		let other = Actor::new("rest-2", Role::Restaurant);
		let err = engine.accept_order(&other, &order.id, 20).await.unwrap_err();
		assert!(matches!(err, EngineError::Unauthorized(_)));
	}

	#[tokio::test]
	async fn customer_can_cancel_any_order_before_delivery() {
		let engine = build_engine(RecordingNotifier::new(), RecordingGateway::new());
		let order = engine.create_order(&customer(), order_request()).await.unwrap();
		engine
			.accept_order(&restaurant(), &order.id, 20)
			.await
			.unwrap();

		// Acceptance does not close the customer's cancellation window.
		let cancelled = engine
			.cancel_order(&customer(), &order.id, "changed my mind".into())
			.await
			.unwrap();
		assert_eq!(cancelled.status, OrderStatus::Cancelled);

		// Another customer is still rejected on someone else's order.
		let order = engine.create_order(&customer(), order_request()).await.unwrap();
		let stranger = Actor::new("cust-other", Role::Customer);
		let err = engine
			.cancel_order(&stranger, &order.id, "not mine".into())
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::Unauthorized(_)));

		// An admin can cancel any pre-delivery order.
		let admin = Actor::new("admin-1", Role::Admin);
		let cancelled = engine
			.cancel_order(&admin, &order.id, "restaurant closed".into())
			.await
			.unwrap();
		assert_eq!(cancelled.status, OrderStatus::Cancelled);
	}

	#[tokio::test]
	async fn payment_failure_cancels_pending_order() {
		let engine = build_engine(RecordingNotifier::new(), RecordingGateway::new());
		let order = engine.create_order(&customer(), order_request()).await.unwrap();
		let failed = engine.payment_failed(&order.id).await.unwrap();
		assert_eq!(failed.status, OrderStatus::Cancelled);
		assert_eq!(failed.payment_status, PaymentStatus::Failed);
	}

	#[tokio::test]
	async fn security_code_is_hidden_from_courier_views() {
		let engine = build_engine(RecordingNotifier::new(), RecordingGateway::new());
		let order = engine.create_order(&customer(), order_request()).await.unwrap();
		engine
			.accept_order(&restaurant(), &order.id, 20)
			.await
			.unwrap();
		let courier = Actor::new("courier-a", Role::Courier);
		let feed = engine.available_orders(&courier).await.unwrap();
		assert_eq!(feed.len(), 1);
		assert!(feed[0].security_code.is_none());

		// The customer still sees it.
		let own = engine.get_order(&customer(), &order.id).await.unwrap();
		assert!(own.security_code.is_some());
	}

	#[tokio::test]
	async fn complaint_flow_refunds_through_the_gateway() {
		let notifier = RecordingNotifier::new();
		let gateway = RecordingGateway::new();
		let engine = build_engine(notifier.clone(), gateway.clone());
		let order = engine.create_order(&customer(), order_request()).await.unwrap();
		engine
			.payment_captured(&order.id, "pay_123".into())
			.await
			.unwrap();
		engine
			.accept_order(&restaurant(), &order.id, 20)
			.await
			.unwrap();
		engine.mark_ready(&restaurant(), &order.id).await.unwrap();
		let courier = Actor::new("courier-a", Role::Courier);
		let claimed = engine.claim_order(&courier, &order.id).await.unwrap();
		assert_eq!(claimed.status, OrderStatus::Claimed);
		let code = engine
			.get_order(&customer(), &order.id)
			.await
			.unwrap()
			.security_code
			.unwrap();
		engine
			.complete_delivery(&courier, &order.id, &code)
			.await
			.unwrap();

		// Rewind the delivery time into the filing window.
		let rewound = engine
			.storage
			.mutate::<oms_types::Order, EngineError, _>(
				oms_types::StorageKey::Orders.as_str(),
				&order.id,
				|row| {
					row.delivered_at = row.delivered_at.map(|t| t - chrono::Duration::hours(2));
					Ok(())
				},
			)
			.await
			.unwrap();
		assert!(rewound.delivered_at.is_some());

		let complaint = engine
			.file_complaint(
				&customer(),
				&order.id,
				ComplaintKind::FoodQuality,
				20.0,
				"cold".into(),
			)
			.await
			.unwrap();

		let admin = Actor::new("admin-1", Role::Admin);
		let (resolved, refund) = engine
			.resolve_complaint(
				&admin,
				&complaint.id,
				ComplaintDecision::Approve,
				"agreed".into(),
				None,
			)
			.await
			.unwrap();
		assert_eq!(resolved.status, ComplaintStatus::Approved);
		// Full subtotal refund includes the delivery fee.
		assert_eq!(refund.unwrap().amount, 23.5);
		assert_eq!(*gateway.refunds.lock().unwrap(), vec![23.5]);
	}

	#[tokio::test]
	async fn build_fails_without_registered_storage_factory() {
		let result = EngineBuilder::new(test_config())
			.with_notifier(RecordingNotifier::new())
			.with_payment_gateway(RecordingGateway::new())
			.build();
		assert!(matches!(result, Err(EngineError::Config(_))));
	}
}
