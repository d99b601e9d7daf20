//! HTTP server for the marketplace API.
//!
//! Builds the router, carries the shared state and resolves bearer tokens
//! to actors. Endpoint handlers live in [`crate::apis`].

use crate::apis::{dispatch, orders, settlement, webhooks};
use axum::{
	http::{header, HeaderMap},
	routing::{get, post},
	Router,
};
use oms_config::ApiConfig;
use oms_core::Engine;
use oms_types::{ApiError, AuthInterface};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine handling every operation.
	pub engine: Arc<Engine>,
	/// Auth collaborator resolving bearer tokens.
	pub auth: Arc<dyn AuthInterface>,
}

/// Resolves the bearer token in the Authorization header to an actor.
pub async fn authenticate(
	state: &AppState,
	headers: &HeaderMap,
) -> Result<oms_types::Actor, ApiError> {
	let token = headers
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.ok_or_else(|| ApiError::Unauthorized {
			message: "missing bearer token".to_string(),
		})?;
	state
		.auth
		.verify(token)
		.await
		.map_err(|e| ApiError::Unauthorized {
			message: e.to_string(),
		})
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(orders::create_order).get(orders::list_orders))
				.route("/orders/{id}", get(orders::get_order))
				.route("/orders/{id}/accept", post(orders::accept_order))
				.route("/orders/{id}/reject", post(orders::reject_order))
				.route("/orders/{id}/ready", post(orders::mark_ready))
				.route("/orders/{id}/cancel", post(orders::cancel_order))
				.route("/orders/{id}/claim", post(dispatch::claim_order))
				.route("/orders/{id}/complete", post(dispatch::complete_delivery))
				.route("/dispatch/available", get(dispatch::available_orders))
				.route("/dispatch/current", get(dispatch::current_order))
				.route("/dispatch/alerts", get(dispatch::alerts))
				.route(
					"/complaints",
					post(settlement::file_complaint).get(settlement::list_complaints),
				)
				.route(
					"/complaints/{id}/resolve",
					post(settlement::resolve_complaint),
				)
				.route(
					"/restaurants/{id}/payouts",
					get(settlement::payout_summary),
				)
				.route(
					"/restaurants/{id}/transfers",
					post(settlement::record_transfer),
				)
				.route("/webhooks/payments", post(webhooks::payment_webhook)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Starts the HTTP server and serves until the task is cancelled.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<Engine>,
	auth: Arc<dyn AuthInterface>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { engine, auth });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("Marketplace API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}
