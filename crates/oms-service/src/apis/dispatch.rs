//! Courier-facing endpoints: claim, handoff and the pickup feeds.

use crate::apis::map_engine_error;
use crate::server::{authenticate, AppState};
use axum::{
	extract::{Path, State},
	http::HeaderMap,
	response::Json,
};
use oms_lifecycle::{ImminentAlert, PreventiveAlert};
use oms_types::{ApiError, Order};
use serde::{Deserialize, Serialize};

/// Body for POST /api/orders/{id}/complete.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
	pub security_code: String,
}

/// Response for GET /api/dispatch/alerts.
#[derive(Debug, Serialize)]
pub struct AlertsResponse {
	pub preventive: Vec<PreventiveAlert>,
	pub imminent: Vec<ImminentAlert>,
}

/// Handles POST /api/orders/{id}/claim.
pub async fn claim_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let order = state
		.engine
		.claim_order(&actor, &id)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/complete.
pub async fn complete_delivery(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
	Json(request): Json<CompleteRequest>,
) -> Result<Json<Order>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let order = state
		.engine
		.complete_delivery(&actor, &id, &request.security_code)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(order))
}

/// Handles GET /api/dispatch/available.
pub async fn available_orders(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Vec<Order>>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let orders = state
		.engine
		.available_orders(&actor)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(orders))
}

/// Handles GET /api/dispatch/current.
pub async fn current_order(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Option<Order>>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let order = state
		.engine
		.current_order(&actor)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(order))
}

/// Handles GET /api/dispatch/alerts.
pub async fn alerts(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<AlertsResponse>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let preventive = state
		.engine
		.preventive_alerts(&actor)
		.await
		.map_err(map_engine_error)?;
	let imminent = state
		.engine
		.imminent_alerts(&actor)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(AlertsResponse {
		preventive,
		imminent,
	}))
}
