//! Order intake and lifecycle endpoints.

use crate::apis::map_engine_error;
use crate::server::{authenticate, AppState};
use axum::{
	extract::{Path, State},
	http::{HeaderMap, StatusCode},
	response::Json,
};
use oms_core::CreateOrderRequest;
use oms_types::{ApiError, Order};
use serde::Deserialize;

/// Body for POST /api/orders/{id}/accept.
#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
	pub prep_minutes: u32,
}

/// Body for POST /api/orders/{id}/cancel.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
	#[serde(default)]
	pub reason: Option<String>,
}

/// Handles POST /api/orders.
pub async fn create_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let order = state
		.engine
		.create_order(&actor, request)
		.await
		.map_err(map_engine_error)?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /api/orders.
pub async fn list_orders(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Vec<Order>>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let orders = state
		.engine
		.list_orders(&actor)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(orders))
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let order = state
		.engine
		.get_order(&actor, &id)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/accept.
pub async fn accept_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
	Json(request): Json<AcceptRequest>,
) -> Result<Json<Order>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let order = state
		.engine
		.accept_order(&actor, &id, request.prep_minutes)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/reject.
pub async fn reject_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let order = state
		.engine
		.reject_order(&actor, &id)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/ready.
pub async fn mark_ready(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let order = state
		.engine
		.mark_ready(&actor, &id)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/cancel.
pub async fn cancel_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
	Json(request): Json<CancelRequest>,
) -> Result<Json<Order>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let reason = request
		.reason
		.unwrap_or_else(|| "cancelled by user".to_string());
	let order = state
		.engine
		.cancel_order(&actor, &id, reason)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(order))
}
