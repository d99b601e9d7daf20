//! Complaint and payout endpoints.

use crate::apis::map_engine_error;
use crate::server::{authenticate, AppState};
use axum::{
	extract::{Path, State},
	http::{HeaderMap, StatusCode},
	response::Json,
};
use oms_types::{ApiError, Complaint, ComplaintDecision, ComplaintKind, PayoutSummary, Transfer};
use serde::{Deserialize, Serialize};

/// Body for POST /api/complaints.
#[derive(Debug, Deserialize)]
pub struct FileComplaintRequest {
	pub order_id: String,
	pub kind: ComplaintKind,
	pub requested_amount: f64,
	pub description: String,
}

/// Body for POST /api/complaints/{id}/resolve.
#[derive(Debug, Deserialize)]
pub struct ResolveComplaintRequest {
	pub decision: ComplaintDecision,
	pub admin_response: String,
	#[serde(default)]
	pub final_amount: Option<f64>,
}

/// Response for POST /api/complaints/{id}/resolve.
#[derive(Debug, Serialize)]
pub struct ResolveComplaintResponse {
	pub complaint: Complaint,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refund_amount: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refund_reference: Option<String>,
}

/// Body for POST /api/restaurants/{id}/transfers.
#[derive(Debug, Deserialize)]
pub struct RecordTransferRequest {
	pub amount: f64,
	#[serde(default)]
	pub reference: Option<String>,
	#[serde(default)]
	pub period: Option<String>,
}

/// Handles POST /api/complaints.
pub async fn file_complaint(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<FileComplaintRequest>,
) -> Result<(StatusCode, Json<Complaint>), ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let complaint = state
		.engine
		.file_complaint(
			&actor,
			&request.order_id,
			request.kind,
			request.requested_amount,
			request.description,
		)
		.await
		.map_err(map_engine_error)?;
	Ok((StatusCode::CREATED, Json(complaint)))
}

/// Handles GET /api/complaints.
pub async fn list_complaints(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Vec<Complaint>>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let complaints = state
		.engine
		.list_complaints(&actor)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(complaints))
}

/// Handles POST /api/complaints/{id}/resolve.
pub async fn resolve_complaint(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
	Json(request): Json<ResolveComplaintRequest>,
) -> Result<Json<ResolveComplaintResponse>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let (complaint, refund) = state
		.engine
		.resolve_complaint(
			&actor,
			&id,
			request.decision,
			request.admin_response,
			request.final_amount,
		)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(ResolveComplaintResponse {
		complaint,
		refund_amount: refund.as_ref().map(|r| r.amount),
		refund_reference: refund.map(|r| r.reference),
	}))
}

/// Handles GET /api/restaurants/{id}/payouts.
pub async fn payout_summary(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
) -> Result<Json<PayoutSummary>, ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let summary = state
		.engine
		.payout_summary(&actor, &id)
		.await
		.map_err(map_engine_error)?;
	Ok(Json(summary))
}

/// Handles POST /api/restaurants/{id}/transfers.
pub async fn record_transfer(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(id): Path<String>,
	Json(request): Json<RecordTransferRequest>,
) -> Result<(StatusCode, Json<Transfer>), ApiError> {
	let actor = authenticate(&state, &headers).await?;
	let transfer = state
		.engine
		.record_transfer(
			&actor,
			&id,
			request.amount,
			request.reference,
			request.period,
		)
		.await
		.map_err(map_engine_error)?;
	Ok((StatusCode::CREATED, Json(transfer)))
}
