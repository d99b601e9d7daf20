//! HTTP API handlers for the marketplace.
//!
//! Handlers are thin: authenticate the caller, decode the request, invoke
//! the engine and map its error taxonomy onto HTTP status codes. All
//! authorization and business rules live in the engine.

pub mod dispatch;
pub mod orders;
pub mod settlement;
pub mod webhooks;

use oms_core::EngineError;
use oms_dispatch::DispatchError;
use oms_lifecycle::LifecycleError;
use oms_settlement::{PaymentError, SettlementError};
use oms_storage::StorageError;
use oms_types::ApiError;

/// Maps an engine error onto the API error envelope.
///
/// Race outcomes (claim lost, already resolved) map to 409 so clients can
/// distinguish "someone else did this" from their own mistakes; code
/// mismatches and window violations are 422 business-rule failures.
pub(crate) fn map_engine_error(e: EngineError) -> ApiError {
	let message = e.to_string();
	match e {
		EngineError::Config(_) => ApiError::InternalServerError { message },
		EngineError::Unauthorized(_) => ApiError::Forbidden { message },
		EngineError::Validation(_) => ApiError::BadRequest {
			error_type: "validation".to_string(),
			message,
		},
		EngineError::OrderNotFound(_) => ApiError::NotFound { message },
		EngineError::Lifecycle(e) => match e {
			LifecycleError::InvalidPrepDuration(_) => ApiError::BadRequest {
				error_type: "invalid_prep_duration".to_string(),
				message,
			},
			LifecycleError::InvalidTransition { .. } => ApiError::Conflict {
				error_type: "invalid_transition".to_string(),
				message,
			},
		},
		EngineError::Dispatch(e) => match e {
			DispatchError::NotFound => ApiError::NotFound { message },
			DispatchError::AlreadyClaimed => ApiError::Conflict {
				error_type: "already_claimed".to_string(),
				message,
			},
			DispatchError::InvalidState(_) => ApiError::Conflict {
				error_type: "invalid_state".to_string(),
				message,
			},
			DispatchError::NotAssigned => ApiError::Forbidden { message },
			DispatchError::CodeMismatch => ApiError::UnprocessableEntity {
				error_type: "code_mismatch".to_string(),
				message,
			},
			DispatchError::HandoffLocked => ApiError::UnprocessableEntity {
				error_type: "handoff_locked".to_string(),
				message,
			},
			DispatchError::Storage(e) => map_storage_error(e),
		},
		EngineError::Settlement(e) => match e {
			SettlementError::OrderNotFound(_) | SettlementError::ComplaintNotFound(_) => {
				ApiError::NotFound { message }
			}
			SettlementError::OrderNotDelivered => ApiError::UnprocessableEntity {
				error_type: "order_not_delivered".to_string(),
				message,
			},
			SettlementError::WindowClosed(_) => ApiError::UnprocessableEntity {
				error_type: "window_closed".to_string(),
				message,
			},
			SettlementError::AlreadyResolved => ApiError::Conflict {
				error_type: "already_resolved".to_string(),
				message,
			},
			SettlementError::DuplicateComplaint(_) => ApiError::Conflict {
				error_type: "duplicate_complaint".to_string(),
				message,
			},
			SettlementError::InvalidAmount(_) => ApiError::BadRequest {
				error_type: "invalid_amount".to_string(),
				message,
			},
			SettlementError::Payment(PaymentError::Unavailable(_)) => {
				ApiError::ServiceUnavailable { message }
			}
			SettlementError::Payment(PaymentError::Rejected(_)) => {
				ApiError::UnprocessableEntity {
					error_type: "refund_rejected".to_string(),
					message,
				}
			}
			SettlementError::Storage(e) => map_storage_error(e),
		},
		EngineError::Storage(e) => map_storage_error(e),
	}
}

fn map_storage_error(e: StorageError) -> ApiError {
	match e {
		StorageError::NotFound => ApiError::NotFound {
			message: "Not found".to_string(),
		},
		StorageError::Contention => ApiError::ServiceUnavailable {
			message: "Store contention, retry".to_string(),
		},
		other => ApiError::InternalServerError {
			message: other.to_string(),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::StatusCode;
	use oms_types::OrderStatus;

	#[test]
	fn race_outcomes_map_to_conflict() {
		let claimed = map_engine_error(EngineError::Dispatch(DispatchError::AlreadyClaimed));
		assert_eq!(claimed.status_code(), StatusCode::CONFLICT);
		let resolved = map_engine_error(EngineError::Settlement(SettlementError::AlreadyResolved));
		assert_eq!(resolved.status_code(), StatusCode::CONFLICT);
		let state = map_engine_error(EngineError::Dispatch(DispatchError::InvalidState(
			OrderStatus::Claimed,
		)));
		assert_eq!(state.status_code(), StatusCode::CONFLICT);
	}

	#[test]
	fn business_rule_failures_map_to_unprocessable() {
		let mismatch = map_engine_error(EngineError::Dispatch(DispatchError::CodeMismatch));
		assert_eq!(mismatch.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
		let window = map_engine_error(EngineError::Settlement(SettlementError::WindowClosed(
			"too early".to_string(),
		)));
		assert_eq!(window.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
	}

	#[test]
	fn contention_maps_to_service_unavailable() {
		let err = map_engine_error(EngineError::Storage(StorageError::Contention));
		assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
	}
}
