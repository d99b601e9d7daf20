//! API error envelope for the marketplace HTTP API.
//!
//! This module defines the error type returned by all HTTP endpoints,
//! mapping the core's error taxonomy onto status codes. State-conflict
//! errors surface a specific "someone else already did this" message
//! distinct from generic failures.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON error body returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Machine-readable reason code.
	pub error: String,
	/// Human-readable message.
	pub message: String,
	/// Optional structured details.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Errors returned by HTTP endpoints.
#[derive(Debug)]
pub enum ApiError {
	/// Bad request with validation errors (400).
	BadRequest { error_type: String, message: String },
	/// Missing or invalid credentials (401).
	Unauthorized { message: String },
	/// Authenticated but not permitted for this resource (403).
	Forbidden { message: String },
	/// Resource not found (404).
	NotFound { message: String },
	/// State conflict: someone else already performed this action (409).
	Conflict { error_type: String, message: String },
	/// Business-rule precondition failed (422).
	UnprocessableEntity { error_type: String, message: String },
	/// A dependency is unavailable, retry later (503).
	ServiceUnavailable { message: String },
	/// Internal server error (500).
	InternalServerError { message: String },
}

impl ApiError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
			ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
			ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
			ApiError::Conflict { .. } => StatusCode::CONFLICT,
			ApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
			ApiError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message) = match self {
			ApiError::BadRequest {
				error_type,
				message,
			} => (error_type.clone(), message.clone()),
			ApiError::Unauthorized { message } => ("unauthorized".to_string(), message.clone()),
			ApiError::Forbidden { message } => ("forbidden".to_string(), message.clone()),
			ApiError::NotFound { message } => ("not_found".to_string(), message.clone()),
			ApiError::Conflict {
				error_type,
				message,
			} => (error_type.clone(), message.clone()),
			ApiError::UnprocessableEntity {
				error_type,
				message,
			} => (error_type.clone(), message.clone()),
			ApiError::ServiceUnavailable { message } => {
				("service_unavailable".to_string(), message.clone())
			}
			ApiError::InternalServerError { message } => {
				("internal_error".to_string(), message.clone())
			}
		};
		ErrorResponse {
			error,
			message,
			details: None,
		}
	}
}

impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let body = self.to_error_response();
		write!(f, "{}: {}", body.error, body.message)
	}
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}
