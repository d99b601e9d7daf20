//! Actor and role types for authorization.
//!
//! Every core operation is invoked on behalf of an authenticated actor whose
//! role and identity are checked against the order's restaurant, courier and
//! customer references. Token verification itself is an external collaborator
//! behind the [`AuthInterface`] port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Role of an authenticated marketplace user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Role {
	Customer,
	Restaurant,
	Courier,
	Admin,
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Role::Customer => write!(f, "customer"),
			Role::Restaurant => write!(f, "restaurant"),
			Role::Courier => write!(f, "courier"),
			Role::Admin => write!(f, "admin"),
		}
	}
}

/// An authenticated actor invoking a core operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
	/// User identifier, matched against order references.
	pub id: String,
	/// Role granted by the auth collaborator.
	pub role: Role,
}

impl Actor {
	/// Creates an actor with the given id and role.
	pub fn new(id: impl Into<String>, role: Role) -> Self {
		Self {
			id: id.into(),
			role,
		}
	}
}

/// Errors returned by the auth collaborator.
#[derive(Debug, Error)]
pub enum AuthError {
	/// The presented token is unknown or malformed.
	#[error("Invalid token")]
	InvalidToken,
	/// The token is known but no longer valid.
	#[error("Token expired")]
	Expired,
}

/// External auth collaborator: maps a bearer token to an actor.
#[async_trait]
pub trait AuthInterface: Send + Sync {
	/// Verifies a token and returns the actor it authenticates.
	async fn verify(&self, token: &str) -> Result<Actor, AuthError>;
}
