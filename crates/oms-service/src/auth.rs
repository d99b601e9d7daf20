//! Static-token auth collaborator.
//!
//! Maps bearer tokens from the `[api.tokens]` configuration table onto
//! actors. Each entry is `token = "role:user_id"`. Placeholder for
//! deployments without an identity provider; the engine only ever sees the
//! resolved [`Actor`].

use async_trait::async_trait;
use oms_config::ApiConfig;
use oms_types::{Actor, AuthError, AuthInterface, Role};
use std::collections::HashMap;

/// Auth collaborator backed by a static token table.
pub struct StaticTokenAuth {
	tokens: HashMap<String, Actor>,
}

impl StaticTokenAuth {
	/// Builds the token table from configuration.
	///
	/// Entries that do not parse as `role:user_id` are skipped with a
	/// warning rather than failing startup.
	pub fn from_config(config: &ApiConfig) -> Self {
		let mut tokens = HashMap::new();
		for (token, subject) in &config.tokens {
			match parse_subject(subject) {
				Some(actor) => {
					tokens.insert(token.clone(), actor);
				}
				None => {
					tracing::warn!(subject = %subject, "Skipping malformed api token entry");
				}
			}
		}
		Self { tokens }
	}
}

fn parse_subject(subject: &str) -> Option<Actor> {
	let (role, id) = subject.split_once(':')?;
	if id.is_empty() {
		return None;
	}
	let role = match role {
		"customer" => Role::Customer,
		"restaurant" => Role::Restaurant,
		"courier" => Role::Courier,
		"admin" => Role::Admin,
		_ => return None,
	};
	Some(Actor::new(id, role))
}

#[async_trait]
impl AuthInterface for StaticTokenAuth {
	async fn verify(&self, token: &str) -> Result<Actor, AuthError> {
		self.tokens
			.get(token)
			.cloned()
			.ok_or(AuthError::InvalidToken)
	}
}
