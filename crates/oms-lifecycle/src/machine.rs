//! Status state machine for the order lifecycle.
//!
//! Legal transitions:
//!
//! `pending -> preparing -> ready -> claimed -> delivered`, with
//! `pending -> rejected` and any pre-delivered state `-> cancelled` as
//! alternate terminal branches. Every other (state, action) pair is rejected
//! with an `InvalidTransition` error, leaving the stored status unchanged.

use oms_types::OrderStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Bounds on the preparation duration supplied at acceptance, in minutes.
pub const MIN_PREP_MINUTES: u32 = 5;
/// Upper bound on the preparation duration, in minutes.
pub const MAX_PREP_MINUTES: u32 = 120;

/// Errors that can occur when driving the state machine.
#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
	/// The requested action is not legal from the current status.
	#[error("Invalid transition: cannot {action} an order in status {from}")]
	InvalidTransition {
		from: OrderStatus,
		action: &'static str,
	},
	/// The preparation duration is outside the allowed range.
	#[error("Preparation duration must be between {MIN_PREP_MINUTES} and {MAX_PREP_MINUTES} minutes, got {0}")]
	InvalidPrepDuration(u32),
}

/// Actions that drive an order through its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "action")]
pub enum OrderAction {
	/// Restaurant accepts the order and commits to a preparation duration.
	Accept { prep_minutes: u32 },
	/// Restaurant rejects the pending order.
	Reject,
	/// Restaurant marks the order ready for pickup.
	MarkReady,
	/// A courier claims the order for delivery.
	Claim,
	/// The assigned courier completes the security-code handoff.
	CompleteDelivery,
	/// The order is cancelled before delivery.
	Cancel,
}

impl OrderAction {
	/// Short name used in error messages.
	pub fn name(&self) -> &'static str {
		match self {
			OrderAction::Accept { .. } => "accept",
			OrderAction::Reject => "reject",
			OrderAction::MarkReady => "mark ready",
			OrderAction::Claim => "claim",
			OrderAction::CompleteDelivery => "deliver",
			OrderAction::Cancel => "cancel",
		}
	}
}

impl fmt::Display for OrderAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.name())
	}
}

/// Policy knobs affecting transition legality.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionPolicy {
	/// When true, claiming is legal from `Preparing` as well as `Ready`.
	/// The canonical policy keeps `Preparing` visibility-only.
	pub claim_from_preparing: bool,
}

/// Computes the status an action leads to from the given status.
///
/// Pure and deterministic; the caller persists the result. Returns
/// `InvalidTransition` for every pair outside the table and
/// `InvalidPrepDuration` for an out-of-range acceptance.
pub fn transition(
	from: OrderStatus,
	action: &OrderAction,
	policy: TransitionPolicy,
) -> Result<OrderStatus, LifecycleError> {
	use OrderStatus::*;

	let invalid = || {
		Err(LifecycleError::InvalidTransition {
			from,
			action: action.name(),
		})
	};

	match action {
		OrderAction::Accept { prep_minutes } => {
			if from != Pending {
				return invalid();
			}
			if !(MIN_PREP_MINUTES..=MAX_PREP_MINUTES).contains(prep_minutes) {
				return Err(LifecycleError::InvalidPrepDuration(*prep_minutes));
			}
			Ok(Preparing)
		}
		OrderAction::Reject => match from {
			Pending => Ok(Rejected),
			_ => invalid(),
		},
		OrderAction::MarkReady => match from {
			Preparing => Ok(Ready),
			_ => invalid(),
		},
		OrderAction::Claim => match from {
			Ready => Ok(Claimed),
			Preparing if policy.claim_from_preparing => Ok(Claimed),
			_ => invalid(),
		},
		OrderAction::CompleteDelivery => match from {
			Claimed => Ok(Delivered),
			_ => invalid(),
		},
		OrderAction::Cancel => {
			if from.is_pre_delivery() {
				Ok(Cancelled)
			} else {
				invalid()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use OrderStatus::*;

	const ALL_STATUSES: [OrderStatus; 7] =
		[Pending, Preparing, Ready, Claimed, Delivered, Rejected, Cancelled];

	fn default_policy() -> TransitionPolicy {
		TransitionPolicy::default()
	}

	#[test]
	fn happy_path() {
		let policy = default_policy();
		let accept = OrderAction::Accept { prep_minutes: 20 };
		assert_eq!(transition(Pending, &accept, policy), Ok(Preparing));
		assert_eq!(
			transition(Preparing, &OrderAction::MarkReady, policy),
			Ok(Ready)
		);
		assert_eq!(transition(Ready, &OrderAction::Claim, policy), Ok(Claimed));
		assert_eq!(
			transition(Claimed, &OrderAction::CompleteDelivery, policy),
			Ok(Delivered)
		);
	}

	#[test]
	fn reject_only_from_pending() {
		let policy = default_policy();
		assert_eq!(transition(Pending, &OrderAction::Reject, policy), Ok(Rejected));
		for from in ALL_STATUSES.iter().filter(|s| **s != Pending) {
			assert!(transition(*from, &OrderAction::Reject, policy).is_err());
		}
	}

	#[test]
	fn prep_duration_bounds() {
		let policy = default_policy();
		for minutes in [4, 0, 121, 1000] {
			assert_eq!(
				transition(Pending, &OrderAction::Accept { prep_minutes: minutes }, policy),
				Err(LifecycleError::InvalidPrepDuration(minutes))
			);
		}
		for minutes in [5, 120] {
			assert_eq!(
				transition(Pending, &OrderAction::Accept { prep_minutes: minutes }, policy),
				Ok(Preparing)
			);
		}
	}

	#[test]
	fn cancel_legal_only_pre_delivery() {
		let policy = default_policy();
		for from in [Pending, Preparing, Ready, Claimed] {
			assert_eq!(transition(from, &OrderAction::Cancel, policy), Ok(Cancelled));
		}
		for from in [Delivered, Rejected, Cancelled] {
			assert!(transition(from, &OrderAction::Cancel, policy).is_err());
		}
	}

	#[test]
	fn claim_from_preparing_is_policy_gated() {
		let canonical = default_policy();
		assert!(transition(Preparing, &OrderAction::Claim, canonical).is_err());

		let relaxed = TransitionPolicy {
			claim_from_preparing: true,
		};
		assert_eq!(transition(Preparing, &OrderAction::Claim, relaxed), Ok(Claimed));
	}

	// Exhaustive: everything outside the table is rejected.
	#[test]
	fn all_pairs_outside_table_are_rejected() {
		let policy = default_policy();
		let actions = [
			OrderAction::Accept { prep_minutes: 30 },
			OrderAction::Reject,
			OrderAction::MarkReady,
			OrderAction::Claim,
			OrderAction::CompleteDelivery,
			OrderAction::Cancel,
		];
		let legal: &[(OrderStatus, &str)] = &[
			(Pending, "accept"),
			(Pending, "reject"),
			(Preparing, "mark ready"),
			(Ready, "claim"),
			(Claimed, "deliver"),
			(Pending, "cancel"),
			(Preparing, "cancel"),
			(Ready, "cancel"),
			(Claimed, "cancel"),
		];
		for from in ALL_STATUSES {
			for action in &actions {
				let expected_legal = legal.contains(&(from, action.name()));
				let result = transition(from, action, policy);
				assert_eq!(
					result.is_ok(),
					expected_legal,
					"unexpected legality for ({from}, {action})"
				);
			}
		}
	}
}
