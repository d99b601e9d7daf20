//! Preparation timer and alert derivation.
//!
//! All functions here are pure over stored timestamps: `ready_at` is the
//! preparation start plus the committed duration, and the two alert kinds
//! are derived from the remaining time at query time. No background
//! scheduler exists; polling consumers evaluate these on demand and nothing
//! here mutates order state.

use chrono::{DateTime, Duration, Utc};
use oms_types::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Early visibility of an order still being prepared, shown to unassigned
/// couriers so they can position themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreventiveAlert {
	/// Order being prepared.
	pub order_id: String,
	/// Restaurant display name.
	pub restaurant_name: String,
	/// Restaurant pickup address.
	pub restaurant_address: String,
	/// Expected order total.
	pub expected_total: f64,
	/// When the order is expected to be ready.
	pub ready_at: DateTime<Utc>,
	/// Whole minutes remaining until readiness.
	pub minutes_remaining: i64,
}

/// Alert directed at the courier assigned to an order that is about to be
/// ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImminentAlert {
	/// Order nearing readiness.
	pub order_id: String,
	/// Courier the alert targets.
	pub courier_id: String,
	/// Whole minutes remaining until readiness.
	pub minutes_remaining: i64,
}

/// Computes when the order will be ready, if preparation has started.
pub fn ready_at(order: &Order) -> Option<DateTime<Utc>> {
	let start = order.prep_started_at?;
	let minutes = order.prep_minutes?;
	Some(start + Duration::minutes(minutes as i64))
}

/// Computes the time remaining before readiness at the given instant.
///
/// Negative once the preparation window has elapsed. None if preparation
/// has not started.
pub fn time_remaining(order: &Order, now: DateTime<Utc>) -> Option<Duration> {
	ready_at(order).map(|at| at - now)
}

/// Derives the preventive alert for an order, if one applies.
///
/// Fires for orders still in preparation with time remaining and no courier
/// assigned yet.
pub fn preventive_alert(order: &Order, now: DateTime<Utc>) -> Option<PreventiveAlert> {
	if order.status != OrderStatus::Preparing || order.courier_id.is_some() {
		return None;
	}
	let remaining = time_remaining(order, now)?;
	if remaining <= Duration::zero() {
		return None;
	}
	Some(PreventiveAlert {
		order_id: order.id.clone(),
		restaurant_name: order.restaurant_name.clone(),
		restaurant_address: order.restaurant_address.clone(),
		expected_total: order.total,
		ready_at: ready_at(order)?,
		minutes_remaining: remaining.num_minutes(),
	})
}

/// Derives the imminent alert for a claimed order, if one applies.
///
/// Fires only for the assigned courier, once the remaining time drops to
/// the threshold while still positive.
pub fn imminent_alert(
	order: &Order,
	now: DateTime<Utc>,
	threshold_minutes: u32,
) -> Option<ImminentAlert> {
	let courier_id = order.courier_id.clone()?;
	if order.status != OrderStatus::Claimed {
		return None;
	}
	let remaining = time_remaining(order, now)?;
	if remaining <= Duration::zero() || remaining > Duration::minutes(threshold_minutes as i64) {
		return None;
	}
	Some(ImminentAlert {
		order_id: order.id.clone(),
		courier_id,
		minutes_remaining: remaining.num_minutes(),
	})
}
