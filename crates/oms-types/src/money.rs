//! Money comparison helpers.
//!
//! Amounts are stored as f64 and compared with a fixed epsilon wherever the
//! settlement rules require an equality check.

/// Tolerance for comparing monetary amounts.
pub const AMOUNT_EPSILON: f64 = 0.01;

/// Compares two amounts with the settlement epsilon.
pub fn amounts_equal(a: f64, b: f64) -> bool {
	(a - b).abs() <= AMOUNT_EPSILON
}

/// Rounds an amount to cents.
pub fn round_cents(amount: f64) -> f64 {
	(amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn epsilon_comparison() {
		assert!(amounts_equal(20.0, 20.004));
		assert!(amounts_equal(20.0, 19.995));
		assert!(!amounts_equal(20.0, 20.02));
	}

	#[test]
	fn rounding() {
		assert_eq!(round_cents(23.4999), 23.5);
		assert_eq!(round_cents(5.004), 5.0);
	}
}
