//! Storage namespaces for persisted collections.

use std::str::FromStr;

/// Storage namespaces for the persisted collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Namespace for order rows.
	Orders,
	/// Namespace for complaint rows, keyed by complaint id.
	Complaints,
	/// Namespace for payout transfer rows.
	Transfers,
	/// Namespace for payment ledger mirror rows, keyed by order id.
	Payments,
}

impl StorageKey {
	/// Returns the string representation of the storage namespace.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Complaints => "complaints",
			StorageKey::Transfers => "transfers",
			StorageKey::Payments => "payments",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::Complaints,
			Self::Transfers,
			Self::Payments,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"complaints" => Ok(Self::Complaints),
			"transfers" => Ok(Self::Transfers),
			"payments" => Ok(Self::Payments),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
