//! Registry trait for pluggable implementations.

/// Trait for registering named implementations with their factories.
///
/// Each pluggable implementation (e.g. a storage backend) exposes a unit
/// struct implementing this trait so the service layer can build a name to
/// factory map from configuration.
pub trait ImplementationRegistry {
	/// The name this implementation is selected by in configuration.
	const NAME: &'static str;

	/// The factory function type for this implementation kind.
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
