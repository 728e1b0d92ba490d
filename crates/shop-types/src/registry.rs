//! Registry trait for self-registering implementations.
//!
//! Every pluggable backend (storage, push gateway) exposes a registry that
//! names it in configuration and hands out its factory.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. `"memory"` for `storage.implementations.memory` or `"webhook"`
	/// for `notifications.implementations.webhook`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
