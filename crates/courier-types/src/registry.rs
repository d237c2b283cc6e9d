//! Registry trait for self-registering implementations.
//!
//! This module provides the base trait that courier implementations must
//! implement to register themselves with their configuration name and
//! factory function.

/// Base trait for implementation registries.
///
/// Each implementation module must provide a Registry struct that implements
/// this trait, so that every implementation declares the name it is selected
/// by in configuration and the factory that constructs it.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example
	/// "esplora" for indexer.implementations.esplora.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	///
	/// Each component crate defines its own factory type, for example
	/// IndexerFactory for indexer implementations.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
