//! Dynamic factory registry for indexer implementations.
//!
//! This module provides a centralized registry for indexer factory
//! functions, allowing dynamic instantiation of implementations based on
//! configuration.

use courier_config::Config;
use courier_indexer::IndexerFactory;
use courier_tracker::{CourierBuilder, CourierFactories, TrackerService};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for indexer implementation factories
pub struct FactoryRegistry {
	pub indexer: HashMap<String, IndexerFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			indexer: HashMap::new(),
		}
	}

	/// Register an indexer implementation
	pub fn register_indexer(&mut self, name: impl Into<String>, factory: IndexerFactory) {
		self.indexer.insert(name.into(), factory);
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		// Auto-register all indexer implementations
		for (name, factory) in courier_indexer::get_all_implementations() {
			tracing::debug!("Registering indexer implementation: {}", name);
			registry.register_indexer(name, factory);
		}

		registry
	})
}

/// Get the global factory registry
pub fn get_registry() -> &'static FactoryRegistry {
	initialize_registry()
}

/// Build a tracker using registry and config
pub fn build_tracker_from_config(
	config: Config,
) -> Result<TrackerService, Box<dyn std::error::Error>> {
	let registry = get_registry();

	// Resolve every configured implementation against the registry so a
	// typo in any section is reported, not just in the primary one
	let mut indexer_factories = HashMap::new();
	for name in config.indexer.implementations.keys() {
		if let Some(factory) = registry.indexer.get(name) {
			indexer_factories.insert(name.clone(), *factory);
		} else {
			let available: Vec<_> = registry.indexer.keys().cloned().collect();
			let available_str = available.join(", ");
			return Err(format!(
				"Unknown indexer implementation '{}'. Available: [{}]",
				name, available_str
			)
			.into());
		}
	}

	let factories = CourierFactories { indexer_factories };

	Ok(CourierBuilder::new(config).build(factories)?)
}
