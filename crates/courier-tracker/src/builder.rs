//! Builder for assembling a tracker from configuration.
//!
//! The builder resolves the configured primary indexer implementation
//! against a set of registered factories, validates its configuration
//! section through the implementation's own schema, and wires the result
//! into a ready-to-use [`TrackerService`].

use crate::TrackerService;
use courier_config::Config;
use courier_indexer::{IndexerError, IndexerFactory, IndexerService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while assembling a tracker.
#[derive(Debug, Error)]
pub enum BuildError {
	/// The configured primary indexer has no registered factory.
	#[error("Unknown indexer implementation '{name}'. Available: [{available}]")]
	UnknownImplementation { name: String, available: String },
	/// The factory refused to construct the backend.
	#[error("Failed to create indexer backend '{name}': {source}")]
	Backend {
		name: String,
		#[source]
		source: IndexerError,
	},
	/// The configuration section failed schema validation.
	#[error("Invalid configuration for indexer '{name}': {message}")]
	InvalidConfiguration { name: String, message: String },
}

/// Factories for the pluggable pieces of a courier instance.
///
/// Callers register one factory per implementation name; the builder picks
/// whichever the configuration selects as primary.
pub struct CourierFactories {
	/// Maps indexer implementation names to their factory functions.
	pub indexer_factories: HashMap<String, IndexerFactory>,
}

/// Builder for constructing a TrackerService with a pluggable indexer.
///
/// The configuration names the primary implementation; the factories
/// supply the code for it. Keeping the two apart lets deployments switch
/// indexer backends without touching anything beyond the config file.
pub struct CourierBuilder {
	config: Config,
}

impl CourierBuilder {
	/// Creates a new CourierBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the tracker.
	///
	/// This method:
	/// 1. Resolves the primary indexer implementation to a factory
	/// 2. Instantiates the backend and validates its configuration section
	/// 3. Returns a TrackerService carrying the configured polling settings
	pub fn build(self, factories: CourierFactories) -> Result<TrackerService, BuildError> {
		let name = &self.config.indexer.primary;

		let factory = factories.indexer_factories.get(name).ok_or_else(|| {
			let mut available: Vec<_> = factories.indexer_factories.keys().cloned().collect();
			available.sort();
			BuildError::UnknownImplementation {
				name: name.clone(),
				available: available.join(", "),
			}
		})?;

		let implementation_config = self
			.config
			.indexer
			.implementations
			.get(name)
			.ok_or_else(|| BuildError::InvalidConfiguration {
				name: name.clone(),
				message: "no configuration section found".to_string(),
			})?;

		let backend = factory(implementation_config).map_err(|e| {
			tracing::error!(
				component = "indexer",
				implementation = %name,
				error = %e,
				"Failed to create indexer backend"
			);
			BuildError::Backend {
				name: name.clone(),
				source: e,
			}
		})?;

		// Validate the configuration using the backend's schema
		backend
			.config_schema()
			.validate(implementation_config)
			.map_err(|e| BuildError::InvalidConfiguration {
				name: name.clone(),
				message: e.to_string(),
			})?;
		let indexer = Arc::new(IndexerService::new(backend));
		tracing::info!(component = "indexer", implementation = %name, "Loaded");

		let settings = &self.config.tracker;
		let wait_timeout = match settings.timeout_minutes {
			0 => None,
			minutes => Some(Duration::from_secs(minutes * 60)),
		};

		Ok(TrackerService::new(
			indexer,
			Duration::from_secs(settings.poll_interval_secs),
			settings.maturity_depth,
			wait_timeout,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_indexer::get_all_implementations;

	fn registered_factories() -> CourierFactories {
		CourierFactories {
			indexer_factories: get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[test]
	fn test_build_wires_primary_indexer() {
		let config: Config = r#"
[courier]
id = "courier-test"

[indexer]
primary = "esplora"
[indexer.implementations.esplora]
url = "https://blockstream.info/api"

[tracker]
poll_interval_secs = 5
maturity_depth = 3
"#
		.parse()
		.unwrap();

		let tracker = CourierBuilder::new(config)
			.build(registered_factories())
			.unwrap();

		assert_eq!(tracker.poll_interval(), Duration::from_secs(5));
		assert_eq!(tracker.maturity_depth(), 3);
		// timeout_minutes falls back to its default when omitted
		assert_eq!(tracker.wait_timeout(), Some(Duration::from_secs(120 * 60)));
	}

	#[test]
	fn test_build_rejects_unregistered_implementation() {
		let config: Config = r#"
[courier]
id = "courier-test"

[indexer]
primary = "mempool"
[indexer.implementations.mempool]
url = "https://mempool.example.com/api"
"#
		.parse()
		.unwrap();

		let err = CourierBuilder::new(config)
			.build(registered_factories())
			.unwrap_err();

		assert_eq!(
			err.to_string(),
			"Unknown indexer implementation 'mempool'. Available: [esplora]"
		);
	}

	#[test]
	fn test_build_surfaces_factory_rejection() {
		let config: Config = r#"
[courier]
id = "courier-test"

[indexer]
primary = "esplora"
[indexer.implementations.esplora]
url = "ftp://indexer.example.com/api"
"#
		.parse()
		.unwrap();

		let err = CourierBuilder::new(config)
			.build(registered_factories())
			.unwrap_err();

		assert!(matches!(err, BuildError::Backend { ref name, .. } if name == "esplora"));
		assert!(err
			.to_string()
			.contains("Failed to create indexer backend 'esplora'"));
	}

	#[test]
	fn test_zero_timeout_disables_deadline() {
		let config: Config = r#"
[courier]
id = "courier-test"

[indexer]
primary = "esplora"
[indexer.implementations.esplora]
url = "https://blockstream.info/api"

[tracker]
timeout_minutes = 0
"#
		.parse()
		.unwrap();

		let tracker = CourierBuilder::new(config)
			.build(registered_factories())
			.unwrap();

		assert_eq!(tracker.wait_timeout(), None);
	}
}
