//! Configuration module for the courier system.
//!
//! This module provides structures and utilities for managing courier
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required configuration values are
//! properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the courier.
///
/// This structure contains all configuration sections required for the
/// courier to operate: the courier identity, the indexer backend to
/// broadcast and poll through, and the tracking loop parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to the courier instance.
	pub courier: CourierConfig,
	/// Configuration for the indexer backend.
	pub indexer: IndexerConfig,
	/// Configuration for the confirmation tracking loop.
	#[serde(default)]
	pub tracker: TrackerConfig,
}

/// Configuration specific to the courier instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CourierConfig {
	/// Unique identifier for this courier instance.
	pub id: String,
}

/// Configuration for the indexer backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of indexer implementation names to their configurations.
	/// Each implementation has its own configuration format stored as raw TOML values.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the confirmation tracking loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
	/// Seconds between poll iterations. One pacing value shared by the
	/// confirmation and maturity phases.
	/// Defaults to 15 seconds if not specified.
	#[serde(default = "default_poll_interval_secs")]
	pub poll_interval_secs: u64,
	/// Confirmation depth at which a transaction counts as mature.
	/// Defaults to 6 confirmations if not specified.
	#[serde(default = "default_maturity_depth")]
	pub maturity_depth: u64,
	/// Timeout duration in minutes for a single wait call.
	/// Defaults to 120 minutes (2 hours) if not specified; 0 disables the
	/// deadline for callers that explicitly want unbounded waiting.
	#[serde(default = "default_timeout_minutes")]
	pub timeout_minutes: u64,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			poll_interval_secs: default_poll_interval_secs(),
			maturity_depth: default_maturity_depth(),
			timeout_minutes: default_timeout_minutes(),
		}
	}
}

/// Returns the default poll interval in seconds.
///
/// This provides a default of 15 seconds between status checks when no
/// explicit interval is configured.
fn default_poll_interval_secs() -> u64 {
	15
}

/// Returns the default maturity depth in confirmations.
///
/// This provides a default of 6 confirmations for considering a transaction
/// sufficiently irreversible when no explicit depth is configured.
fn default_maturity_depth() -> u64 {
	6
}

/// Returns the default wait timeout in minutes.
///
/// This provides a default value of 120 minutes (2 hours) for a single wait
/// call when no explicit timeout is configured. A value of 0 disables the
/// deadline entirely.
fn default_timeout_minutes() -> u64 {
	120 // Default to 2 hours
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}. A reference
/// without a default to a variable that is not set is an error.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Limit input size to prevent ReDoS attacks
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	// Rebuild the string, substituting each reference as it is found
	let mut resolved = String::with_capacity(input.len());
	let mut tail_start = 0;

	for cap in re.captures_iter(input) {
		let reference = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();

		let value = match std::env::var(var_name) {
			Ok(value) => value,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};

		resolved.push_str(&input[tail_start..reference.start()]);
		resolved.push_str(&value);
		tail_start = reference.end();
	}
	resolved.push_str(&input[tail_start..]);

	Ok(resolved)
}

impl Config {
	/// Loads configuration from a file with async environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// This method performs validation across all configuration sections:
	/// - Ensures the courier ID is not empty
	/// - Checks that an indexer implementation is configured and that the
	///   primary selection refers to one of them
	/// - Verifies the tracking loop parameters are within sensible bounds
	fn validate(&self) -> Result<(), ConfigError> {
		// Validate courier config
		if self.courier.id.is_empty() {
			return Err(ConfigError::Validation("Courier ID cannot be empty".into()));
		}

		// Validate indexer config
		if self.indexer.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one indexer implementation must be configured".into(),
			));
		}
		if self.indexer.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Indexer primary implementation cannot be empty".into(),
			));
		}
		if !self
			.indexer
			.implementations
			.contains_key(&self.indexer.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary indexer '{}' not found in implementations",
				self.indexer.primary
			)));
		}

		// Validate tracker config
		if self.tracker.poll_interval_secs == 0 {
			return Err(ConfigError::Validation(
				"Tracker poll_interval_secs must be greater than 0".into(),
			));
		}
		if self.tracker.poll_interval_secs > 3600 {
			return Err(ConfigError::Validation(
				"Tracker poll_interval_secs cannot exceed 3600 (1 hour)".into(),
			));
		}
		if self.tracker.maturity_depth == 0 {
			return Err(ConfigError::Validation(
				"maturity_depth must be at least 1".into(),
			));
		}
		if self.tracker.maturity_depth > 100 {
			return Err(ConfigError::Validation(
				"maturity_depth cannot exceed 100".into(),
			));
		}
		// timeout_minutes == 0 means the caller opted out of the deadline
		if self.tracker.timeout_minutes > 10080 {
			return Err(ConfigError::Validation(
				"timeout_minutes cannot exceed 10080 (7 days)".into(),
			));
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// This allows configuration to be parsed from TOML strings using the standard
/// string parsing interface. Environment variables are resolved and the
/// configuration is automatically validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
