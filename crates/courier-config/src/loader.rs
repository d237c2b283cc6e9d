//! Loader for modular configuration files.
//!
//! A configuration may name further files through an `include` directive;
//! the loader reads them all, rejects cycles, and merges the top-level
//! sections into one document. A section defined in two files is an error
//! rather than a silent override.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a configuration file together with its includes.
pub struct ConfigLoader {
	/// Directory that relative include paths are resolved against.
	base_dir: PathBuf,
	/// Canonical paths already read, for cycle detection.
	visited: HashSet<PathBuf>,
	/// Which file each top-level section came from, for duplicate reporting.
	section_origins: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	/// Creates a loader resolving relative includes against `base_dir`.
	pub fn new(base_dir: impl AsRef<Path>) -> Self {
		Self {
			base_dir: base_dir.as_ref().to_path_buf(),
			visited: HashSet::new(),
			section_origins: HashMap::new(),
		}
	}

	/// Loads a configuration file, following include directives.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let main_path = self.locate(config_path)?;
		let main_content = self.read_source(&main_path).await?;

		let mut document: toml::Value = toml::from_str(&main_content)?;
		let includes = take_includes(&mut document)?;

		// Fast path: a single self-contained file needs no merging
		if includes.is_empty() {
			return main_content.parse();
		}

		self.record_origins(&document, &main_path);
		for include in includes {
			let include_path = self.locate(&include)?;
			let include_content = self.read_source(&include_path).await?;
			let fragment: toml::Value = toml::from_str(&include_content)?;
			self.merge_fragment(&mut document, fragment, &include_path)?;
		}

		let merged = toml::to_string(&document)
			.map_err(|e| ConfigError::Parse(format!("Failed to serialize merged config: {}", e)))?;
		merged.parse()
	}

	/// Reads one file, marking it visited and resolving environment variables.
	async fn read_source(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Include cycle detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = std::fs::read_to_string(path)?;
		resolve_env_vars(&content)
	}

	/// Notes which file every top-level section of `document` came from.
	fn record_origins(&mut self, document: &toml::Value, source: &Path) {
		if let Some(table) = document.as_table() {
			for section in table.keys() {
				self.section_origins
					.insert(section.clone(), source.to_path_buf());
			}
		}
	}

	/// Merges an included fragment's sections into the document.
	///
	/// Every top-level section must be defined in exactly one file.
	fn merge_fragment(
		&mut self,
		document: &mut toml::Value,
		fragment: toml::Value,
		source: &Path,
	) -> Result<(), ConfigError> {
		let fragment_table = match fragment {
			toml::Value::Table(table) => table,
			_ => {
				return Err(ConfigError::Validation(format!(
					"Included file {} is not a TOML table",
					source.display()
				)))
			},
		};

		for (section, value) in fragment_table {
			if let Some(origin) = self.section_origins.get(&section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' defined in both {} and {}",
					section,
					origin.display(),
					source.display()
				)));
			}
			self.section_origins
				.insert(section.clone(), source.to_path_buf());
			if let Some(table) = document.as_table_mut() {
				table.insert(section, value);
			}
		}

		Ok(())
	}

	/// Resolves a configured path and checks that the file exists.
	fn locate(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_dir.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

/// Removes the `include` directive from a document and returns its paths.
///
/// Accepts a single string or an array of strings; anything else is an
/// error. The directive itself never survives into the merged document.
fn take_includes(document: &mut toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	let directive = match document.as_table_mut().and_then(|t| t.remove("include")) {
		Some(value) => value,
		None => return Ok(Vec::new()),
	};

	match directive {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(entries) => entries
			.into_iter()
			.map(|entry| match entry {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
