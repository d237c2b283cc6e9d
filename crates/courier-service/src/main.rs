//! Main entry point for the courier service.
//!
//! This binary broadcasts finalized transactions through a third-party
//! indexer and tracks them until they reach the configured confirmation
//! depth. It uses a modular architecture with pluggable indexer backends
//! selected by configuration.

use clap::{Parser, Subcommand};
use courier_config::Config;
use courier_tracker::TrackerService;
use courier_types::{RawTransaction, TxId};
use std::path::PathBuf;

mod factory_registry;

use factory_registry::build_tracker_from_config;

/// Command-line arguments for the courier service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

/// Operations the courier can run.
#[derive(Subcommand, Debug)]
enum Command {
	/// Broadcast a transaction and track it to maturity
	Submit {
		/// Hex-encoded transaction, or @path to a file containing the hex
		tx: String,
	},
	/// Track an already-broadcast transaction to maturity
	Track {
		/// Transaction identifier assigned by the network
		tx_id: String,
	},
}

/// Main entry point for the courier service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the tracker with the configured indexer backend
/// 5. Runs the selected command until it completes or is interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started courier");

	// Load configuration
	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.courier.id);

	// Build the tracker with the configured indexer backend
	let tracker = build_tracker_from_config(config)?;

	let outcome = tokio::select! {
		result = run_command(&tracker, args.command) => result,
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Shutdown signal received");
			Ok(())
		}
	};

	tracing::info!("Stopped courier");
	outcome
}

/// Runs the selected operation to completion.
///
/// Both commands print the transaction identifier on success so the caller
/// can hand it to other tooling.
async fn run_command(
	tracker: &TrackerService,
	command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
	match command {
		Command::Submit { tx } => {
			let raw = read_transaction(&tx)?;
			let tx_id = tracker.submit_and_track(&raw).await?;
			println!("{}", tx_id);
		},
		Command::Track { tx_id } => {
			let tx_id = tracker.wait_for_maturity(&TxId::new(tx_id)).await?;
			println!("{}", tx_id);
		},
	}
	Ok(())
}

/// Reads the raw transaction payload from the command line argument.
///
/// Accepts the hex string inline, or `@path` to read the hex from a file.
fn read_transaction(arg: &str) -> Result<RawTransaction, Box<dyn std::error::Error>> {
	let hex_payload = match arg.strip_prefix('@') {
		Some(path) => std::fs::read_to_string(path)?,
		None => arg.to_string(),
	};
	let raw = RawTransaction::from_hex(hex_payload.trim())?;
	if raw.is_empty() {
		return Err("Transaction payload is empty".into());
	}
	Ok(raw)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_args_default_values() {
		let args = Args::try_parse_from(["courier", "track", "abc123"]).unwrap();

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		assert!(matches!(args.command, Command::Track { ref tx_id } if tx_id == "abc123"));
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::try_parse_from([
			"courier",
			"--config",
			"custom.toml",
			"--log-level",
			"debug",
			"submit",
			"0200deadbeef",
		])
		.unwrap();

		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
		assert!(matches!(args.command, Command::Submit { ref tx } if tx == "0200deadbeef"));
	}

	#[test]
	fn test_read_transaction_inline_hex() {
		let raw = read_transaction("0200deadbeef").unwrap();
		assert_eq!(raw.to_hex(), "0200deadbeef");
	}

	#[test]
	fn test_read_transaction_from_file() {
		let temp_dir = tempdir().expect("Failed to create temp dir");
		let tx_path = temp_dir.path().join("tx.hex");
		std::fs::write(&tx_path, "0200deadbeef\n").expect("Failed to write tx file");

		let arg = format!("@{}", tx_path.display());
		let raw = read_transaction(&arg).unwrap();
		assert_eq!(raw.to_hex(), "0200deadbeef");
	}

	#[test]
	fn test_read_transaction_rejects_bad_input() {
		assert!(read_transaction("not-hex").is_err());
		assert!(read_transaction("").is_err());
	}

	#[test]
	fn test_build_tracker_with_minimal_config() {
		let config: Config = r#"
[courier]
id = "test-courier"

[indexer]
primary = "esplora"
[indexer.implementations.esplora]
url = "https://blockstream.info/api"
"#
		.parse()
		.unwrap();

		let result = build_tracker_from_config(config);

		assert!(result.is_ok(), "Failed to build tracker: {:?}", result.err());

		let tracker = result.unwrap();
		assert_eq!(tracker.maturity_depth(), 6);
	}

	#[test]
	fn test_build_tracker_rejects_unknown_implementation() {
		let config: Config = r#"
[courier]
id = "test-courier"

[indexer]
primary = "mempool"
[indexer.implementations.mempool]
url = "https://mempool.example.com/api"
"#
		.parse()
		.unwrap();

		let err = build_tracker_from_config(config).unwrap_err();

		assert!(err
			.to_string()
			.contains("Unknown indexer implementation 'mempool'"));
	}

	#[tokio::test]
	async fn test_load_config_from_file() {
		let temp_dir = tempdir().expect("Failed to create temp dir");
		let config_path = temp_dir.path().join("test_config.toml");

		let config_content = r#"
[courier]
id = "test-file-courier"

[indexer]
primary = "esplora"
[indexer.implementations.esplora]
url = "https://blockstream.info/api"

[tracker]
poll_interval_secs = 30
maturity_depth = 3
timeout_minutes = 10
"#;

		std::fs::write(&config_path, config_content).expect("Failed to write config");

		let config = Config::from_file(&config_path.display().to_string())
			.await
			.expect("Failed to load config");

		assert_eq!(config.courier.id, "test-file-courier");
		assert_eq!(config.tracker.poll_interval_secs, 30);
		assert_eq!(config.tracker.maturity_depth, 3);
	}
}
