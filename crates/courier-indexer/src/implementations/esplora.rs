//! Esplora-backed indexer implementation for the courier service.
//!
//! This module provides a concrete implementation of the IndexerInterface
//! trait against an Esplora-style REST API: transaction info by identifier,
//! chain tip height as a plain-text body, and raw transaction broadcast via
//! a hex-encoded POST body.

use crate::{IndexerError, IndexerInterface};
use async_trait::async_trait;
use courier_types::{
	ConfigSchema, Field, FieldType, RawTransaction, Schema, TipInfo, TransactionStatus, TxId,
};
use serde::Deserialize;
use std::time::Duration;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Esplora-based indexer implementation.
///
/// Issues one HTTP request per query against a configured base URL. All
/// timeouts live on the HTTP client, so the polling loop above never has to
/// bound individual requests itself.
pub struct EsploraIndexer {
	/// Base URL of the Esplora API, without a trailing slash.
	base_url: String,
	/// HTTP client carrying the per-request timeout.
	client: reqwest::Client,
}

/// Wire representation of the `status` object in a tx-info response.
#[derive(Debug, Deserialize)]
struct TxStatusBody {
	confirmed: bool,
	block_height: Option<u64>,
}

/// Wire representation of a tx-info response; only the status is read.
#[derive(Debug, Deserialize)]
struct TxInfoBody {
	status: TxStatusBody,
}

/// Converts a wire status into a domain snapshot.
///
/// Rejects snapshots that violate the confirmed/inclusion-height pairing,
/// so downstream depth computations never see a half-formed status.
fn status_from_wire(body: TxStatusBody) -> Result<TransactionStatus, IndexerError> {
	let status = TransactionStatus {
		confirmed: body.confirmed,
		inclusion_height: body.block_height,
	};

	if !status.is_consistent() {
		return Err(IndexerError::InvalidPayload(format!(
			"Status reports confirmed={} with inclusion height {:?}",
			status.confirmed, status.inclusion_height
		)));
	}

	Ok(status)
}

/// Parses the plain-text tip-height body.
fn parse_tip_body(body: &str) -> Result<TipInfo, IndexerError> {
	let height = body
		.trim()
		.parse::<u64>()
		.map_err(|_| IndexerError::InvalidPayload(format!("Unparsable tip height: {:?}", body)))?;

	Ok(TipInfo { height })
}

impl EsploraIndexer {
	/// Creates a new EsploraIndexer for the given base URL.
	///
	/// The timeout applies to every request issued by this instance.
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IndexerError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| {
				IndexerError::Configuration(format!("Failed to build HTTP client: {}", e))
			})?;

		Ok(Self {
			base_url: base_url.trim_end_matches('/').to_string(),
			client,
		})
	}

	/// URL of the tx-info endpoint for a transaction.
	fn tx_info_url(&self, tx_id: &TxId) -> String {
		format!("{}/tx/{}", self.base_url, tx_id)
	}

	/// URL of the tip-height endpoint.
	fn tip_height_url(&self) -> String {
		format!("{}/blocks/tip/height", self.base_url)
	}

	/// URL of the broadcast endpoint.
	fn broadcast_url(&self) -> String {
		format!("{}/tx", self.base_url)
	}
}

/// Configuration schema for the Esplora indexer implementation.
pub struct EsploraIndexerSchema;

impl EsploraIndexerSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), courier_types::ValidationError> {
		let instance = Self;
		instance.validate(config)
	}
}

impl ConfigSchema for EsploraIndexerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), courier_types::ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				let url = value.as_str().unwrap_or("");
				if url.starts_with("http://") || url.starts_with("https://") {
					Ok(())
				} else {
					Err("url must start with http:// or https://".to_string())
				}
			})],
			// Optional fields
			vec![Field::new(
				"timeout_secs",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl IndexerInterface for EsploraIndexer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EsploraIndexerSchema)
	}

	async fn broadcast(&self, tx: &RawTransaction) -> Result<TxId, IndexerError> {
		let response = self
			.client
			.post(self.broadcast_url())
			.body(tx.to_hex())
			.send()
			.await
			.map_err(|e| IndexerError::Transport(format!("Failed to broadcast: {}", e)))?;

		let status = response.status();
		if status.is_server_error() {
			let body = response.text().await.unwrap_or_default();
			return Err(IndexerError::Transport(format!(
				"Indexer returned {}: {}",
				status,
				body.trim()
			)));
		}
		if !status.is_success() {
			// Client errors carry the network's rejection reason in the body
			let body = response.text().await.unwrap_or_default();
			return Err(IndexerError::Rejected(format!(
				"{}: {}",
				status,
				body.trim()
			)));
		}

		let body = response
			.text()
			.await
			.map_err(|e| IndexerError::Transport(format!("Failed to read broadcast response: {}", e)))?;

		let tx_id = TxId::new(body.trim());
		tracing::debug!(tx_id = %tx_id, "Broadcast assigned identifier");

		Ok(tx_id)
	}

	async fn transaction_status(&self, tx_id: &TxId) -> Result<TransactionStatus, IndexerError> {
		let response = self
			.client
			.get(self.tx_info_url(tx_id))
			.send()
			.await
			.map_err(|e| {
				IndexerError::Transport(format!("Failed to fetch transaction status: {}", e))
			})?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(IndexerError::NotFound(tx_id.to_string()));
		}
		if !response.status().is_success() {
			let status = response.status();
			let body = response.text().await.unwrap_or_default();
			return Err(IndexerError::Transport(format!(
				"Indexer returned {}: {}",
				status,
				body.trim()
			)));
		}

		let info: TxInfoBody = response.json().await.map_err(|e| {
			IndexerError::InvalidPayload(format!("Undecodable transaction info: {}", e))
		})?;

		status_from_wire(info.status)
	}

	async fn tip(&self) -> Result<TipInfo, IndexerError> {
		let response = self
			.client
			.get(self.tip_height_url())
			.send()
			.await
			.map_err(|e| IndexerError::Transport(format!("Failed to fetch tip height: {}", e)))?;

		if !response.status().is_success() {
			let status = response.status();
			let body = response.text().await.unwrap_or_default();
			return Err(IndexerError::Transport(format!(
				"Indexer returned {}: {}",
				status,
				body.trim()
			)));
		}

		let body = response
			.text()
			.await
			.map_err(|e| IndexerError::Transport(format!("Failed to read tip response: {}", e)))?;

		parse_tip_body(&body)
	}
}

/// Factory function to create an Esplora indexer from configuration.
///
/// # Parameters
/// - `config`: TOML configuration containing:
///   - `url` (required): Base URL of the Esplora API
///   - `timeout_secs` (optional): Per-request timeout, default 30
///
/// # Returns
/// A boxed implementation of IndexerInterface backed by the configured API
pub fn create_indexer(config: &toml::Value) -> Result<Box<dyn IndexerInterface>, IndexerError> {
	// Validate configuration first
	EsploraIndexerSchema::validate_config(config)
		.map_err(|e| IndexerError::Configuration(format!("Invalid configuration: {}", e)))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| IndexerError::Configuration("url is required".to_string()))?;

	let timeout_secs = config
		.get("timeout_secs")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECS);

	let indexer = EsploraIndexer::new(url, Duration::from_secs(timeout_secs))?;

	Ok(Box::new(indexer))
}

/// Registry for the Esplora indexer implementation.
pub struct Registry;

impl courier_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "esplora";
	type Factory = crate::IndexerFactory;

	fn factory() -> Self::Factory {
		create_indexer
	}
}

impl crate::IndexerRegistry for Registry {}
