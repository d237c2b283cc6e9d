//! Indexer client module for the courier system.
//!
//! This module handles all communication with the third-party indexer that
//! the courier broadcasts through and polls for confirmation data. It
//! provides the interface abstraction over concrete indexer backends,
//! covering transaction broadcast, status lookup, and chain tip queries.

use async_trait::async_trait;
use courier_types::{
	ConfigSchema, ImplementationRegistry, RawTransaction, TipInfo, TransactionStatus, TxId,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod esplora;
}

/// Errors that can occur during indexer operations.
#[derive(Debug, Error)]
pub enum IndexerError {
	/// Error that occurs during network communication, timeouts, or
	/// server-side failures.
	#[error("Transport error: {0}")]
	Transport(String),
	/// Error that occurs when the indexer has no record of a transaction.
	///
	/// Distinct from an unconfirmed transaction: a transaction waiting in
	/// the pool returns a status with `confirmed == false`, while an
	/// identifier the indexer has never seen returns this error.
	#[error("Transaction not found: {0}")]
	NotFound(String),
	/// Error that occurs when the network rejects a broadcast payload.
	#[error("Broadcast rejected: {0}")]
	Rejected(String),
	/// Error that occurs when a response body cannot be interpreted.
	#[error("Invalid payload: {0}")]
	InvalidPayload(String),
	/// Error that occurs when an implementation cannot be built from
	/// its configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for indexer backends.
///
/// This trait must be implemented by any indexer backend that wants to
/// integrate with the courier. It provides the three queries the tracking
/// loop is built from: broadcast, status lookup, and tip height.
#[async_trait]
pub trait IndexerInterface: Send + Sync {
	/// Returns the configuration schema for this indexer implementation.
	///
	/// This allows each implementation to define its own configuration
	/// requirements with specific validation rules. The schema is used to
	/// validate TOML configuration before the backend is used.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Broadcasts a finalized transaction to the network.
	///
	/// Performs exactly one broadcast and returns the identifier the
	/// network assigned. Fails with [`IndexerError::Rejected`] when the
	/// indexer refuses the payload; the rejection reason reported by the
	/// indexer is carried in the error.
	async fn broadcast(&self, tx: &RawTransaction) -> Result<TxId, IndexerError>;

	/// Fetches a fresh status snapshot for a transaction.
	///
	/// Fails with [`IndexerError::NotFound`] when the indexer has no
	/// record of the identifier. An unconfirmed transaction that exists in
	/// the pool is not an error; it returns a snapshot with
	/// `confirmed == false`.
	async fn transaction_status(&self, tx_id: &TxId) -> Result<TransactionStatus, IndexerError>;

	/// Fetches the current chain tip height.
	///
	/// Never cached: every call issues a fresh query, since confirmation
	/// depth computations depend on tip freshness.
	async fn tip(&self) -> Result<TipInfo, IndexerError>;
}

/// Type alias for indexer factory functions.
///
/// This is the function signature that all indexer implementations must
/// provide to create instances of their backend from configuration.
pub type IndexerFactory = fn(&toml::Value) -> Result<Box<dyn IndexerInterface>, IndexerError>;

/// Registry trait for indexer implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// indexer implementations must provide an IndexerFactory.
pub trait IndexerRegistry: ImplementationRegistry<Factory = IndexerFactory> {}

/// Get all registered indexer implementations.
///
/// Returns a vector of (name, factory) tuples for all available indexer
/// implementations. This is used by the factory registry to automatically
/// register all implementations.
pub fn get_all_implementations() -> Vec<(&'static str, IndexerFactory)> {
	use implementations::esplora;

	vec![(esplora::Registry::NAME, esplora::Registry::factory())]
}

/// Service that wraps the configured indexer backend.
///
/// The IndexerService is the courier's single handle on the outside world.
/// It forwards the three backend queries and logs broadcasts, keeping the
/// tracking loop free of transport concerns.
pub struct IndexerService {
	/// The underlying indexer backend implementation.
	backend: Box<dyn IndexerInterface>,
}

impl IndexerService {
	/// Creates a new IndexerService with the specified backend.
	pub fn new(backend: Box<dyn IndexerInterface>) -> Self {
		Self { backend }
	}

	/// Broadcasts a finalized transaction and returns its identifier.
	pub async fn broadcast(&self, tx: &RawTransaction) -> Result<TxId, IndexerError> {
		let tx_id = self.backend.broadcast(tx).await?;
		tracing::info!(
			tx_id = %tx_id,
			payload_bytes = tx.len(),
			"Broadcast accepted"
		);
		Ok(tx_id)
	}

	/// Fetches a fresh status snapshot for a transaction.
	pub async fn transaction_status(&self, tx_id: &TxId) -> Result<TransactionStatus, IndexerError> {
		self.backend.transaction_status(tx_id).await
	}

	/// Fetches the current chain tip height.
	pub async fn tip(&self) -> Result<TipInfo, IndexerError> {
		self.backend.tip().await
	}
}
