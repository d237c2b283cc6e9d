//! Confirmation tracking module for the courier system.
//!
//! This module implements the courier's core state machine: a transaction is
//! broadcast, waits to be included in a block, then accumulates confirmation
//! depth until it reaches the configured maturity threshold. The tracking
//! loop polls the indexer at a fixed interval, recomputing depth from fresh
//! status and tip snapshots on every iteration.

mod builder;

use courier_indexer::{IndexerError, IndexerService};
use courier_types::{truncate_id, RawTransaction, TrackingPhase, TxId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

pub use builder::{BuildError, CourierBuilder, CourierFactories};

/// Errors that can occur during confirmation tracking.
#[derive(Debug, Error)]
pub enum TrackerError {
	/// Indexer query failure, propagated with the original cause intact.
	///
	/// Nothing is retried inside the tracking loop: the first failed query
	/// aborts the enclosing wait and surfaces here unchanged.
	#[error(transparent)]
	Indexer(#[from] IndexerError),
	/// The configured deadline elapsed before the target phase was reached.
	#[error("Deadline exceeded after {waited_secs}s in phase {phase}")]
	DeadlineExceeded {
		phase: TrackingPhase,
		waited_secs: u64,
	},
}

/// Deadline covering one wait call from start to finish.
///
/// A limit of `None` means the caller opted out of bounded waiting and the
/// loop polls until the target phase is reached or a query fails.
struct Deadline {
	started: tokio::time::Instant,
	limit: Option<Duration>,
}

impl Deadline {
	fn start(limit: Option<Duration>) -> Self {
		Self {
			started: tokio::time::Instant::now(),
			limit,
		}
	}

	fn check(&self, phase: TrackingPhase) -> Result<(), TrackerError> {
		if let Some(limit) = self.limit {
			if self.started.elapsed() > limit {
				return Err(TrackerError::DeadlineExceeded {
					phase,
					waited_secs: self.started.elapsed().as_secs(),
				});
			}
		}
		Ok(())
	}
}

/// Service that tracks transactions through confirmation and maturity.
///
/// The TrackerService owns the polling loop. Each tracked transaction runs
/// one sequential loop instance; instances share no mutable state, so any
/// number of transactions can be tracked concurrently from the same
/// `Arc`-shared service. Per-request timeouts belong to the indexer backend;
/// the only pacing here is the fixed poll interval.
pub struct TrackerService {
	/// Indexer handle used for status and tip queries.
	indexer: Arc<IndexerService>,
	/// Fixed pause between poll iterations, shared by both wait phases.
	poll_interval: Duration,
	/// Confirmation depth at which a transaction counts as mature.
	maturity_depth: u64,
	/// Wall-clock bound on a single wait call, or None for unbounded waiting.
	wait_timeout: Option<Duration>,
}

// Manual impl: the indexer handle holds a non-`Debug` trait object, so the
// derive is unavailable; the policy fields are the useful part anyway.
impl std::fmt::Debug for TrackerService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TrackerService")
			.field("poll_interval", &self.poll_interval)
			.field("maturity_depth", &self.maturity_depth)
			.field("wait_timeout", &self.wait_timeout)
			.finish_non_exhaustive()
	}
}

impl TrackerService {
	/// Creates a new TrackerService polling the given indexer.
	pub fn new(
		indexer: Arc<IndexerService>,
		poll_interval: Duration,
		maturity_depth: u64,
		wait_timeout: Option<Duration>,
	) -> Self {
		Self {
			indexer,
			poll_interval,
			maturity_depth,
			wait_timeout,
		}
	}

	/// Pause between poll iterations.
	pub fn poll_interval(&self) -> Duration {
		self.poll_interval
	}

	/// Confirmation depth at which tracking completes.
	pub fn maturity_depth(&self) -> u64 {
		self.maturity_depth
	}

	/// Wall-clock bound on a single wait call, if one is configured.
	pub fn wait_timeout(&self) -> Option<Duration> {
		self.wait_timeout
	}

	/// Whether the latest status snapshot reports the transaction confirmed.
	pub async fn is_confirmed(&self, tx_id: &TxId) -> Result<bool, TrackerError> {
		let status = self.indexer.transaction_status(tx_id).await?;
		Ok(status.confirmed)
	}

	/// Current confirmation depth of a transaction.
	///
	/// Fetches a fresh status snapshot and a fresh tip reading for every
	/// call and derives the depth from the pair. Returns 0 while the
	/// transaction is unconfirmed; 0 is the "not yet included" sentinel,
	/// not an error.
	pub async fn confirmations(&self, tx_id: &TxId) -> Result<u64, TrackerError> {
		let status = self.indexer.transaction_status(tx_id).await?;
		let tip = self.indexer.tip().await?;
		Ok(status.confirmations_at(&tip))
	}

	/// Waits until the transaction is included in a block.
	///
	/// Polls at the configured interval; any query failure aborts the wait
	/// immediately with the cause intact. Returns the identifier once the
	/// transaction is confirmed.
	#[instrument(skip_all, fields(tx_id = %truncate_id(tx_id.as_str())))]
	pub async fn wait_for_confirmation(&self, tx_id: &TxId) -> Result<TxId, TrackerError> {
		let deadline = Deadline::start(self.wait_timeout);
		self.run_confirmation_phase(tx_id, &deadline).await?;
		Ok(tx_id.clone())
	}

	/// Waits until the transaction reaches the maturity depth.
	///
	/// Sequences the two wait phases: first until the transaction is
	/// confirmed, then until its depth reaches the configured threshold.
	/// One deadline spans both phases. Returns the identifier once mature.
	#[instrument(skip_all, fields(tx_id = %truncate_id(tx_id.as_str())))]
	pub async fn wait_for_maturity(&self, tx_id: &TxId) -> Result<TxId, TrackerError> {
		let deadline = Deadline::start(self.wait_timeout);

		self.run_confirmation_phase(tx_id, &deadline).await?;
		tracing::info!(
			phase = %TrackingPhase::ConfirmedAwaitingMaturity,
			maturity_depth = self.maturity_depth,
			"Now waiting for transaction to mature"
		);
		let confirmations = self.run_maturity_phase(tx_id, &deadline).await?;
		tracing::info!(
			phase = %TrackingPhase::Mature,
			confirmations,
			"Transaction reached maturity depth"
		);

		Ok(tx_id.clone())
	}

	/// Broadcasts a transaction and tracks it to maturity.
	///
	/// Convenience composition of broadcast and [`wait_for_maturity`]:
	/// the identifier assigned by the network is returned once the
	/// transaction is mature.
	///
	/// [`wait_for_maturity`]: TrackerService::wait_for_maturity
	pub async fn submit_and_track(&self, tx: &RawTransaction) -> Result<TxId, TrackerError> {
		let tx_id = self.indexer.broadcast(tx).await?;
		tracing::info!(
			tx_id = %tx_id,
			phase = %TrackingPhase::Submitted,
			"Tracking submitted transaction"
		);
		self.wait_for_maturity(&tx_id).await
	}

	/// First wait phase: poll until the status snapshot reports confirmed.
	///
	/// Checks once before any sleep, so an already-confirmed transaction
	/// completes without waiting a poll interval.
	async fn run_confirmation_phase(
		&self,
		tx_id: &TxId,
		deadline: &Deadline,
	) -> Result<(), TrackerError> {
		let mut confirmed = self.is_confirmed(tx_id).await?;

		while !confirmed {
			deadline.check(TrackingPhase::WaitingConfirmation)?;

			tracing::info!(
				interval_secs = self.poll_interval.as_secs(),
				"Waiting for transaction to be confirmed"
			);
			tokio::time::sleep(self.poll_interval).await;

			confirmed = self.is_confirmed(tx_id).await?;
		}

		tracing::info!("Transaction confirmed");
		Ok(())
	}

	/// Second wait phase: poll until the depth reaches the maturity threshold.
	///
	/// Depth is recomputed from a fresh status and tip pair on every
	/// iteration, so a transaction evicted by a reorg drops back to 0 and
	/// the loop keeps waiting for re-inclusion instead of maturing on
	/// stale data.
	async fn run_maturity_phase(
		&self,
		tx_id: &TxId,
		deadline: &Deadline,
	) -> Result<u64, TrackerError> {
		let mut confirmations = self.confirmations(tx_id).await?;
		let mut highest_seen = confirmations;

		while confirmations < self.maturity_depth {
			deadline.check(TrackingPhase::ConfirmedAwaitingMaturity)?;

			if highest_seen > 0 && confirmations == 0 {
				tracing::warn!(
					"Transaction no longer confirmed, possible reorg; continuing to wait"
				);
			} else {
				tracing::info!(
					confirmations,
					maturity_depth = self.maturity_depth,
					interval_secs = self.poll_interval.as_secs(),
					"Still accumulating confirmations"
				);
			}
			tokio::time::sleep(self.poll_interval).await;

			confirmations = self.confirmations(tx_id).await?;
			if confirmations > highest_seen {
				highest_seen = confirmations;
			}
		}

		Ok(confirmations)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use courier_indexer::IndexerInterface;
	use courier_types::{ConfigSchema, TipInfo, TransactionStatus, ValidationError};
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	/// One scripted response for the status endpoint.
	enum StatusStep {
		Snapshot(TransactionStatus),
		NotFound,
		Transport,
	}

	#[derive(Default)]
	struct ScriptState {
		statuses: Mutex<VecDeque<StatusStep>>,
		last_status: Mutex<Option<TransactionStatus>>,
		tips: Mutex<VecDeque<u64>>,
		last_tip: Mutex<u64>,
		status_calls: AtomicUsize,
		tip_calls: AtomicUsize,
		seen_ids: Mutex<Vec<String>>,
	}

	struct NoopSchema;

	#[async_trait]
	impl ConfigSchema for NoopSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	/// Indexer backend driven by scripted responses.
	///
	/// Status snapshots and tip heights are consumed front to back; when a
	/// script runs out, the last value repeats, mirroring an indexer whose
	/// backing data stopped changing.
	struct ScriptedIndexer {
		state: Arc<ScriptState>,
		broadcast_id: String,
	}

	#[async_trait]
	impl IndexerInterface for ScriptedIndexer {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoopSchema)
		}

		async fn broadcast(
			&self,
			_tx: &RawTransaction,
		) -> Result<TxId, IndexerError> {
			Ok(TxId::new(self.broadcast_id.clone()))
		}

		async fn transaction_status(
			&self,
			tx_id: &TxId,
		) -> Result<TransactionStatus, IndexerError> {
			self.state.seen_ids.lock().unwrap().push(tx_id.to_string());
			self.state.status_calls.fetch_add(1, Ordering::SeqCst);

			match self.state.statuses.lock().unwrap().pop_front() {
				Some(StatusStep::Snapshot(status)) => {
					*self.state.last_status.lock().unwrap() = Some(status);
					Ok(status)
				},
				Some(StatusStep::NotFound) => Err(IndexerError::NotFound(tx_id.to_string())),
				Some(StatusStep::Transport) => {
					Err(IndexerError::Transport("connection reset".to_string()))
				},
				None => self
					.state
					.last_status
					.lock()
					.unwrap()
					.ok_or_else(|| IndexerError::NotFound(tx_id.to_string())),
			}
		}

		async fn tip(&self) -> Result<TipInfo, IndexerError> {
			self.state.tip_calls.fetch_add(1, Ordering::SeqCst);

			match self.state.tips.lock().unwrap().pop_front() {
				Some(height) => {
					*self.state.last_tip.lock().unwrap() = height;
					Ok(TipInfo { height })
				},
				None => Ok(TipInfo {
					height: *self.state.last_tip.lock().unwrap(),
				}),
			}
		}
	}

	fn scripted_tracker(
		statuses: Vec<StatusStep>,
		tips: Vec<u64>,
		timeout: Option<Duration>,
	) -> (TrackerService, Arc<ScriptState>) {
		let state = Arc::new(ScriptState {
			statuses: Mutex::new(statuses.into()),
			tips: Mutex::new(tips.into()),
			..Default::default()
		});
		let backend = ScriptedIndexer {
			state: state.clone(),
			broadcast_id: "abc123".to_string(),
		};
		let tracker = TrackerService::new(
			Arc::new(IndexerService::new(Box::new(backend))),
			Duration::from_secs(15),
			6,
			timeout,
		);
		(tracker, state)
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirmation_wait_polls_until_confirmed() {
		let (tracker, state) = scripted_tracker(
			vec![
				StatusStep::Snapshot(TransactionStatus::unconfirmed()),
				StatusStep::Snapshot(TransactionStatus::unconfirmed()),
				StatusStep::Snapshot(TransactionStatus::unconfirmed()),
				StatusStep::Snapshot(TransactionStatus::confirmed_at(100)),
			],
			vec![100],
			None,
		);

		let tx_id = TxId::new("abc123");
		let returned = tracker.wait_for_confirmation(&tx_id).await.unwrap();

		assert_eq!(returned, tx_id);
		// Three unconfirmed reads then the confirming one, no extra polls
		assert_eq!(state.status_calls.load(Ordering::SeqCst), 4);

		// The snapshot that confirmed it sits one block below the tip
		assert_eq!(tracker.confirmations(&tx_id).await.unwrap(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_maturity_wait_exits_when_depth_reached() {
		let (tracker, state) = scripted_tracker(
			vec![StatusStep::Snapshot(TransactionStatus::confirmed_at(100))],
			vec![100, 102, 104, 105],
			None,
		);

		let tx_id = TxId::new("abc123");
		let returned = tracker.wait_for_maturity(&tx_id).await.unwrap();

		assert_eq!(returned, tx_id);
		// Depth sequence 1, 3, 5, 6: the loop exits exactly when 6 is reached
		assert_eq!(state.tip_calls.load(Ordering::SeqCst), 4);
		// One confirmation-phase read plus one status read per depth check
		assert_eq!(state.status_calls.load(Ordering::SeqCst), 5);
	}

	#[tokio::test(start_paused = true)]
	async fn test_already_mature_transaction_returns_without_sleeping() {
		let (tracker, state) = scripted_tracker(
			vec![StatusStep::Snapshot(TransactionStatus::confirmed_at(100))],
			vec![110],
			Some(Duration::from_secs(1)),
		);

		let tx_id = TxId::new("abc123");
		tracker.wait_for_maturity(&tx_id).await.unwrap();

		assert_eq!(state.status_calls.load(Ordering::SeqCst), 2);
		assert_eq!(state.tip_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_unknown_transaction_aborts_wait() {
		let (tracker, state) = scripted_tracker(vec![StatusStep::NotFound], vec![], None);

		let err = tracker
			.wait_for_maturity(&TxId::new("does-not-exist"))
			.await
			.unwrap_err();

		assert!(matches!(
			err,
			TrackerError::Indexer(IndexerError::NotFound(ref id)) if id == "does-not-exist"
		));
		// The loop aborts on the first query instead of polling forever
		assert_eq!(state.status_calls.load(Ordering::SeqCst), 1);
		assert!(err.to_string().contains("not found"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_transport_failure_surfaces_original_cause() {
		let (tracker, state) = scripted_tracker(
			vec![
				StatusStep::Snapshot(TransactionStatus::unconfirmed()),
				StatusStep::Transport,
			],
			vec![],
			None,
		);

		let err = tracker
			.wait_for_confirmation(&TxId::new("abc123"))
			.await
			.unwrap_err();

		assert!(matches!(
			err,
			TrackerError::Indexer(IndexerError::Transport(ref msg)) if msg == "connection reset"
		));
		assert_eq!(err.to_string(), "Transport error: connection reset");
		assert_eq!(state.status_calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_submit_and_track_passes_identifier_through() {
		let (tracker, state) = scripted_tracker(
			vec![StatusStep::Snapshot(TransactionStatus::confirmed_at(100))],
			vec![105],
			None,
		);

		let raw = RawTransaction::from_hex("0200deadbeef").unwrap();
		let tx_id = tracker.submit_and_track(&raw).await.unwrap();

		assert_eq!(tx_id, TxId::new("abc123"));
		// Every status lookup used the identifier the broadcast assigned
		let seen = state.seen_ids.lock().unwrap();
		assert!(!seen.is_empty());
		assert!(seen.iter().all(|id| id == "abc123"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_deadline_bounds_confirmation_wait() {
		let (tracker, _state) = scripted_tracker(
			vec![StatusStep::Snapshot(TransactionStatus::unconfirmed())],
			vec![],
			Some(Duration::from_secs(60)),
		);

		let err = tracker
			.wait_for_confirmation(&TxId::new("abc123"))
			.await
			.unwrap_err();

		match err {
			TrackerError::DeadlineExceeded { phase, waited_secs } => {
				assert_eq!(phase, TrackingPhase::WaitingConfirmation);
				assert!(waited_secs >= 60);
			},
			other => panic!("expected deadline error, got: {}", other),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_deadline_spans_both_phases() {
		let (tracker, _state) = scripted_tracker(
			vec![StatusStep::Snapshot(TransactionStatus::confirmed_at(100))],
			vec![100],
			Some(Duration::from_secs(60)),
		);

		let err = tracker
			.wait_for_maturity(&TxId::new("abc123"))
			.await
			.unwrap_err();

		assert!(matches!(
			err,
			TrackerError::DeadlineExceeded {
				phase: TrackingPhase::ConfirmedAwaitingMaturity,
				..
			}
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_reorg_regression_keeps_waiting() {
		let (tracker, state) = scripted_tracker(
			vec![
				StatusStep::Snapshot(TransactionStatus::confirmed_at(100)),
				StatusStep::Snapshot(TransactionStatus::confirmed_at(100)),
				StatusStep::Snapshot(TransactionStatus::unconfirmed()),
				StatusStep::Snapshot(TransactionStatus::confirmed_at(104)),
			],
			vec![102, 102, 104, 109],
			None,
		);

		let tx_id = TxId::new("abc123");
		let returned = tracker.wait_for_maturity(&tx_id).await.unwrap();

		assert_eq!(returned, tx_id);
		// Depth went 3, 0 (evicted), 1, 6: the regression extended the wait
		// but never produced a false maturity
		assert_eq!(state.status_calls.load(Ordering::SeqCst), 5);
		assert_eq!(state.tip_calls.load(Ordering::SeqCst), 4);
	}

	#[tokio::test(start_paused = true)]
	async fn test_monitor_queries_are_idempotent() {
		let (tracker, _state) = scripted_tracker(
			vec![StatusStep::Snapshot(TransactionStatus::confirmed_at(100))],
			vec![105],
			None,
		);

		let tx_id = TxId::new("abc123");
		assert_eq!(tracker.confirmations(&tx_id).await.unwrap(), 6);
		assert_eq!(tracker.confirmations(&tx_id).await.unwrap(), 6);
		assert!(tracker.is_confirmed(&tx_id).await.unwrap());
		assert!(tracker.is_confirmed(&tx_id).await.unwrap());
	}

	#[tokio::test(start_paused = true)]
	async fn test_unconfirmed_depth_is_zero_not_error() {
		let (tracker, _state) = scripted_tracker(
			vec![StatusStep::Snapshot(TransactionStatus::unconfirmed())],
			vec![400],
			None,
		);

		let depth = tracker.confirmations(&TxId::new("abc123")).await.unwrap();
		assert_eq!(depth, 0);
	}
}
