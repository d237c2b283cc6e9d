//! Transaction lifecycle types for the courier system.
//!
//! This module defines types related to transaction broadcast and
//! confirmation tracking, including identifiers, status snapshots,
//! chain tip readings, and the tracking lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a transaction by the network.
///
/// Returned by the broadcast endpoint and used for every subsequent status
/// lookup. Treated as an opaque string: the courier never parses or rewrites
/// it, only passes it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxId(pub String);

impl TxId {
	/// Creates an identifier from anything string-like.
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TxId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A fully finalized, serialized transaction ready for broadcast.
///
/// Produced by an external signing collaborator; the courier only carries
/// the bytes to the broadcast endpoint. Stored as raw bytes with hex
/// conversion for wire formats that take a hex body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction(pub Vec<u8>);

impl RawTransaction {
	/// Decodes a raw transaction from its hex encoding.
	pub fn from_hex(encoded: &str) -> Result<Self, hex::FromHexError> {
		Ok(Self(hex::decode(encoded)?))
	}

	/// Returns the hex encoding accepted by broadcast endpoints.
	pub fn to_hex(&self) -> String {
		hex::encode(&self.0)
	}

	/// Returns the serialized payload size in bytes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if the payload is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Status snapshot of a transaction as reported by the indexer.
///
/// Each poll produces a fresh snapshot; snapshots are never mutated in
/// place. `inclusion_height` is present only once the transaction has been
/// included in a block. Invariant: `confirmed` is true exactly when
/// `inclusion_height` is present. The constructors uphold it; wire decoders
/// are expected to reject snapshots that violate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
	/// Whether the transaction has been included in a block.
	pub confirmed: bool,
	/// Height of the block that included the transaction, if any.
	pub inclusion_height: Option<u64>,
}

impl TransactionStatus {
	/// Snapshot of a transaction still waiting in the pool.
	pub fn unconfirmed() -> Self {
		Self {
			confirmed: false,
			inclusion_height: None,
		}
	}

	/// Snapshot of a transaction included at the given block height.
	pub fn confirmed_at(height: u64) -> Self {
		Self {
			confirmed: true,
			inclusion_height: Some(height),
		}
	}

	/// Whether the snapshot upholds the confirmed/inclusion-height invariant.
	pub fn is_consistent(&self) -> bool {
		self.confirmed == self.inclusion_height.is_some()
	}

	/// Confirmation depth of this snapshot relative to a chain tip.
	///
	/// Returns `tip − inclusion_height + 1` when the inclusion height is
	/// present, so a transaction in the tip block has depth 1. Returns 0
	/// while unconfirmed; 0 is the "not yet included" sentinel, not an
	/// error. A transient tip reading behind the inclusion height saturates
	/// to 0 instead of underflowing.
	pub fn confirmations_at(&self, tip: &TipInfo) -> u64 {
		match self.inclusion_height {
			Some(height) => tip.height.saturating_add(1).saturating_sub(height),
			None => 0,
		}
	}
}

/// Current best-known chain height as reported by the indexer.
///
/// Monotonically non-decreasing in a healthy network, but readings may
/// transiently regress; consumers must tolerate a stale tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipInfo {
	/// Height of the most recently known block.
	pub height: u64,
}

/// Phase of a tracked transaction's lifecycle.
///
/// Advances strictly forward while tracking: a transaction is submitted,
/// waits to be included in a block, then accumulates depth until the
/// maturity threshold. `Mature` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPhase {
	/// Broadcast accepted, tracking not yet started.
	Submitted,
	/// Polling until the transaction is included in a block.
	WaitingConfirmation,
	/// Included in a block, accumulating depth toward maturity.
	ConfirmedAwaitingMaturity,
	/// Reached the maturity threshold; tracking is complete.
	Mature,
}

impl TrackingPhase {
	/// Whether this phase ends the lifecycle.
	pub fn is_terminal(&self) -> bool {
		matches!(self, TrackingPhase::Mature)
	}
}

impl fmt::Display for TrackingPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TrackingPhase::Submitted => write!(f, "submitted"),
			TrackingPhase::WaitingConfirmation => write!(f, "waiting_confirmation"),
			TrackingPhase::ConfirmedAwaitingMaturity => write!(f, "confirmed_awaiting_maturity"),
			TrackingPhase::Mature => write!(f, "mature"),
		}
	}
}
