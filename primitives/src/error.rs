use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the chain collaborator.
///
/// The scheduler treats these differently: a revert counts as an execution
/// failure against the bounded-retry policy, while RPC errors and timeouts
/// are transient and simply retried on the next tick.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
  /// Transport-level failure talking to the RPC endpoint
  #[error("rpc error: {0}")]
  Rpc(String),
  /// Transaction was mined but reverted (allowance, balance, authorization)
  #[error("transaction reverted: {0}")]
  Reverted(String),
  /// Bounded per-call timeout elapsed before the endpoint answered
  #[error("chain call timed out after {0:?}")]
  Timeout(Duration),
}

/// Failures surfaced by the ledger store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
  /// Underlying storage I/O failed
  #[error("store i/o error: {0}")]
  Io(String),
  /// Document failed to encode or decode
  #[error("store codec error: {0}")]
  Codec(String),
  /// Document addressed by an update does not exist
  #[error("no {collection} document with key {key}")]
  NotFound { collection: &'static str, key: String },
}

/// Failure delivering a notification or email.
#[derive(Debug, Clone, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Failure issuing an external verification proof for a receipt.
#[derive(Debug, Clone, Error)]
#[error("proof issuance failed: {0}")]
pub struct ProofError(pub String);
