//! Capability traits for external collaborators.
//!
//! The engines have zero compile-time dependency on concrete chain clients,
//! databases, mailers or proof backends: everything external sits behind one
//! of these narrow interfaces. Trait methods are declared in the
//! `-> impl Future<Output = _> + Send` form so generic engine code can be
//! driven from multi-threaded executors; implementations use plain
//! `async fn`.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{ChainError, NotifyError, ProofError, StoreError};
use crate::records::{AutoDepositSchedule, Notification, Receipt, UserProfile, VaultRecord};
use crate::{Amount, UnixSeconds};

/// Read surface of the vault and factory contracts plus the ERC-20 token.
///
/// Mirrors the fixed contract interface: `purpose()`, `totalAssets()`,
/// `unlockTimestamp()`, `beneficiary()`, `GRACE_PERIOD()` per vault;
/// `getUserVaults(owner)`, `getAllVaults()` on the factory; `decimals()`,
/// `balanceOf()`, `allowance()` on the token.
pub trait ChainReader: Send + Sync {
  fn vault_purpose(&self, vault: &Address) -> impl Future<Output = Result<String, ChainError>> + Send;

  fn vault_balance(&self, vault: &Address) -> impl Future<Output = Result<Amount, ChainError>> + Send;

  fn vault_unlock_at(
    &self,
    vault: &Address,
  ) -> impl Future<Output = Result<UnixSeconds, ChainError>> + Send;

  /// Configured beneficiary; the on-chain zero address maps to `None`.
  fn vault_beneficiary(
    &self,
    vault: &Address,
  ) -> impl Future<Output = Result<Option<Address>, ChainError>> + Send;

  /// Grace period in seconds after maturity before a beneficiary may claim.
  fn vault_grace_period(
    &self,
    vault: &Address,
  ) -> impl Future<Output = Result<u64, ChainError>> + Send;

  /// Factory enumeration of an owner's vaults, in on-chain creation order.
  fn vaults_by_owner(
    &self,
    owner: &Address,
  ) -> impl Future<Output = Result<Vec<Address>, ChainError>> + Send;

  /// Factory enumeration of every vault ever created.
  fn all_vaults(&self) -> impl Future<Output = Result<Vec<Address>, ChainError>> + Send;

  fn token_decimals(&self) -> impl Future<Output = Result<u8, ChainError>> + Send;

  fn token_balance_of(
    &self,
    owner: &Address,
  ) -> impl Future<Output = Result<Amount, ChainError>> + Send;

  fn token_allowance(
    &self,
    owner: &Address,
    spender: &Address,
  ) -> impl Future<Output = Result<Amount, ChainError>> + Send;
}

/// Write surface of the contracts.
///
/// Every method resolves only once the transaction is confirmed; a mined but
/// reverted transaction surfaces as [`ChainError::Reverted`], so `Ok` always
/// means the on-chain effect happened.
pub trait ChainWriter: Send + Sync {
  /// ERC-20 approval of the factory (or vault) as spender.
  fn approve(
    &self,
    spender: &Address,
    amount: Amount,
  ) -> impl Future<Output = Result<String, ChainError>> + Send;

  /// Factory `createPersonalVault`; returns the new vault address and the
  /// creation transaction hash.
  fn create_personal_vault(
    &self,
    purpose: &str,
    unlock_at: UnixSeconds,
    penalty_bps: u32,
    amount: Amount,
    beneficiary: Option<&Address>,
  ) -> impl Future<Output = Result<(Address, String), ChainError>> + Send;

  fn deposit(
    &self,
    vault: &Address,
    amount: Amount,
  ) -> impl Future<Output = Result<String, ChainError>> + Send;

  fn withdraw(&self, vault: &Address) -> impl Future<Output = Result<String, ChainError>> + Send;

  /// Operator-initiated deposit from the owner's pre-approved allowance
  /// (factory `executeAutoDeposit`). Returns the transaction hash.
  fn execute_auto_deposit(
    &self,
    vault: &Address,
    amount: Amount,
  ) -> impl Future<Output = Result<String, ChainError>> + Send;

  /// Privileged release of a matured vault to its beneficiary.
  fn trigger_beneficiary_claim(
    &self,
    vault: &Address,
  ) -> impl Future<Output = Result<String, ChainError>> + Send;
}

/// Document store holding the ledger collections.
///
/// Every mutation is keyed by a normalized identifier (vault address,
/// schedule id, wallet address) so concurrent invocations converge instead
/// of corrupting: upserts are idempotent and the schedule claim is an atomic
/// conditional update.
pub trait LedgerStore: Send + Sync {
  fn vaults_by_owner(
    &self,
    owner: &Address,
  ) -> impl Future<Output = Result<Vec<VaultRecord>, StoreError>> + Send;

  fn all_vault_records(&self) -> impl Future<Output = Result<Vec<VaultRecord>, StoreError>> + Send;

  /// Insert a registry record unless one already exists for the vault
  /// address. Returns whether a write happened. Used by reconciler backfill
  /// so a placeholder can never clobber a full record.
  fn insert_vault_if_absent(
    &self,
    record: &VaultRecord,
  ) -> impl Future<Output = Result<bool, StoreError>> + Send;

  /// Insert or replace a registry record, keyed by vault address.
  fn upsert_vault(
    &self,
    record: &VaultRecord,
  ) -> impl Future<Output = Result<(), StoreError>> + Send;

  fn receipts_by_wallet(
    &self,
    wallet: &Address,
  ) -> impl Future<Output = Result<Vec<Receipt>, StoreError>> + Send;

  fn all_receipts(&self) -> impl Future<Output = Result<Vec<Receipt>, StoreError>> + Send;

  fn append_receipt(&self, receipt: &Receipt) -> impl Future<Output = Result<(), StoreError>> + Send;

  /// Attach an asynchronously issued external-proof id to a receipt. The
  /// only permitted mutation of a stored receipt.
  fn attach_proof(
    &self,
    receipt_id: &str,
    proof_id: &str,
  ) -> impl Future<Output = Result<(), StoreError>> + Send;

  /// All schedules with `active == true`. Due-ness is filtered in memory by
  /// the scheduler, not by the store.
  fn active_schedules(
    &self,
  ) -> impl Future<Output = Result<Vec<AutoDepositSchedule>, StoreError>> + Send;

  fn insert_schedule(
    &self,
    schedule: &AutoDepositSchedule,
  ) -> impl Future<Output = Result<(), StoreError>> + Send;

  /// Replace a schedule document, keyed by id.
  fn update_schedule(
    &self,
    schedule: &AutoDepositSchedule,
  ) -> impl Future<Output = Result<(), StoreError>> + Send;

  /// Atomic claim of a due schedule for this tick. Succeeds only if the
  /// schedule is still active, `next_run_at` still equals the value read at
  /// selection time, and no live claim exists (claims older than the stale
  /// threshold are reclaimable). On success the store stamps
  /// `claimed_at = now`.
  fn claim_due(
    &self,
    schedule_id: &str,
    expected_next_run_at: UnixSeconds,
    now: UnixSeconds,
  ) -> impl Future<Output = Result<bool, StoreError>> + Send;

  fn profile(
    &self,
    wallet: &Address,
  ) -> impl Future<Output = Result<Option<UserProfile>, StoreError>> + Send;

  fn profiles(&self) -> impl Future<Output = Result<Vec<UserProfile>, StoreError>> + Send;

  fn append_notification(
    &self,
    notification: &Notification,
  ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Email template selector, mirroring the external mailer's template set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailKind {
  DepositConfirmed,
  MaturityCountdown,
  GoalReminder,
  AutoDepositCancelled,
}

/// Template context for an outgoing email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
  pub to: String,
  pub purpose: String,
  pub amount: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tx_hash: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unlock_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub days_remaining: Option<i64>,
}

/// Outbound notification sink: in-app records and email dispatch.
///
/// Preference gating is the caller's job — an engine consults the user
/// profile before deciding to email; the notifier only delivers.
pub trait Notifier: Send + Sync {
  fn notify(
    &self,
    notification: &Notification,
  ) -> impl Future<Output = Result<(), NotifyError>> + Send;

  fn send_email(
    &self,
    kind: EmailKind,
    payload: &EmailPayload,
  ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// External verification-proof issuer for receipts.
pub trait ProofIssuer: Send + Sync {
  /// Issue a proof for a stored receipt, returning the external proof id.
  fn issue(&self, receipt: &Receipt) -> impl Future<Output = Result<String, ProofError>> + Send;
}
