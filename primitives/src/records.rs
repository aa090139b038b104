//! Ledger document shapes.
//!
//! Three record families form the side-channel ledger: vault registry
//! records, append-only receipts, and auto-deposit schedules. User profiles
//! and notification records ride along for the notification paths. All
//! timestamps are unix seconds and all address fields are [`Address`]es, so
//! normalization is guaranteed by construction.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::{Amount, UnixSeconds};

/// Registry entry for a vault. Keyed by the vault address.
///
/// The record may be lazily backfilled from chain enumeration after the
/// fact; in that case `purpose` carries a placeholder and `created_at` is
/// the backfill time, not the on-chain creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
  pub vault: Address,
  pub owner: Address,
  pub factory: Address,
  pub created_at: UnixSeconds,
  pub purpose: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_amount: Option<Amount>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub beneficiary: Option<Address>,
}

/// Why a receipt exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
  /// A deposit or vault creation (manual or auto-deposit)
  Created,
  /// Vault reached maturity and was withdrawn in full
  Completed,
  /// Vault was broken early, with a penalty
  Breaked,
}

/// Append-only transaction log entry.
///
/// Receipts are never mutated after the fact except to attach the id of an
/// asynchronously issued external proof, and never deleted. Balance remains
/// the source of truth for vault state; receipts are audit annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
  pub id: String,
  pub wallet: Address,
  pub vault: Address,
  pub tx_hash: String,
  pub timestamp: UnixSeconds,
  pub purpose: String,
  pub amount: Amount,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub penalty: Option<Amount>,
  pub verified: bool,
  pub kind: ReceiptKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub proof_id: Option<String>,
}

/// Cadence of a recurring auto-deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
  /// Test-only cadence: exactly 60 seconds, bypassing day/time placement
  Minutely,
  Daily,
  Weekly,
  Monthly,
}

/// Recurring auto-deposit schedule, 1:1 with a vault in the common case.
///
/// `execution_day` is a weekday (1-7) for weekly schedules or a day of
/// month (1-28) for monthly ones; it places the first run only. `claimed_at`
/// is the in-flight marker stamped by the atomic claim step so overlapping
/// scheduler invocations cannot double-execute one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoDepositSchedule {
  pub id: String,
  pub vault: Address,
  pub owner: Address,
  pub amount: Amount,
  pub frequency: Frequency,
  pub execution_day: u8,
  pub execution_time: NaiveTime,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_run_at: Option<UnixSeconds>,
  pub next_run_at: UnixSeconds,
  pub active: bool,
  pub failures: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub claimed_at: Option<UnixSeconds>,
}

/// Per-channel opt-outs for email delivery. In-app notifications are always
/// written; only email respects these flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
  pub deposits: bool,
  pub withdrawals: bool,
  pub maturity_warnings: bool,
}

impl Default for NotificationPreferences {
  fn default() -> Self {
    NotificationPreferences {
      deposits: true,
      withdrawals: true,
      maturity_warnings: true,
    }
  }
}

/// User profile document, keyed by wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  pub wallet: Address,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default)]
  pub preferences: NotificationPreferences,
  pub created_at: UnixSeconds,
  pub updated_at: UnixSeconds,
}

/// Severity of an in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
  Success,
  Warning,
  Info,
  Error,
}

/// In-app notification record for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub id: String,
  pub recipient: Address,
  pub title: String,
  pub message: String,
  pub kind: NotificationKind,
  pub timestamp: UnixSeconds,
  pub read: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub link: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub receipt_id: Option<String>,
}

/// Derived lifecycle category of a vault. Never persisted: it is a pure
/// function of (balance, unlock time, now) and recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultCategory {
  /// Balance > 0 and not yet past the unlock time
  Active,
  /// Balance > 0 and past the unlock time, not yet withdrawn
  Matured,
  /// Balance is zero: fully withdrawn or broken
  Completed,
}
