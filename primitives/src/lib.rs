//! Shared primitives for the vaultkeeper engines.
//!
//! This crate is the single source of truth for identity handling (address
//! normalization), ledger record shapes, the capability traits behind which
//! all external collaborators sit, and system-wide tuning parameters.

pub mod address;
pub mod error;
pub mod params;
pub mod records;
#[cfg(feature = "testing")]
pub mod testing;
pub mod traits;
pub mod units;

pub use address::Address;
pub use error::{ChainError, NotifyError, ProofError, StoreError};
pub use records::{
  AutoDepositSchedule, Frequency, Notification, NotificationKind, NotificationPreferences,
  Receipt, ReceiptKind, UserProfile, VaultCategory, VaultRecord,
};
pub use traits::{ChainReader, ChainWriter, EmailKind, EmailPayload, LedgerStore, Notifier, ProofIssuer};

/// Unix timestamp in seconds.
///
/// The chain reports unlock times in unix seconds; every timestamp persisted
/// by the ledger uses the same unit so no call site ever converts.
pub type UnixSeconds = i64;

/// Token amount in base units (before decimal scaling).
pub type Amount = u128;
