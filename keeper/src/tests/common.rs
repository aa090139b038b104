//! Shared fixtures for keeper integration tests.

use std::path::PathBuf;

use chrono::NaiveTime;
use uuid::Uuid;

use primitives::{
  Address, Amount, AutoDepositSchedule, Frequency, LedgerStore, NotificationPreferences,
  UserProfile, VaultRecord,
};

use crate::chain::{SnapshotChain, VaultState};
use crate::notify::StoreNotifier;
use crate::store::JsonStore;

/// 2023-11-14T22:13:20Z, a Tuesday.
pub const NOW: i64 = 1_700_000_000;

/// 2023-11-13T12:00:00Z, a Monday.
pub const MONDAY_NOON: i64 = 1_699_876_800;

pub const DEPOSIT_AMOUNT: Amount = 50_000_000;

pub fn addr(tag: &str) -> Address {
  Address::new(&format!("0x{tag:0<40}"))
}

pub fn owner() -> Address {
  addr("a11ce")
}

pub fn factory() -> Address {
  addr("fac")
}

pub fn nine_am() -> NaiveTime {
  NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

/// Deletes its file on drop so test runs leave no residue behind.
pub struct TempFile(pub PathBuf);

impl Drop for TempFile {
  fn drop(&mut self) {
    let _ = std::fs::remove_file(&self.0);
    let _ = std::fs::remove_file(self.0.with_extension("tmp"));
  }
}

pub fn temp_file(prefix: &str) -> TempFile {
  TempFile(std::env::temp_dir().join(format!("{prefix}-{}.json", Uuid::new_v4())))
}

pub struct Keeper {
  pub store: JsonStore,
  pub chain: SnapshotChain,
  pub notifier: StoreNotifier<JsonStore>,
  pub db_path: PathBuf,
  _db: TempFile,
  _snapshot: TempFile,
}

pub fn keeper() -> Keeper {
  let db = temp_file("vaultkeeper-db");
  let snapshot = temp_file("vaultkeeper-chain");
  let store = JsonStore::open(&db.0).unwrap();
  let chain = SnapshotChain::open(&snapshot.0).unwrap();
  let notifier = StoreNotifier::new(store.clone());
  Keeper { store, chain, notifier, db_path: db.0.clone(), _db: db, _snapshot: snapshot }
}

impl Keeper {
  /// Fresh store handle over the same file, proving persistence.
  pub fn reopen_store(&self) -> JsonStore {
    JsonStore::open(&self.db_path).unwrap()
  }
}

pub fn vault_state(owner: &Address, balance: Amount, unlock_at: i64) -> VaultState {
  VaultState {
    owner: owner.clone(),
    purpose: "Retirement".to_string(),
    balance,
    unlock_at,
    beneficiary: None,
    grace_period: 3_600,
  }
}

pub fn vault_record(vault: &Address, owner: &Address, created_at: i64) -> VaultRecord {
  VaultRecord {
    vault: vault.clone(),
    owner: owner.clone(),
    factory: factory(),
    created_at,
    purpose: "Retirement".to_string(),
    target_amount: None,
    beneficiary: None,
  }
}

pub fn daily_schedule(id: &str, vault: &Address, next_run_at: i64) -> AutoDepositSchedule {
  AutoDepositSchedule {
    id: id.to_string(),
    vault: vault.clone(),
    owner: owner(),
    amount: DEPOSIT_AMOUNT,
    frequency: Frequency::Daily,
    execution_day: 1,
    execution_time: nine_am(),
    last_run_at: None,
    next_run_at,
    active: true,
    failures: 0,
    claimed_at: None,
  }
}

pub fn profile(wallet: &Address, preferences: NotificationPreferences) -> UserProfile {
  UserProfile {
    wallet: wallet.clone(),
    email: Some("user@example.com".to_string()),
    preferences,
    created_at: NOW - 1_000_000,
    updated_at: NOW - 1_000_000,
  }
}

pub async fn seed_schedule(store: &JsonStore, schedule: &AutoDepositSchedule) {
  store.insert_schedule(schedule).await.unwrap();
}

pub async fn seed_vault_record(store: &JsonStore, record: &VaultRecord) {
  store.upsert_vault(record).await.unwrap();
}

/// Let fire-and-forget backfill tasks run to completion on the test runtime.
pub async fn settle() {
  for _ in 0..16 {
    tokio::task::yield_now().await;
  }
}
