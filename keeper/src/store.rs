//! File-backed ledger store.
//!
//! One JSON document holds every collection. Writes happen under a
//! process-wide lock and persist through a temp file plus rename, so a
//! crash mid-write leaves the previous state intact. The keeper runs as a
//! single process per database file; cross-process locking is not attempted.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use primitives::params::CLAIM_STALE_AFTER_SECS;
use primitives::{
  Address, AutoDepositSchedule, LedgerStore, Notification, Receipt, StoreError, UnixSeconds,
  UserProfile, VaultRecord,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collections {
  #[serde(default)]
  vaults: std::collections::BTreeMap<Address, VaultRecord>,
  #[serde(default)]
  receipts: Vec<Receipt>,
  #[serde(default)]
  schedules: std::collections::BTreeMap<String, AutoDepositSchedule>,
  #[serde(default)]
  profiles: std::collections::BTreeMap<Address, UserProfile>,
  #[serde(default)]
  notifications: Vec<Notification>,
}

#[derive(Clone)]
pub struct JsonStore {
  path: PathBuf,
  state: Arc<RwLock<Collections>>,
}

impl JsonStore {
  /// Open a store, creating an empty one when the file does not exist.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    let state = if path.exists() {
      let raw = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
      serde_json::from_str(&raw).map_err(|e| StoreError::Codec(e.to_string()))?
    } else {
      Collections::default()
    };
    Ok(JsonStore { path: path.to_path_buf(), state: Arc::new(RwLock::new(state)) })
  }

  fn persist(&self, state: &Collections) -> Result<(), StoreError> {
    let raw = serde_json::to_string_pretty(state).map_err(|e| StoreError::Codec(e.to_string()))?;
    let tmp = self.path.with_extension("tmp");
    fs::write(&tmp, raw).map_err(|e| StoreError::Io(e.to_string()))?;
    fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io(e.to_string()))
  }

  fn mutate<T>(
    &self,
    f: impl FnOnce(&mut Collections) -> Result<T, StoreError>,
  ) -> Result<T, StoreError> {
    let mut state = self.state.write();
    let value = f(&mut state)?;
    self.persist(&state)?;
    Ok(value)
  }
}

impl LedgerStore for JsonStore {
  async fn vaults_by_owner(&self, owner: &Address) -> Result<Vec<VaultRecord>, StoreError> {
    let state = self.state.read();
    let mut records: Vec<VaultRecord> =
      state.vaults.values().filter(|v| &v.owner == owner).cloned().collect();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
  }

  async fn all_vault_records(&self) -> Result<Vec<VaultRecord>, StoreError> {
    Ok(self.state.read().vaults.values().cloned().collect())
  }

  async fn insert_vault_if_absent(&self, record: &VaultRecord) -> Result<bool, StoreError> {
    self.mutate(|state| {
      if state.vaults.contains_key(&record.vault) {
        return Ok(false);
      }
      state.vaults.insert(record.vault.clone(), record.clone());
      Ok(true)
    })
  }

  async fn upsert_vault(&self, record: &VaultRecord) -> Result<(), StoreError> {
    self.mutate(|state| {
      state.vaults.insert(record.vault.clone(), record.clone());
      Ok(())
    })
  }

  async fn receipts_by_wallet(&self, wallet: &Address) -> Result<Vec<Receipt>, StoreError> {
    let state = self.state.read();
    let mut receipts: Vec<Receipt> =
      state.receipts.iter().filter(|r| &r.wallet == wallet).cloned().collect();
    receipts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(receipts)
  }

  async fn all_receipts(&self) -> Result<Vec<Receipt>, StoreError> {
    Ok(self.state.read().receipts.clone())
  }

  async fn append_receipt(&self, receipt: &Receipt) -> Result<(), StoreError> {
    self.mutate(|state| {
      state.receipts.push(receipt.clone());
      Ok(())
    })
  }

  async fn attach_proof(&self, receipt_id: &str, proof_id: &str) -> Result<(), StoreError> {
    self.mutate(|state| {
      let receipt = state
        .receipts
        .iter_mut()
        .find(|r| r.id == receipt_id)
        .ok_or_else(|| StoreError::NotFound { collection: "receipts", key: receipt_id.into() })?;
      receipt.proof_id = Some(proof_id.to_string());
      Ok(())
    })
  }

  async fn active_schedules(&self) -> Result<Vec<AutoDepositSchedule>, StoreError> {
    Ok(self.state.read().schedules.values().filter(|s| s.active).cloned().collect())
  }

  async fn insert_schedule(&self, schedule: &AutoDepositSchedule) -> Result<(), StoreError> {
    self.mutate(|state| {
      state.schedules.insert(schedule.id.clone(), schedule.clone());
      Ok(())
    })
  }

  async fn update_schedule(&self, schedule: &AutoDepositSchedule) -> Result<(), StoreError> {
    self.mutate(|state| {
      if !state.schedules.contains_key(&schedule.id) {
        return Err(StoreError::NotFound { collection: "schedules", key: schedule.id.clone() });
      }
      state.schedules.insert(schedule.id.clone(), schedule.clone());
      Ok(())
    })
  }

  async fn claim_due(
    &self,
    schedule_id: &str,
    expected_next_run_at: UnixSeconds,
    now: UnixSeconds,
  ) -> Result<bool, StoreError> {
    self.mutate(|state| {
      let schedule = state
        .schedules
        .get_mut(schedule_id)
        .ok_or_else(|| StoreError::NotFound { collection: "schedules", key: schedule_id.into() })?;
      if !schedule.active || schedule.next_run_at != expected_next_run_at {
        return Ok(false);
      }
      if let Some(claimed_at) = schedule.claimed_at {
        if now - claimed_at < CLAIM_STALE_AFTER_SECS {
          return Ok(false);
        }
      }
      schedule.claimed_at = Some(now);
      Ok(true)
    })
  }

  async fn profile(&self, wallet: &Address) -> Result<Option<UserProfile>, StoreError> {
    Ok(self.state.read().profiles.get(wallet).cloned())
  }

  async fn profiles(&self) -> Result<Vec<UserProfile>, StoreError> {
    Ok(self.state.read().profiles.values().cloned().collect())
  }

  async fn append_notification(&self, notification: &Notification) -> Result<(), StoreError> {
    self.mutate(|state| {
      state.notifications.push(notification.clone());
      Ok(())
    })
  }
}

impl JsonStore {
  /// Insert or replace a profile document, keyed by wallet.
  pub fn put_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
    self.mutate(|state| {
      state.profiles.insert(profile.wallet.clone(), profile.clone());
      Ok(())
    })
  }

  pub fn notifications(&self) -> Vec<Notification> {
    self.state.read().notifications.clone()
  }
}
