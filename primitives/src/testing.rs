//! In-memory collaborators for engine tests.
//!
//! Enabled via the `testing` feature and used as dev-dependencies by the
//! engine crates: a full [`LedgerStore`] over maps, a scriptable chain with
//! failure injection and call recording, and a recording notifier.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::address::Address;
use crate::error::{ChainError, NotifyError, ProofError, StoreError};
use crate::params::CLAIM_STALE_AFTER_SECS;
use crate::records::{AutoDepositSchedule, Notification, Receipt, UserProfile, VaultRecord};
use crate::traits::{
  ChainReader, ChainWriter, EmailKind, EmailPayload, LedgerStore, Notifier, ProofIssuer,
};
use crate::{Amount, UnixSeconds};

#[derive(Default)]
struct MemStoreInner {
  vaults: Vec<VaultRecord>,
  receipts: Vec<Receipt>,
  schedules: BTreeMap<String, AutoDepositSchedule>,
  profiles: BTreeMap<Address, UserProfile>,
  notifications: Vec<Notification>,
  vault_inserts: u32,
  fail_reads: bool,
}

/// In-memory [`LedgerStore`] with write counters for idempotence tests.
#[derive(Clone, Default)]
pub struct MemStore {
  inner: Arc<Mutex<MemStoreInner>>,
}

impl MemStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_vault(&self, record: VaultRecord) {
    self.inner.lock().vaults.push(record);
  }

  pub fn add_schedule(&self, schedule: AutoDepositSchedule) {
    self.inner.lock().schedules.insert(schedule.id.clone(), schedule);
  }

  pub fn add_profile(&self, profile: UserProfile) {
    self.inner.lock().profiles.insert(profile.wallet.clone(), profile);
  }

  pub fn add_receipt(&self, receipt: Receipt) {
    self.inner.lock().receipts.push(receipt);
  }

  /// Make every query return `StoreError::Io` until cleared.
  pub fn set_fail_reads(&self, fail: bool) {
    self.inner.lock().fail_reads = fail;
  }

  pub fn schedule(&self, id: &str) -> Option<AutoDepositSchedule> {
    self.inner.lock().schedules.get(id).cloned()
  }

  pub fn notifications(&self) -> Vec<Notification> {
    self.inner.lock().notifications.clone()
  }

  pub fn receipts(&self) -> Vec<Receipt> {
    self.inner.lock().receipts.clone()
  }

  pub fn vault_records(&self) -> Vec<VaultRecord> {
    self.inner.lock().vaults.clone()
  }

  /// Number of registry inserts that actually wrote a document.
  pub fn vault_insert_count(&self) -> u32 {
    self.inner.lock().vault_inserts
  }

  fn guard_reads(inner: &MemStoreInner) -> Result<(), StoreError> {
    if inner.fail_reads {
      Err(StoreError::Io("injected read failure".into()))
    } else {
      Ok(())
    }
  }
}

impl LedgerStore for MemStore {
  async fn vaults_by_owner(&self, owner: &Address) -> Result<Vec<VaultRecord>, StoreError> {
    let inner = self.inner.lock();
    Self::guard_reads(&inner)?;
    let mut records: Vec<VaultRecord> =
      inner.vaults.iter().filter(|v| &v.owner == owner).cloned().collect();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
  }

  async fn all_vault_records(&self) -> Result<Vec<VaultRecord>, StoreError> {
    let inner = self.inner.lock();
    Self::guard_reads(&inner)?;
    Ok(inner.vaults.clone())
  }

  async fn insert_vault_if_absent(&self, record: &VaultRecord) -> Result<bool, StoreError> {
    let mut inner = self.inner.lock();
    if inner.vaults.iter().any(|v| v.vault == record.vault) {
      return Ok(false);
    }
    inner.vaults.push(record.clone());
    inner.vault_inserts += 1;
    Ok(true)
  }

  async fn upsert_vault(&self, record: &VaultRecord) -> Result<(), StoreError> {
    let mut inner = self.inner.lock();
    if let Some(existing) = inner.vaults.iter_mut().find(|v| v.vault == record.vault) {
      *existing = record.clone();
    } else {
      inner.vaults.push(record.clone());
      inner.vault_inserts += 1;
    }
    Ok(())
  }

  async fn receipts_by_wallet(&self, wallet: &Address) -> Result<Vec<Receipt>, StoreError> {
    let inner = self.inner.lock();
    Self::guard_reads(&inner)?;
    let mut receipts: Vec<Receipt> =
      inner.receipts.iter().filter(|r| &r.wallet == wallet).cloned().collect();
    receipts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(receipts)
  }

  async fn all_receipts(&self) -> Result<Vec<Receipt>, StoreError> {
    let inner = self.inner.lock();
    Self::guard_reads(&inner)?;
    Ok(inner.receipts.clone())
  }

  async fn append_receipt(&self, receipt: &Receipt) -> Result<(), StoreError> {
    self.inner.lock().receipts.push(receipt.clone());
    Ok(())
  }

  async fn attach_proof(&self, receipt_id: &str, proof_id: &str) -> Result<(), StoreError> {
    let mut inner = self.inner.lock();
    let receipt = inner
      .receipts
      .iter_mut()
      .find(|r| r.id == receipt_id)
      .ok_or_else(|| StoreError::NotFound { collection: "receipts", key: receipt_id.into() })?;
    receipt.proof_id = Some(proof_id.to_string());
    Ok(())
  }

  async fn active_schedules(&self) -> Result<Vec<AutoDepositSchedule>, StoreError> {
    let inner = self.inner.lock();
    Self::guard_reads(&inner)?;
    Ok(inner.schedules.values().filter(|s| s.active).cloned().collect())
  }

  async fn insert_schedule(&self, schedule: &AutoDepositSchedule) -> Result<(), StoreError> {
    self.inner.lock().schedules.insert(schedule.id.clone(), schedule.clone());
    Ok(())
  }

  async fn update_schedule(&self, schedule: &AutoDepositSchedule) -> Result<(), StoreError> {
    let mut inner = self.inner.lock();
    if !inner.schedules.contains_key(&schedule.id) {
      return Err(StoreError::NotFound { collection: "schedules", key: schedule.id.clone() });
    }
    inner.schedules.insert(schedule.id.clone(), schedule.clone());
    Ok(())
  }

  async fn claim_due(
    &self,
    schedule_id: &str,
    expected_next_run_at: UnixSeconds,
    now: UnixSeconds,
  ) -> Result<bool, StoreError> {
    let mut inner = self.inner.lock();
    let schedule = inner
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
  }

  async fn profile(&self, wallet: &Address) -> Result<Option<UserProfile>, StoreError> {
    Ok(self.inner.lock().profiles.get(wallet).cloned())
  }

  async fn profiles(&self) -> Result<Vec<UserProfile>, StoreError> {
    let inner = self.inner.lock();
    Self::guard_reads(&inner)?;
    Ok(inner.profiles.values().cloned().collect())
  }

  async fn append_notification(&self, notification: &Notification) -> Result<(), StoreError> {
    self.inner.lock().notifications.push(notification.clone());
    Ok(())
  }
}

/// On-chain state of one vault inside [`ScriptedChain`].
#[derive(Clone, Debug)]
pub struct ChainVault {
  pub owner: Address,
  pub purpose: String,
  pub balance: Amount,
  pub unlock_at: UnixSeconds,
  pub beneficiary: Option<Address>,
  pub grace_period: u64,
}

#[derive(Default)]
struct ScriptedChainInner {
  order: Vec<Address>,
  vaults: BTreeMap<Address, ChainVault>,
  decimals: u8,
  fail_enumeration: bool,
  fail_vault_reads: BTreeSet<Address>,
  deposit_reverts: BTreeMap<Address, u32>,
  hang_deposits: bool,
  deposit_calls: Vec<(Address, Amount)>,
  tx_counter: u64,
}

/// Scriptable [`ChainReader`] + [`ChainWriter`] with failure injection and
/// write recording, so tests can assert "zero chain writes happened".
#[derive(Clone)]
pub struct ScriptedChain {
  inner: Arc<Mutex<ScriptedChainInner>>,
}

impl Default for ScriptedChain {
  fn default() -> Self {
    let inner = ScriptedChainInner { decimals: 6, ..Default::default() };
    ScriptedChain { inner: Arc::new(Mutex::new(inner)) }
  }
}

impl ScriptedChain {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_vault(&self, address: Address, vault: ChainVault) {
    let mut inner = self.inner.lock();
    inner.order.push(address.clone());
    inner.vaults.insert(address, vault);
  }

  /// Make factory enumeration fail with an RPC error.
  pub fn set_fail_enumeration(&self, fail: bool) {
    self.inner.lock().fail_enumeration = fail;
  }

  /// Make every per-vault read of `vault` fail with an RPC error.
  pub fn fail_vault_reads(&self, vault: Address) {
    self.inner.lock().fail_vault_reads.insert(vault);
  }

  /// Revert the next `count` auto-deposits into `vault`.
  pub fn revert_next_deposits(&self, vault: Address, count: u32) {
    self.inner.lock().deposit_reverts.insert(vault, count);
  }

  /// Make auto-deposits hang forever, like an RPC that never confirms.
  pub fn hang_deposits(&self, hang: bool) {
    self.inner.lock().hang_deposits = hang;
  }

  /// Recorded `executeAutoDeposit` calls, in order.
  pub fn deposit_calls(&self) -> Vec<(Address, Amount)> {
    self.inner.lock().deposit_calls.clone()
  }

  pub fn balance(&self, vault: &Address) -> Amount {
    self.inner.lock().vaults.get(vault).map(|v| v.balance).unwrap_or(0)
  }

  fn read_vault<T>(
    &self,
    vault: &Address,
    f: impl FnOnce(&ChainVault) -> T,
  ) -> Result<T, ChainError> {
    let inner = self.inner.lock();
    if inner.fail_vault_reads.contains(vault) {
      return Err(ChainError::Rpc(format!("injected read failure for {vault}")));
    }
    inner
      .vaults
      .get(vault)
      .map(f)
      .ok_or_else(|| ChainError::Rpc(format!("unknown vault {vault}")))
  }
}

impl ChainReader for ScriptedChain {
  async fn vault_purpose(&self, vault: &Address) -> Result<String, ChainError> {
    self.read_vault(vault, |v| v.purpose.clone())
  }

  async fn vault_balance(&self, vault: &Address) -> Result<Amount, ChainError> {
    self.read_vault(vault, |v| v.balance)
  }

  async fn vault_unlock_at(&self, vault: &Address) -> Result<UnixSeconds, ChainError> {
    self.read_vault(vault, |v| v.unlock_at)
  }

  async fn vault_beneficiary(&self, vault: &Address) -> Result<Option<Address>, ChainError> {
    self.read_vault(vault, |v| v.beneficiary.clone())
  }

  async fn vault_grace_period(&self, vault: &Address) -> Result<u64, ChainError> {
    self.read_vault(vault, |v| v.grace_period)
  }

  async fn vaults_by_owner(&self, owner: &Address) -> Result<Vec<Address>, ChainError> {
    let inner = self.inner.lock();
    if inner.fail_enumeration {
      return Err(ChainError::Rpc("injected enumeration failure".into()));
    }
    Ok(
      inner
        .order
        .iter()
        .filter(|a| inner.vaults.get(*a).map(|v| &v.owner == owner).unwrap_or(false))
        .cloned()
        .collect(),
    )
  }

  async fn all_vaults(&self) -> Result<Vec<Address>, ChainError> {
    let inner = self.inner.lock();
    if inner.fail_enumeration {
      return Err(ChainError::Rpc("injected enumeration failure".into()));
    }
    Ok(inner.order.clone())
  }

  async fn token_decimals(&self) -> Result<u8, ChainError> {
    Ok(self.inner.lock().decimals)
  }

  async fn token_balance_of(&self, _owner: &Address) -> Result<Amount, ChainError> {
    Ok(Amount::MAX)
  }

  async fn token_allowance(&self, _owner: &Address, _spender: &Address) -> Result<Amount, ChainError> {
    Ok(Amount::MAX)
  }
}

impl ChainWriter for ScriptedChain {
  async fn approve(&self, _spender: &Address, _amount: Amount) -> Result<String, ChainError> {
    let mut inner = self.inner.lock();
    inner.tx_counter += 1;
    Ok(format!("0xapprove{}", inner.tx_counter))
  }

  async fn create_personal_vault(
    &self,
    purpose: &str,
    unlock_at: UnixSeconds,
    _penalty_bps: u32,
    amount: Amount,
    beneficiary: Option<&Address>,
  ) -> Result<(Address, String), ChainError> {
    let mut inner = self.inner.lock();
    inner.tx_counter += 1;
    let address = Address::new(&format!("0xvault{:037}", inner.tx_counter));
    let vault = ChainVault {
      owner: Address::new("0xcreator0000000000000000000000000000000000"),
      purpose: purpose.to_string(),
      balance: amount,
      unlock_at,
      beneficiary: beneficiary.cloned(),
      grace_period: 0,
    };
    inner.order.push(address.clone());
    inner.vaults.insert(address.clone(), vault);
    let tx = format!("0xcreate{}", inner.tx_counter);
    Ok((address, tx))
  }

  async fn deposit(&self, vault: &Address, amount: Amount) -> Result<String, ChainError> {
    let mut inner = self.inner.lock();
    inner.tx_counter += 1;
    if let Some(v) = inner.vaults.get_mut(vault) {
      v.balance += amount;
    }
    Ok(format!("0xdeposit{}", inner.tx_counter))
  }

  async fn withdraw(&self, vault: &Address) -> Result<String, ChainError> {
    let mut inner = self.inner.lock();
    inner.tx_counter += 1;
    if let Some(v) = inner.vaults.get_mut(vault) {
      v.balance = 0;
    }
    Ok(format!("0xwithdraw{}", inner.tx_counter))
  }

  async fn execute_auto_deposit(&self, vault: &Address, amount: Amount) -> Result<String, ChainError> {
    let hang = {
      let mut inner = self.inner.lock();
      inner.deposit_calls.push((vault.clone(), amount));
      inner.hang_deposits
    };
    if hang {
      std::future::pending::<()>().await;
    }
    let mut inner = self.inner.lock();
    if let Some(remaining) = inner.deposit_reverts.get_mut(vault) {
      if *remaining > 0 {
        *remaining -= 1;
        return Err(ChainError::Reverted("insufficient allowance".into()));
      }
    }
    let v = inner
      .vaults
      .get_mut(vault)
      .ok_or_else(|| ChainError::Rpc(format!("unknown vault {vault}")))?;
    v.balance += amount;
    inner.tx_counter += 1;
    Ok(format!("0xtx{}", inner.tx_counter))
  }

  async fn trigger_beneficiary_claim(&self, vault: &Address) -> Result<String, ChainError> {
    let mut inner = self.inner.lock();
    inner.tx_counter += 1;
    if let Some(v) = inner.vaults.get_mut(vault) {
      v.balance = 0;
    }
    Ok(format!("0xclaim{}", inner.tx_counter))
  }
}

/// Notifier that records everything it is asked to deliver.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
  notifications: Arc<Mutex<Vec<Notification>>>,
  emails: Arc<Mutex<Vec<(EmailKind, EmailPayload)>>>,
}

impl RecordingNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn notifications(&self) -> Vec<Notification> {
    self.notifications.lock().clone()
  }

  pub fn emails(&self) -> Vec<(EmailKind, EmailPayload)> {
    self.emails.lock().clone()
  }
}

impl Notifier for RecordingNotifier {
  async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
    self.notifications.lock().push(notification.clone());
    Ok(())
  }

  async fn send_email(&self, kind: EmailKind, payload: &EmailPayload) -> Result<(), NotifyError> {
    self.emails.lock().push((kind, payload.clone()));
    Ok(())
  }
}

/// Proof issuer returning `proof-<receipt id>`, or failing when scripted to.
#[derive(Clone, Default)]
pub struct StaticProofIssuer {
  pub fail: bool,
}

impl ProofIssuer for StaticProofIssuer {
  async fn issue(&self, receipt: &Receipt) -> Result<String, ProofError> {
    if self.fail {
      return Err(ProofError("injected proof failure".into()));
    }
    Ok(format!("proof-{}", receipt.id))
  }
}
