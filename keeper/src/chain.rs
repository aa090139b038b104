//! Chain snapshot fixture.
//!
//! A JSON file standing in for the factory, vaults and token during
//! operator dry-runs and integration tests; a live RPC client implements
//! the same two traits elsewhere. Writes mutate the snapshot and persist it
//! the same way the store does, so a dry-run is inspectable after the fact.
//!
//! Fixture conventions: a wallet missing from `balances` or `allowances`
//! is unconstrained; present entries are enforced and drawn down by
//! `execute_auto_deposit`, which is how tests script reverts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use primitives::{Address, Amount, ChainError, ChainReader, ChainWriter, UnixSeconds};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultState {
  pub owner: Address,
  pub purpose: String,
  pub balance: Amount,
  pub unlock_at: UnixSeconds,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub beneficiary: Option<Address>,
  #[serde(default)]
  pub grace_period: u64,
}

fn default_decimals() -> u8 {
  6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
  #[serde(default = "default_decimals")]
  decimals: u8,
  /// Wallet that signs keeper transactions; owns vaults made by create.
  #[serde(default = "Address::zero")]
  operator: Address,
  #[serde(default)]
  vaults: BTreeMap<Address, VaultState>,
  /// Creation order of vault addresses, oldest first.
  #[serde(default)]
  order: Vec<Address>,
  #[serde(default)]
  balances: BTreeMap<Address, Amount>,
  #[serde(default)]
  allowances: BTreeMap<Address, Amount>,
  #[serde(default)]
  next_tx: u64,
}

impl Default for Snapshot {
  fn default() -> Self {
    Snapshot {
      decimals: default_decimals(),
      operator: Address::zero(),
      vaults: BTreeMap::new(),
      order: Vec::new(),
      balances: BTreeMap::new(),
      allowances: BTreeMap::new(),
      next_tx: 0,
    }
  }
}

#[derive(Clone)]
pub struct SnapshotChain {
  path: PathBuf,
  state: Arc<RwLock<Snapshot>>,
}

impl SnapshotChain {
  pub fn open(path: &Path) -> Result<Self, ChainError> {
    let state = if path.exists() {
      let raw = fs::read_to_string(path).map_err(|e| ChainError::Rpc(e.to_string()))?;
      serde_json::from_str(&raw).map_err(|e| ChainError::Rpc(e.to_string()))?
    } else {
      Snapshot::default()
    };
    Ok(SnapshotChain { path: path.to_path_buf(), state: Arc::new(RwLock::new(state)) })
  }

  fn persist(&self, state: &Snapshot) -> Result<(), ChainError> {
    let raw = serde_json::to_string_pretty(state).map_err(|e| ChainError::Rpc(e.to_string()))?;
    let tmp = self.path.with_extension("tmp");
    fs::write(&tmp, raw).map_err(|e| ChainError::Rpc(e.to_string()))?;
    fs::rename(&tmp, &self.path).map_err(|e| ChainError::Rpc(e.to_string()))
  }

  fn mutate<T>(
    &self,
    f: impl FnOnce(&mut Snapshot) -> Result<T, ChainError>,
  ) -> Result<T, ChainError> {
    let mut state = self.state.write();
    let value = f(&mut state)?;
    self.persist(&state)?;
    Ok(value)
  }

  fn read_vault<T>(&self, vault: &Address, f: impl FnOnce(&VaultState) -> T) -> Result<T, ChainError> {
    self
      .state
      .read()
      .vaults
      .get(vault)
      .map(f)
      .ok_or_else(|| ChainError::Rpc(format!("unknown vault {vault}")))
  }
}

#[cfg(test)]
impl SnapshotChain {
  pub fn seed_vault(&self, address: Address, vault: VaultState) {
    let mut state = self.state.write();
    state.order.push(address.clone());
    state.vaults.insert(address, vault);
  }

  pub fn set_allowance(&self, owner: Address, amount: Amount) {
    self.state.write().allowances.insert(owner, amount);
  }

  pub fn balance(&self, vault: &Address) -> Amount {
    self.state.read().vaults.get(vault).map(|v| v.balance).unwrap_or(0)
  }
}

fn next_tx_hash(state: &mut Snapshot) -> String {
  state.next_tx += 1;
  format!("0x{:064x}", state.next_tx)
}

fn draw_down(
  table: &mut BTreeMap<Address, Amount>,
  wallet: &Address,
  amount: Amount,
  what: &str,
) -> Result<(), ChainError> {
  if let Some(available) = table.get_mut(wallet) {
    if *available < amount {
      return Err(ChainError::Reverted(format!("insufficient {what}")));
    }
    *available -= amount;
  }
  Ok(())
}

impl ChainReader for SnapshotChain {
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
    self.read_vault(vault, |v| v.beneficiary.clone().filter(|b| !b.is_zero()))
  }

  async fn vault_grace_period(&self, vault: &Address) -> Result<u64, ChainError> {
    self.read_vault(vault, |v| v.grace_period)
  }

  async fn vaults_by_owner(&self, owner: &Address) -> Result<Vec<Address>, ChainError> {
    let state = self.state.read();
    Ok(
      state
        .order
        .iter()
        .filter(|a| state.vaults.get(*a).map(|v| &v.owner == owner).unwrap_or(false))
        .cloned()
        .collect(),
    )
  }

  async fn all_vaults(&self) -> Result<Vec<Address>, ChainError> {
    Ok(self.state.read().order.clone())
  }

  async fn token_decimals(&self) -> Result<u8, ChainError> {
    Ok(self.state.read().decimals)
  }

  async fn token_balance_of(&self, owner: &Address) -> Result<Amount, ChainError> {
    Ok(self.state.read().balances.get(owner).copied().unwrap_or(Amount::MAX))
  }

  async fn token_allowance(&self, owner: &Address, _spender: &Address) -> Result<Amount, ChainError> {
    Ok(self.state.read().allowances.get(owner).copied().unwrap_or(Amount::MAX))
  }
}

impl ChainWriter for SnapshotChain {
  async fn approve(&self, _spender: &Address, amount: Amount) -> Result<String, ChainError> {
    self.mutate(|state| {
      let operator = state.operator.clone();
      state.allowances.insert(operator, amount);
      Ok(next_tx_hash(state))
    })
  }

  async fn create_personal_vault(
    &self,
    purpose: &str,
    unlock_at: UnixSeconds,
    _penalty_bps: u32,
    amount: Amount,
    beneficiary: Option<&Address>,
  ) -> Result<(Address, String), ChainError> {
    self.mutate(|state| {
      let index = state.order.len() as u64 + 1;
      let address = Address::new(&format!("0x{index:040x}"));
      let vault = VaultState {
        owner: state.operator.clone(),
        purpose: purpose.to_string(),
        balance: amount,
        unlock_at,
        beneficiary: beneficiary.cloned(),
        grace_period: 0,
      };
      state.order.push(address.clone());
      state.vaults.insert(address.clone(), vault);
      Ok((address, next_tx_hash(state)))
    })
  }

  async fn deposit(&self, vault: &Address, amount: Amount) -> Result<String, ChainError> {
    self.mutate(|state| {
      let v = state
        .vaults
        .get_mut(vault)
        .ok_or_else(|| ChainError::Rpc(format!("unknown vault {vault}")))?;
      v.balance += amount;
      Ok(next_tx_hash(state))
    })
  }

  async fn withdraw(&self, vault: &Address) -> Result<String, ChainError> {
    self.mutate(|state| {
      let v = state
        .vaults
        .get_mut(vault)
        .ok_or_else(|| ChainError::Rpc(format!("unknown vault {vault}")))?;
      v.balance = 0;
      Ok(next_tx_hash(state))
    })
  }

  async fn execute_auto_deposit(&self, vault: &Address, amount: Amount) -> Result<String, ChainError> {
    self.mutate(|state| {
      let owner = state
        .vaults
        .get(vault)
        .map(|v| v.owner.clone())
        .ok_or_else(|| ChainError::Rpc(format!("unknown vault {vault}")))?;
      draw_down(&mut state.allowances, &owner, amount, "allowance")?;
      draw_down(&mut state.balances, &owner, amount, "balance")?;
      if let Some(v) = state.vaults.get_mut(vault) {
        v.balance += amount;
      }
      Ok(next_tx_hash(state))
    })
  }

  async fn trigger_beneficiary_claim(&self, vault: &Address) -> Result<String, ChainError> {
    self.mutate(|state| {
      let v = state
        .vaults
        .get_mut(vault)
        .ok_or_else(|| ChainError::Rpc(format!("unknown vault {vault}")))?;
      let released = v.balance;
      let beneficiary = v.beneficiary.clone();
      v.balance = 0;
      if let Some(beneficiary) = beneficiary {
        *state.balances.entry(beneficiary).or_insert(0) += released;
      }
      Ok(next_tx_hash(state))
    })
  }
}
