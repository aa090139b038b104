//! Fixtures for reconciler tests.

use primitives::testing::{ChainVault, MemStore, ScriptedChain};
use primitives::{Address, VaultRecord};

pub const NOW: i64 = 1_700_000_000;

pub fn addr(tag: &str) -> Address {
  Address::new(&format!("0x{tag:0<40}"))
}

pub fn factory() -> Address {
  addr("fac")
}

pub fn owner() -> Address {
  addr("a11ce")
}

pub fn vault_record(vault: &Address, owner: &Address, created_at: i64) -> VaultRecord {
  VaultRecord {
    vault: vault.clone(),
    owner: owner.clone(),
    factory: factory(),
    created_at,
    purpose: "Vacation Fund".to_string(),
    target_amount: None,
    beneficiary: None,
  }
}

pub fn chain_vault(owner: &Address) -> ChainVault {
  ChainVault {
    owner: owner.clone(),
    purpose: "Vacation Fund".to_string(),
    balance: 1_000_000,
    unlock_at: NOW + 86_400,
    beneficiary: None,
    grace_period: 3_600,
  }
}

/// Store + chain pair with nothing registered yet.
pub fn harness() -> (MemStore, ScriptedChain) {
  (MemStore::new(), ScriptedChain::new())
}

/// Let fire-and-forget backfill tasks run to completion on the test runtime.
pub async fn settle() {
  for _ in 0..16 {
    tokio::task::yield_now().await;
  }
}
