//! Fixtures for categorizer tests.

use primitives::testing::{ChainVault, MemStore, ScriptedChain};
use primitives::{Address, Amount, Receipt, ReceiptKind, UnixSeconds, VaultRecord};

pub const NOW: i64 = 1_700_000_000;

pub fn addr(tag: &str) -> Address {
  Address::new(&format!("0x{tag:0<40}"))
}

pub fn owner() -> Address {
  addr("a11ce")
}

pub fn harness() -> (MemStore, ScriptedChain) {
  (MemStore::new(), ScriptedChain::new())
}

pub fn chain_vault(owner: &Address, balance: Amount, unlock_at: UnixSeconds) -> ChainVault {
  ChainVault {
    owner: owner.clone(),
    purpose: "Emergency Fund".to_string(),
    balance,
    unlock_at,
    beneficiary: None,
    grace_period: 3_600,
  }
}

pub fn vault_record(vault: &Address, owner: &Address) -> VaultRecord {
  VaultRecord {
    vault: vault.clone(),
    owner: owner.clone(),
    factory: addr("fac"),
    created_at: NOW - 86_400,
    purpose: "Emergency Fund".to_string(),
    target_amount: None,
    beneficiary: None,
  }
}

pub fn receipt(vault: &Address, kind: ReceiptKind, penalty: Option<Amount>) -> Receipt {
  Receipt {
    id: format!("rcpt-{vault}-{kind:?}"),
    wallet: owner(),
    vault: vault.clone(),
    tx_hash: "0xabc".to_string(),
    timestamp: NOW - 100,
    purpose: "Emergency Fund".to_string(),
    amount: 1_000_000,
    penalty,
    verified: true,
    kind,
    proof_id: None,
  }
}
