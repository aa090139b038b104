//! Fixtures for release sweep tests.

use primitives::testing::{ChainVault, ScriptedChain};
use primitives::{Address, Amount, UnixSeconds};

pub const NOW: i64 = 1_700_000_000;
pub const GRACE: u64 = 3_600;

pub fn addr(tag: &str) -> Address {
  Address::new(&format!("0x{tag:0<40}"))
}

pub fn owner() -> Address {
  addr("a11ce")
}

pub fn heir() -> Address {
  addr("b0b")
}

pub fn chain_vault(
  balance: Amount,
  unlock_at: UnixSeconds,
  beneficiary: Option<Address>,
) -> ChainVault {
  ChainVault {
    owner: owner(),
    purpose: "Inheritance".to_string(),
    balance,
    unlock_at,
    beneficiary,
    grace_period: GRACE,
  }
}
