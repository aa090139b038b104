//! Fixtures for creation flow tests.

use chrono::NaiveTime;

use primitives::testing::{MemStore, ScriptedChain, StaticProofIssuer};
use primitives::{Address, Frequency};

use crate::{AutoDepositOptIn, CreationRequest};

pub const NOW: i64 = 1_700_000_000;

pub fn addr(tag: &str) -> Address {
  Address::new(&format!("0x{tag:0<40}"))
}

pub fn owner() -> Address {
  addr("a11ce")
}

pub fn request() -> CreationRequest {
  CreationRequest {
    owner: owner(),
    factory: addr("fac"),
    purpose: "House Deposit".to_string(),
    unlock_at: NOW + 180 * 86_400,
    penalty_bps: 500,
    amount: 1_000_000,
    target_amount: Some(500_000_000),
    beneficiary: Some(addr("b0b")),
    auto_deposit: None,
  }
}

pub fn weekly_opt_in() -> AutoDepositOptIn {
  AutoDepositOptIn {
    amount: 25_000_000,
    frequency: Frequency::Weekly,
    execution_day: 5,
    execution_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
  }
}

pub fn harness() -> (MemStore, ScriptedChain, StaticProofIssuer) {
  (MemStore::new(), ScriptedChain::new(), StaticProofIssuer::default())
}
