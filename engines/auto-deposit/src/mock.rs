//! Fixtures for scheduler tests.

use chrono::NaiveTime;

use primitives::testing::{ChainVault, MemStore, RecordingNotifier, ScriptedChain};
use primitives::{
  Address, Amount, AutoDepositSchedule, Frequency, NotificationPreferences, UserProfile,
};

use crate::AutoDepositEngine;

/// 2023-11-14T22:13:20Z, a Tuesday.
pub const NOW: i64 = 1_700_000_000;

pub const DEPOSIT_AMOUNT: Amount = 50_000_000;

pub fn addr(tag: &str) -> Address {
  Address::new(&format!("0x{tag:0<40}"))
}

pub fn owner() -> Address {
  addr("a11ce")
}

pub fn nine_am() -> NaiveTime {
  NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

pub fn schedule(
  id: &str,
  vault: &Address,
  frequency: Frequency,
  next_run_at: i64,
) -> AutoDepositSchedule {
  AutoDepositSchedule {
    id: id.to_string(),
    vault: vault.clone(),
    owner: owner(),
    amount: DEPOSIT_AMOUNT,
    frequency,
    execution_day: 1,
    execution_time: nine_am(),
    last_run_at: None,
    next_run_at,
    active: true,
    failures: 0,
    claimed_at: None,
  }
}

pub fn chain_vault(owner: &Address, unlock_at: i64) -> ChainVault {
  ChainVault {
    owner: owner.clone(),
    purpose: "Car Fund".to_string(),
    balance: 10_000_000,
    unlock_at,
    beneficiary: None,
    grace_period: 3_600,
  }
}

pub fn profile_with_email(wallet: &Address) -> UserProfile {
  UserProfile {
    wallet: wallet.clone(),
    email: Some("alice@example.com".to_string()),
    preferences: NotificationPreferences::default(),
    created_at: NOW - 1_000_000,
    updated_at: NOW - 1_000_000,
  }
}

pub struct Harness {
  pub store: MemStore,
  pub chain: ScriptedChain,
  pub notifier: RecordingNotifier,
  pub engine: AutoDepositEngine<MemStore, ScriptedChain, RecordingNotifier>,
}

pub fn harness() -> Harness {
  let store = MemStore::new();
  let chain = ScriptedChain::new();
  let notifier = RecordingNotifier::new();
  let engine = AutoDepositEngine::new(store.clone(), chain.clone(), notifier.clone());
  Harness { store, chain, notifier, engine }
}
