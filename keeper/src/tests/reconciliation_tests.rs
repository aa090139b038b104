//! Reconciliation and statistics coverage.

use primitives::testing::{ChainVault, ScriptedChain};
use primitives::{LedgerStore, VaultCategory};

use crate::tests::common::*;
use crate::trigger;

#[tokio::test]
async fn matured_vault_shows_up_in_stats_and_tvl() {
  let k = keeper();
  let vault = addr("v1");
  k.chain.seed_vault(vault.clone(), vault_state(&owner(), 500, NOW - 1_000));
  seed_vault_record(&k.store, &vault_record(&vault, &owner(), NOW - 86_400)).await;

  let stats = trigger::stats(&k.store, &k.chain, NOW).await.unwrap();

  assert_eq!(stats.vault_count, 1);
  assert_eq!(stats.user_count, 1);
  assert_eq!(stats.matured, 1);
  assert_eq!(stats.active, 0);
  assert_eq!(stats.completed, 0);
  assert_eq!(stats.tvl, 500);
}

#[tokio::test]
async fn reconcile_classifies_and_backfills_chain_only_vaults() {
  let k = keeper();
  let registered = addr("v1");
  let unregistered = addr("v2");
  k.chain.seed_vault(registered.clone(), vault_state(&owner(), 200, NOW + 86_400));
  k.chain.seed_vault(unregistered.clone(), vault_state(&owner(), 300, NOW - 1_000));
  seed_vault_record(&k.store, &vault_record(&registered, &owner(), NOW - 86_400)).await;

  let overview =
    trigger::reconcile(&k.store, &k.chain, &factory(), &owner(), NOW).await.unwrap();
  settle().await;

  assert_eq!(overview.vaults.len(), 2);
  assert_eq!(overview.total_balance, 500);
  assert_eq!(overview.active, 1);
  assert_eq!(overview.matured, 1);

  // The unregistered vault now has a placeholder record on disk.
  let records = k.reopen_store().all_vault_records().await.unwrap();
  assert_eq!(records.len(), 2);
  let backfilled = records.iter().find(|r| r.vault == unregistered).unwrap();
  assert_eq!(backfilled.purpose, engine_vault_registry::BACKFILL_PURPOSE);
  assert_eq!(backfilled.owner, owner());
}

#[tokio::test]
async fn reconcile_survives_a_dead_chain_endpoint() {
  // JSON store plus a scripted chain whose enumeration fails: the ledger
  // side of the union must still come back.
  let k = keeper();
  let vault = addr("v1");
  seed_vault_record(&k.store, &vault_record(&vault, &owner(), NOW - 86_400)).await;
  let chain = ScriptedChain::new();
  chain.add_vault(
    vault.clone(),
    ChainVault {
      owner: owner(),
      purpose: "Retirement".to_string(),
      balance: 700,
      unlock_at: NOW + 86_400,
      beneficiary: None,
      grace_period: 3_600,
    },
  );
  chain.set_fail_enumeration(true);

  let overview = trigger::reconcile(&k.store, &chain, &factory(), &owner(), NOW).await.unwrap();

  assert_eq!(overview.vaults.len(), 1);
  assert_eq!(overview.vaults[0].vault, vault);
  assert_eq!(overview.vaults[0].category, VaultCategory::Active);
}

#[tokio::test]
async fn completed_vaults_count_without_adding_to_tvl() {
  let k = keeper();
  let drained = addr("v1");
  let active = addr("v2");
  k.chain.seed_vault(drained.clone(), vault_state(&owner(), 0, NOW - 1_000));
  k.chain.seed_vault(active.clone(), vault_state(&owner(), 900, NOW + 86_400));
  seed_vault_record(&k.store, &vault_record(&drained, &owner(), NOW - 200_000)).await;
  seed_vault_record(&k.store, &vault_record(&active, &owner(), NOW - 100_000)).await;

  let stats = trigger::stats(&k.store, &k.chain, NOW).await.unwrap();

  assert_eq!(stats.completed, 1);
  assert_eq!(stats.active, 1);
  assert_eq!(stats.tvl, 900);
}
