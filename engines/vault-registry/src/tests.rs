//! Unit tests for the Vault Registry Reconciler.

use primitives::StoreError;

use crate::mock::*;
use crate::{reconcile_owner_vaults, BACKFILL_PURPOSE};

#[tokio::test]
async fn merges_store_and_chain_sets() {
  let (store, chain) = harness();
  let owner = owner();
  let db_only = addr("d1");
  let both = addr("b1");
  let chain_only = addr("c1");

  store.add_vault(vault_record(&db_only, &owner, NOW - 200));
  store.add_vault(vault_record(&both, &owner, NOW - 100));
  chain.add_vault(both.clone(), chain_vault(&owner));
  chain.add_vault(chain_only.clone(), chain_vault(&owner));

  let vaults = reconcile_owner_vaults(&store, &chain, &factory(), &owner, NOW).await.unwrap();

  assert_eq!(vaults.len(), 3);
  assert!(vaults.contains(&db_only));
  assert!(vaults.contains(&both));
  assert!(vaults.contains(&chain_only));
  // Store results lead; the store reports most-recent first.
  assert_eq!(vaults[0], both);
  assert_eq!(vaults[1], db_only);
}

#[tokio::test]
async fn backfills_chain_only_vaults_once() {
  let (store, chain) = harness();
  let owner = owner();
  let chain_only = addr("c1");
  chain.add_vault(chain_only.clone(), chain_vault(&owner));

  let first = reconcile_owner_vaults(&store, &chain, &factory(), &owner, NOW).await.unwrap();
  settle().await;

  assert_eq!(first, vec![chain_only.clone()]);
  assert_eq!(store.vault_insert_count(), 1);
  let records = store.vault_records();
  assert_eq!(records[0].vault, chain_only);
  assert_eq!(records[0].purpose, BACKFILL_PURPOSE);
  assert_eq!(records[0].created_at, NOW);

  // Second pass over unchanged state: same set, zero additional writes.
  let second = reconcile_owner_vaults(&store, &chain, &factory(), &owner, NOW + 60).await.unwrap();
  settle().await;

  assert_eq!(second, first);
  assert_eq!(store.vault_insert_count(), 1);
}

#[tokio::test]
async fn degrades_to_store_when_chain_enumeration_fails() {
  // A stale chain indexer must not hide vaults the ledger knows about.
  let (store, chain) = harness();
  let owner = owner();
  let db_vault = addr("d1");
  store.add_vault(vault_record(&db_vault, &owner, NOW - 50));
  chain.set_fail_enumeration(true);

  let vaults = reconcile_owner_vaults(&store, &chain, &factory(), &owner, NOW).await.unwrap();

  assert_eq!(vaults, vec![db_vault]);
}

#[tokio::test]
async fn propagates_store_failure() {
  let (store, chain) = harness();
  chain.add_vault(addr("c1"), chain_vault(&owner()));
  store.set_fail_reads(true);

  let result = reconcile_owner_vaults(&store, &chain, &factory(), &owner(), NOW).await;

  assert!(matches!(result, Err(StoreError::Io(_))));
}

#[tokio::test]
async fn chain_list_is_reversed_to_newest_first() {
  let (store, chain) = harness();
  let owner = owner();
  let oldest = addr("c1");
  let newest = addr("c2");
  chain.add_vault(oldest.clone(), chain_vault(&owner));
  chain.add_vault(newest.clone(), chain_vault(&owner));

  let vaults = reconcile_owner_vaults(&store, &chain, &factory(), &owner, NOW).await.unwrap();

  assert_eq!(vaults, vec![newest, oldest]);
}

#[tokio::test]
async fn deduplicates_case_variant_addresses() {
  // Address construction normalizes case, so a checksummed chain result and
  // a lower-cased store row are one identity.
  let (store, chain) = harness();
  let owner = owner();
  let stored = addr("ab1");
  store.add_vault(vault_record(&stored, &owner, NOW - 10));
  chain.add_vault(primitives::Address::new(&stored.as_str().to_uppercase()), chain_vault(&owner));

  let vaults = reconcile_owner_vaults(&store, &chain, &factory(), &owner, NOW).await.unwrap();
  settle().await;

  assert_eq!(vaults, vec![stored]);
  assert_eq!(store.vault_insert_count(), 0);
}
