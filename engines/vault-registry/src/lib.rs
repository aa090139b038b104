//! Vault Registry Reconciler
//!
//! Produces the complete, deduplicated set of vault addresses for an owner
//! by merging the ledger store's registry records with the factory
//! contract's authoritative enumeration. Either source alone can have gaps
//! (missed writes on one side, a lagging RPC indexer on the other); the
//! union protects against both. Vaults found on chain but missing from the
//! store are backfilled in the background with a minimal placeholder record.

use primitives::params::CHAIN_CALL_TIMEOUT;
use primitives::{Address, ChainReader, LedgerStore, StoreError, UnixSeconds, VaultRecord};

#[cfg(test)]
pub mod mock;
#[cfg(test)]
pub mod tests;

/// Purpose string stamped on backfilled registry records. The on-chain
/// purpose is not read here; a later detail view replaces the placeholder.
pub const BACKFILL_PURPOSE: &str = "Imported Vault";

/// Reconcile the owner's vault set across store and chain.
///
/// The returned order is store-first (most recent first, as the store
/// reports them) followed by chain-only addresses, newest first. A failed
/// chain enumeration degrades to store-only results; a failed store query
/// propagates, since the store is the system of record for metadata.
///
/// Backfill inserts are fire-and-forget: they are spawned and never awaited,
/// so a slow or failing insert cannot delay the caller. Inserts are
/// conditional on the vault address, so re-running the reconciler performs
/// zero additional writes once the store has caught up.
pub async fn reconcile_owner_vaults<S, C>(
  store: &S,
  chain: &C,
  factory: &Address,
  owner: &Address,
  now: UnixSeconds,
) -> Result<Vec<Address>, StoreError>
where
  S: LedgerStore + Clone + 'static,
  C: ChainReader,
{
  let db_records = store.vaults_by_owner(owner).await?;
  let db_vaults: Vec<Address> = db_records.into_iter().map(|r| r.vault).collect();

  let chain_vaults = match tokio::time::timeout(CHAIN_CALL_TIMEOUT, chain.vaults_by_owner(owner)).await
  {
    Ok(Ok(mut vaults)) => {
      // Factory enumeration is oldest-first; flip to match the store.
      vaults.reverse();
      vaults
    }
    Ok(Err(err)) => {
      log::warn!("chain enumeration failed for owner {}: {err}; using store only", owner.short());
      Vec::new()
    }
    Err(_) => {
      log::warn!("chain enumeration timed out for owner {}; using store only", owner.short());
      Vec::new()
    }
  };

  let mut union = db_vaults.clone();
  for vault in &chain_vaults {
    if !union.contains(vault) {
      union.push(vault.clone());
    }
  }

  let missing: Vec<Address> =
    chain_vaults.into_iter().filter(|v| !db_vaults.contains(v)).collect();
  if !missing.is_empty() {
    log::info!("backfilling {} vault record(s) for owner {}", missing.len(), owner.short());
    spawn_backfill(store.clone(), factory.clone(), owner.clone(), missing, now);
  }

  Ok(union)
}

fn spawn_backfill<S>(
  store: S,
  factory: Address,
  owner: Address,
  vaults: Vec<Address>,
  now: UnixSeconds,
) where
  S: LedgerStore + Clone + 'static,
{
  tokio::spawn(async move {
    for vault in vaults {
      let record = VaultRecord {
        vault: vault.clone(),
        owner: owner.clone(),
        factory: factory.clone(),
        created_at: now,
        purpose: BACKFILL_PURPOSE.to_string(),
        target_amount: None,
        beneficiary: None,
      };
      // Best-effort: a lost backfill is recovered by the next reconcile.
      match store.insert_vault_if_absent(&record).await {
        Ok(true) => log::debug!("backfilled registry record for vault {}", vault.short()),
        Ok(false) => {}
        Err(err) => log::warn!("backfill insert failed for vault {}: {err}", vault.short()),
      }
    }
  });
}
