//! Vault Categorizer
//!
//! Classifies each known vault into exactly one of {active, matured,
//! completed} from live chain reads and derives aggregate financial metrics
//! (TVL, user count, penalty revenue, completion counts). Classification is
//! a pure function of (balance, unlock time, now); the fan-out reads are
//! chunked to bound outstanding RPC requests and isolated per vault so one
//! failing read never aborts the rest of the batch.

use serde::Serialize;
use tokio::task::JoinSet;

use primitives::params::{BALANCE_CHUNK_SIZE, CHAIN_CALL_TIMEOUT};
use primitives::{
  Address, Amount, ChainError, ChainReader, LedgerStore, ReceiptKind, StoreError, UnixSeconds,
  VaultCategory,
};

#[cfg(test)]
pub mod mock;

/// Classify one vault. First match wins:
/// an empty vault is completed no matter the unlock time, a funded vault is
/// active until the unlock instant and matured from then on.
pub fn categorize(balance: Amount, unlock_at: UnixSeconds, now: UnixSeconds) -> VaultCategory {
  if balance == 0 {
    VaultCategory::Completed
  } else if now < unlock_at {
    VaultCategory::Active
  } else {
    VaultCategory::Matured
  }
}

/// Live observation of one vault at classification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultSnapshot {
  pub vault: Address,
  pub balance: Amount,
  pub unlock_at: UnixSeconds,
  pub category: VaultCategory,
}

/// Outcome of classifying a vault set. `skipped` lists vaults whose chain
/// reads failed; they are absent from every aggregate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifiedVaults {
  pub snapshots: Vec<VaultSnapshot>,
  pub skipped: Vec<Address>,
}

impl ClassifiedVaults {
  pub fn total_balance(&self) -> Amount {
    self.snapshots.iter().map(|s| s.balance).sum()
  }

  pub fn count_in(&self, category: VaultCategory) -> usize {
    self.snapshots.iter().filter(|s| s.category == category).count()
  }

  pub fn in_category(&self, category: VaultCategory) -> impl Iterator<Item = &VaultSnapshot> {
    self.snapshots.iter().filter(move |s| s.category == category)
  }
}

/// Classify a set of vaults with bounded, isolated fan-out.
///
/// Reads are issued `BALANCE_CHUNK_SIZE` vaults at a time, each under the
/// per-call timeout. Snapshot order follows the input order regardless of
/// completion order, so repeated calls over unchanged state are identical.
pub async fn classify_vaults<C>(chain: &C, vaults: &[Address], now: UnixSeconds) -> ClassifiedVaults
where
  C: ChainReader + Clone + 'static,
{
  let mut results: Vec<Option<Result<VaultSnapshot, Address>>> = vec![None; vaults.len()];

  for (chunk_index, chunk) in vaults.chunks(BALANCE_CHUNK_SIZE).enumerate() {
    let mut set = JoinSet::new();
    for (offset, vault) in chunk.iter().enumerate() {
      let chain = chain.clone();
      let vault = vault.clone();
      let index = chunk_index * BALANCE_CHUNK_SIZE + offset;
      set.spawn(async move {
        let snapshot = observe_vault(&chain, &vault, now).await;
        (index, vault, snapshot)
      });
    }
    while let Some(joined) = set.join_next().await {
      match joined {
        Ok((index, _, Ok(snapshot))) => results[index] = Some(Ok(snapshot)),
        Ok((index, vault, Err(err))) => {
          log::warn!("skipping vault {} in classification: {err}", vault.short());
          results[index] = Some(Err(vault));
        }
        Err(err) => log::warn!("classification task panicked: {err}"),
      }
    }
  }

  let mut classified = ClassifiedVaults::default();
  for result in results.into_iter().flatten() {
    match result {
      Ok(snapshot) => classified.snapshots.push(snapshot),
      Err(vault) => classified.skipped.push(vault),
    }
  }
  classified
}

async fn observe_vault<C: ChainReader>(
  chain: &C,
  vault: &Address,
  now: UnixSeconds,
) -> Result<VaultSnapshot, ChainError> {
  let (balance, unlock_at) = tokio::try_join!(
    bounded(chain.vault_balance(vault)),
    bounded(chain.vault_unlock_at(vault)),
  )?;
  Ok(VaultSnapshot { vault: vault.clone(), balance, unlock_at, category: categorize(balance, unlock_at, now) })
}

async fn bounded<T>(
  call: impl std::future::Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
  tokio::time::timeout(CHAIN_CALL_TIMEOUT, call)
    .await
    .unwrap_or(Err(ChainError::Timeout(CHAIN_CALL_TIMEOUT)))
}

/// Protocol-wide aggregates for the operator dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProtocolStats {
  /// Sum of all live vault balances, in base units
  pub tvl: Amount,
  /// Vaults known to store or chain
  pub vault_count: usize,
  /// Distinct owners across registry records
  pub user_count: usize,
  pub active: usize,
  pub matured: usize,
  pub completed: usize,
  /// Vaults whose chain reads failed this sweep
  pub skipped: usize,
  /// Early breaks, from `breaked` receipts
  pub broken_count: usize,
  /// Sum of penalties across `breaked` receipts, in base units
  pub penalty_revenue: Amount,
  /// Successful completions, from `completed` receipts
  pub success_count: usize,
}

/// Compute protocol-wide statistics over the union of registry records and
/// chain enumeration. Chain enumeration failure degrades to registry-only
/// coverage; a store failure propagates.
pub async fn protocol_stats<C, S>(
  chain: &C,
  store: &S,
  now: UnixSeconds,
) -> Result<ProtocolStats, StoreError>
where
  C: ChainReader + Clone + 'static,
  S: LedgerStore,
{
  let records = store.all_vault_records().await?;

  let mut vaults: Vec<Address> = records.iter().map(|r| r.vault.clone()).collect();
  match tokio::time::timeout(CHAIN_CALL_TIMEOUT, chain.all_vaults()).await {
    Ok(Ok(chain_vaults)) => {
      for vault in chain_vaults {
        if !vaults.contains(&vault) {
          vaults.push(vault);
        }
      }
    }
    Ok(Err(err)) => log::warn!("factory enumeration failed, stats cover registry only: {err}"),
    Err(_) => log::warn!("factory enumeration timed out, stats cover registry only"),
  }

  let classified = classify_vaults(chain, &vaults, now).await;

  let mut owners: Vec<&Address> = records.iter().map(|r| &r.owner).collect();
  owners.sort();
  owners.dedup();

  let receipts = store.all_receipts().await?;
  let broken: Vec<_> = receipts.iter().filter(|r| r.kind == ReceiptKind::Breaked).collect();

  Ok(ProtocolStats {
    tvl: classified.total_balance(),
    vault_count: vaults.len(),
    user_count: owners.len(),
    active: classified.count_in(VaultCategory::Active),
    matured: classified.count_in(VaultCategory::Matured),
    completed: classified.count_in(VaultCategory::Completed),
    skipped: classified.skipped.len(),
    broken_count: broken.len(),
    penalty_revenue: broken.iter().filter_map(|r| r.penalty).sum(),
    success_count: receipts.iter().filter(|r| r.kind == ReceiptKind::Completed).count(),
  })
}

/// Per-owner view: the reconciled vault set, classified, with totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OwnerOverview {
  pub vaults: Vec<VaultSnapshot>,
  pub skipped: Vec<Address>,
  pub total_balance: Amount,
  pub active: usize,
  pub matured: usize,
  pub completed: usize,
}

/// Classify everything the owner holds, over the reconciled store/chain
/// union (backfill included, see the registry engine).
pub async fn owner_overview<C, S>(
  chain: &C,
  store: &S,
  factory: &Address,
  owner: &Address,
  now: UnixSeconds,
) -> Result<OwnerOverview, StoreError>
where
  C: ChainReader + Clone + 'static,
  S: LedgerStore + Clone + 'static,
{
  let vaults =
    engine_vault_registry::reconcile_owner_vaults(store, chain, factory, owner, now).await?;
  let classified = classify_vaults(chain, &vaults, now).await;

  Ok(OwnerOverview {
    total_balance: classified.total_balance(),
    active: classified.count_in(VaultCategory::Active),
    matured: classified.count_in(VaultCategory::Matured),
    completed: classified.count_in(VaultCategory::Completed),
    skipped: classified.skipped,
    vaults: classified.snapshots,
  })
}
