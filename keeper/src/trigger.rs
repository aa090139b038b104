//! Batch trigger entrypoints.
//!
//! Each entrypoint is what an external cron hits through the CLI: it wires
//! the engines to concrete collaborators and returns a serializable summary
//! for the caller. Only the deposit trigger is secret-guarded; the other
//! operations are read-only or operator-local.

use thiserror::Error;

use engine_auto_deposit::{AutoDepositEngine, TickSummary};
use engine_beneficiary_release::SweepReport;
use engine_vault_categorizer::{OwnerOverview, ProtocolStats};
use primitives::{
  Address, ChainError, ChainReader, ChainWriter, LedgerStore, Notifier, StoreError, UnixSeconds,
};

#[derive(Debug, Error)]
pub enum TriggerError {
  #[error("trigger secret mismatch")]
  Unauthorized,
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Chain(#[from] ChainError),
}

/// Check a presented secret against the configured one.
///
/// A configured secret is enforced unconditionally. Without one the
/// trigger is open, which is acceptable only for local dry-runs; the gap
/// is logged every time so it cannot go unnoticed.
pub fn authorize(configured: Option<&str>, presented: Option<&str>) -> Result<(), TriggerError> {
  match configured {
    Some(secret) if presented == Some(secret) => Ok(()),
    Some(_) => Err(TriggerError::Unauthorized),
    None => {
      log::warn!("no trigger secret configured; accepting unauthenticated trigger");
      Ok(())
    }
  }
}

/// Run one auto-deposit scheduler tick.
pub async fn process_deposits<S, C, N>(
  store: &S,
  chain: &C,
  notifier: &N,
  configured_secret: Option<&str>,
  presented_secret: Option<&str>,
  now: UnixSeconds,
) -> Result<TickSummary, TriggerError>
where
  S: LedgerStore + Clone,
  C: ChainReader + ChainWriter + Clone,
  N: Notifier + Clone,
{
  authorize(configured_secret, presented_secret)?;
  let engine = AutoDepositEngine::new(store.clone(), chain.clone(), notifier.clone());
  Ok(engine.run_tick(now).await?)
}

/// Sweep the factory for vaults claimable by their beneficiary.
pub async fn beneficiary_sweep<C>(chain: &C, now: UnixSeconds) -> Result<SweepReport, TriggerError>
where
  C: ChainReader + Clone + 'static,
{
  Ok(engine_beneficiary_release::sweep(chain, now).await?)
}

/// Reconcile one owner's vault set and classify it.
pub async fn reconcile<S, C>(
  store: &S,
  chain: &C,
  factory: &Address,
  owner: &Address,
  now: UnixSeconds,
) -> Result<OwnerOverview, TriggerError>
where
  S: LedgerStore + Clone + 'static,
  C: ChainReader + Clone + 'static,
{
  Ok(engine_vault_categorizer::owner_overview(chain, store, factory, owner, now).await?)
}

/// Protocol-wide statistics for the operator dashboard.
pub async fn stats<S, C>(
  store: &S,
  chain: &C,
  now: UnixSeconds,
) -> Result<ProtocolStats, TriggerError>
where
  S: LedgerStore,
  C: ChainReader + Clone + 'static,
{
  Ok(engine_vault_categorizer::protocol_stats(chain, store, now).await?)
}
