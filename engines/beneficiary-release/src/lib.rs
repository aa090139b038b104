//! Beneficiary Release
//!
//! Decides when a vault becomes claimable by its beneficiary and sweeps the
//! factory's vault set for claimable candidates. A vault is claimable only
//! strictly after the grace period that follows maturity has fully elapsed,
//! while it still holds funds and has a beneficiary configured. The owner
//! can withdraw at any point during the grace window, which is the window's
//! entire purpose; ineligibility is an ordinary answer, never an error.

use serde::Serialize;
use tokio::task::JoinSet;

use primitives::params::{BALANCE_CHUNK_SIZE, CHAIN_CALL_TIMEOUT};
use primitives::{Address, Amount, ChainError, ChainReader, UnixSeconds};

#[cfg(test)]
pub mod mock;

/// Eligibility verdict for one vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseEligibility {
  pub eligible: bool,
  /// Unlock time plus grace period; claims open strictly after this.
  pub grace_period_end: UnixSeconds,
}

/// Pure eligibility predicate.
///
/// `now == grace_period_end` is still inside the owner's window; claims
/// open at `grace_period_end + 1`.
pub fn evaluate(
  beneficiary: Option<&Address>,
  unlock_at: UnixSeconds,
  grace_secs: u64,
  balance: Amount,
  now: UnixSeconds,
) -> ReleaseEligibility {
  let grace_period_end = unlock_at.saturating_add(grace_secs as i64);
  let eligible = beneficiary.is_some() && now > grace_period_end && balance > 0;
  ReleaseEligibility { eligible, grace_period_end }
}

/// A claimable vault with the fields an operator needs to act on it.
#[derive(Debug, Clone, Serialize)]
pub struct EligibleVault {
  pub vault: Address,
  pub beneficiary: Address,
  pub purpose: String,
  pub balance: Amount,
  pub unlock_at: UnixSeconds,
  pub grace_period_end: UnixSeconds,
}

/// Result of one eligibility sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
  pub examined: usize,
  pub eligible: Vec<EligibleVault>,
  /// Vaults whose chain reads failed this sweep
  pub skipped: Vec<Address>,
}

/// Sweep every vault the factory knows for claimable candidates.
///
/// Reads fan out `BALANCE_CHUNK_SIZE` vaults at a time under the per-call
/// timeout; a vault whose reads fail lands in `skipped` without affecting
/// the rest. Enumeration failure propagates, since an empty sweep would be
/// indistinguishable from a clean one.
pub async fn sweep<C>(chain: &C, now: UnixSeconds) -> Result<SweepReport, ChainError>
where
  C: ChainReader + Clone + 'static,
{
  let vaults = tokio::time::timeout(CHAIN_CALL_TIMEOUT, chain.all_vaults())
    .await
    .unwrap_or(Err(ChainError::Timeout(CHAIN_CALL_TIMEOUT)))?;

  let mut report = SweepReport { examined: vaults.len(), ..SweepReport::default() };

  for chunk in vaults.chunks(BALANCE_CHUNK_SIZE) {
    let mut set = JoinSet::new();
    for vault in chunk {
      let chain = chain.clone();
      let vault = vault.clone();
      set.spawn(async move {
        let candidate = examine_vault(&chain, &vault, now).await;
        (vault, candidate)
      });
    }
    while let Some(joined) = set.join_next().await {
      match joined {
        Ok((_, Ok(Some(candidate)))) => report.eligible.push(candidate),
        Ok((_, Ok(None))) => {}
        Ok((vault, Err(err))) => {
          log::warn!("skipping vault {} in release sweep: {err}", vault.short());
          report.skipped.push(vault);
        }
        Err(err) => log::warn!("release sweep task panicked: {err}"),
      }
    }
  }

  // Deterministic operator output independent of task completion order.
  report.eligible.sort_by(|a, b| a.vault.cmp(&b.vault));
  report.skipped.sort();
  log::info!(
    "release sweep examined {} vault(s): {} eligible, {} skipped",
    report.examined,
    report.eligible.len(),
    report.skipped.len()
  );
  Ok(report)
}

async fn examine_vault<C: ChainReader>(
  chain: &C,
  vault: &Address,
  now: UnixSeconds,
) -> Result<Option<EligibleVault>, ChainError> {
  let (beneficiary, unlock_at, grace_secs, balance) = tokio::try_join!(
    bounded(chain.vault_beneficiary(vault)),
    bounded(chain.vault_unlock_at(vault)),
    bounded(chain.vault_grace_period(vault)),
    bounded(chain.vault_balance(vault)),
  )?;

  let verdict = evaluate(beneficiary.as_ref(), unlock_at, grace_secs, balance, now);
  if !verdict.eligible {
    return Ok(None);
  }
  let Some(beneficiary) = beneficiary else { return Ok(None) };
  let purpose = bounded(chain.vault_purpose(vault)).await?;
  Ok(Some(EligibleVault {
    vault: vault.clone(),
    beneficiary,
    purpose,
    balance,
    unlock_at,
    grace_period_end: verdict.grace_period_end,
  }))
}

async fn bounded<T>(
  call: impl std::future::Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
  tokio::time::timeout(CHAIN_CALL_TIMEOUT, call)
    .await
    .unwrap_or(Err(ChainError::Timeout(CHAIN_CALL_TIMEOUT)))
}
