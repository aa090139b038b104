//! Auto-Deposit Scheduler
//!
//! Executes due recurring deposits against their vaults with at-most-once
//! intent per slot: each due schedule is claimed atomically in the ledger
//! before any chain write, so overlapping scheduler invocations cannot
//! double-spend one slot. Failures are retried on later ticks without
//! moving `next_run_at`; the owner is told about every failed attempt,
//! and the third consecutive failure disables the schedule in the same
//! ledger update with a single cancellation notice.

use serde::Serialize;
use uuid::Uuid;

use primitives::params::{CHAIN_CALL_TIMEOUT, MAX_CONSECUTIVE_FAILURES};
use primitives::units::format_units;
use primitives::{
  Address, Amount, AutoDepositSchedule, ChainError, ChainReader, ChainWriter, EmailKind,
  EmailPayload, Frequency, LedgerStore, Notification, NotificationKind, Notifier, Receipt,
  ReceiptKind, StoreError, UnixSeconds,
};

pub mod schedule;

#[cfg(test)]
pub mod mock;
#[cfg(test)]
pub mod tests;

pub use schedule::{first_run_at, next_run_after};

/// Purpose used on deposit receipts when the vault contract cannot be read.
const FALLBACK_PURPOSE: &str = "Savings Vault";

/// Outcome of one schedule within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  /// Deposit confirmed on chain, schedule advanced
  Executed,
  /// Chain write failed, retry on a later tick
  Failed,
  /// Third consecutive failure, schedule deactivated
  Disabled,
  /// Vault already matured, schedule deactivated without a chain write
  Matured,
  /// Another invocation holds the claim for this slot
  Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
  pub schedule_id: String,
  pub vault: Address,
  pub status: TaskStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tx_hash: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub failures: u32,
}

/// Serializable result of one scheduler tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickSummary {
  pub processed: usize,
  pub details: Vec<TaskReport>,
}

impl TickSummary {
  pub fn count(&self, status: TaskStatus) -> usize {
    self.details.iter().filter(|d| d.status == status).count()
  }
}

/// Parameters for opting a vault into auto-deposit.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
  pub vault: Address,
  pub owner: Address,
  pub amount: Amount,
  pub frequency: Frequency,
  pub execution_day: u8,
  pub execution_time: chrono::NaiveTime,
}

/// Create a schedule with its first run placed from the configured day and
/// time. The schedule starts active with a clean failure counter.
pub async fn create_schedule<S: LedgerStore>(
  store: &S,
  request: ScheduleRequest,
  now: UnixSeconds,
) -> Result<AutoDepositSchedule, StoreError> {
  let schedule = AutoDepositSchedule {
    id: Uuid::new_v4().to_string(),
    vault: request.vault,
    owner: request.owner,
    amount: request.amount,
    frequency: request.frequency,
    execution_day: request.execution_day,
    execution_time: request.execution_time,
    last_run_at: None,
    next_run_at: first_run_at(request.frequency, request.execution_day, request.execution_time, now),
    active: true,
    failures: 0,
    claimed_at: None,
  };
  store.insert_schedule(&schedule).await?;
  log::info!(
    "created {:?} auto-deposit schedule {} for vault {}",
    schedule.frequency,
    schedule.id,
    schedule.vault.short()
  );
  Ok(schedule)
}

pub struct AutoDepositEngine<S, C, N> {
  store: S,
  chain: C,
  notifier: N,
}

impl<S, C, N> AutoDepositEngine<S, C, N>
where
  S: LedgerStore,
  C: ChainReader + ChainWriter,
  N: Notifier,
{
  pub fn new(store: S, chain: C, notifier: N) -> Self {
    AutoDepositEngine { store, chain, notifier }
  }

  /// Run one scheduler tick at `now`.
  ///
  /// The initial schedule query propagates; everything after it is
  /// isolated per schedule, so one misbehaving vault cannot block the
  /// rest of the batch. Due-ness is `next_run_at <= now`.
  pub async fn run_tick(&self, now: UnixSeconds) -> Result<TickSummary, StoreError> {
    let schedules = self.store.active_schedules().await?;
    let due: Vec<AutoDepositSchedule> =
      schedules.into_iter().filter(|s| s.next_run_at <= now).collect();
    if due.is_empty() {
      return Ok(TickSummary::default());
    }

    let decimals = match bounded(self.chain.token_decimals()).await {
      Ok(decimals) => decimals,
      Err(err) => {
        log::warn!("token decimals read failed, formatting with 6: {err}");
        6
      }
    };

    let mut details = Vec::with_capacity(due.len());
    for schedule in &due {
      details.push(self.process_one(schedule, decimals, now).await);
    }

    let summary = TickSummary { processed: details.len(), details };
    log::info!(
      "tick processed {} schedule(s): {} executed, {} failed, {} disabled",
      summary.processed,
      summary.count(TaskStatus::Executed),
      summary.count(TaskStatus::Failed),
      summary.count(TaskStatus::Disabled)
    );
    Ok(summary)
  }

  async fn process_one(
    &self,
    schedule: &AutoDepositSchedule,
    decimals: u8,
    now: UnixSeconds,
  ) -> TaskReport {
    match self.store.claim_due(&schedule.id, schedule.next_run_at, now).await {
      Ok(true) => {}
      Ok(false) => {
        log::debug!("schedule {} already claimed, skipping", schedule.id);
        return report(schedule, TaskStatus::Skipped, None, None, schedule.failures);
      }
      Err(err) => {
        log::warn!("claim failed for schedule {}: {err}", schedule.id);
        return report(schedule, TaskStatus::Skipped, None, Some(err.to_string()), schedule.failures);
      }
    }

    // Matured vaults reject deposits on chain; catching this before the
    // write avoids a doomed transaction and is not counted as a failure.
    match bounded(self.chain.vault_unlock_at(&schedule.vault)).await {
      Ok(unlock_at) if unlock_at <= now => return self.deactivate_matured(schedule).await,
      Ok(_) => {}
      Err(err) => return self.record_failure(schedule, decimals, now, err).await,
    }

    // A write that outlives the timeout counts as a failed attempt; the
    // slot stays put and is retried on a later tick.
    match bounded(self.chain.execute_auto_deposit(&schedule.vault, schedule.amount)).await {
      Ok(tx_hash) => self.record_success(schedule, tx_hash, decimals, now).await,
      Err(err) => self.record_failure(schedule, decimals, now, err).await,
    }
  }

  async fn deactivate_matured(&self, schedule: &AutoDepositSchedule) -> TaskReport {
    let mut updated = schedule.clone();
    updated.active = false;
    updated.claimed_at = None;
    if let Err(err) = self.store.update_schedule(&updated).await {
      log::error!("failed to deactivate matured schedule {}: {err}", schedule.id);
      return report(schedule, TaskStatus::Matured, None, Some(err.to_string()), schedule.failures);
    }
    log::info!(
      "vault {} matured, auto-deposit schedule {} deactivated",
      schedule.vault.short(),
      schedule.id
    );
    report(schedule, TaskStatus::Matured, None, None, schedule.failures)
  }

  async fn record_success(
    &self,
    schedule: &AutoDepositSchedule,
    tx_hash: String,
    decimals: u8,
    now: UnixSeconds,
  ) -> TaskReport {
    let mut updated = schedule.clone();
    updated.last_run_at = Some(now);
    updated.next_run_at = next_run_after(schedule.frequency, schedule.execution_time, now);
    updated.failures = 0;
    updated.claimed_at = None;

    let purpose = match bounded(self.chain.vault_purpose(&schedule.vault)).await {
      Ok(purpose) => purpose,
      Err(err) => {
        log::debug!("purpose read failed for vault {}: {err}", schedule.vault.short());
        FALLBACK_PURPOSE.to_string()
      }
    };
    let receipt = Receipt {
      id: Uuid::new_v4().to_string(),
      wallet: schedule.owner.clone(),
      vault: schedule.vault.clone(),
      tx_hash: tx_hash.clone(),
      timestamp: now,
      purpose: purpose.clone(),
      amount: schedule.amount,
      penalty: None,
      verified: true,
      kind: ReceiptKind::Created,
      proof_id: None,
    };

    // The deposit is confirmed on chain at this point; a ledger failure
    // here loses bookkeeping, not funds, and must stay loud in the logs.
    let mut ledger_error = None;
    if let Err(err) = self.store.update_schedule(&updated).await {
      log::error!(
        "schedule {} not advanced after confirmed deposit tx {tx_hash} into vault {}: {err}",
        schedule.id,
        schedule.vault.short()
      );
      ledger_error = Some(err.to_string());
    }
    if let Err(err) = self.store.append_receipt(&receipt).await {
      log::error!(
        "receipt missing for confirmed deposit tx {tx_hash} into vault {}: {err}",
        schedule.vault.short()
      );
      ledger_error.get_or_insert(err.to_string());
    }

    let amount_text = format_units(schedule.amount, decimals);
    self
      .send_notification(
        &schedule.owner,
        "Auto-deposit executed",
        &format!("Deposited {amount_text} into \"{purpose}\""),
        NotificationKind::Success,
        Some(receipt.id.clone()),
        now,
      )
      .await;
    self
      .send_deposit_email(
        &schedule.owner,
        EmailKind::DepositConfirmed,
        EmailPayload {
          to: String::new(),
          purpose,
          amount: amount_text,
          tx_hash: Some(tx_hash.clone()),
          unlock_date: None,
          days_remaining: None,
        },
      )
      .await;

    report(schedule, TaskStatus::Executed, Some(tx_hash), ledger_error, 0)
  }

  async fn record_failure(
    &self,
    schedule: &AutoDepositSchedule,
    decimals: u8,
    now: UnixSeconds,
    err: ChainError,
  ) -> TaskReport {
    let failures = schedule.failures + 1;
    let disabled = failures >= MAX_CONSECUTIVE_FAILURES;
    log::warn!(
      "auto-deposit into vault {} failed ({failures}/{MAX_CONSECUTIVE_FAILURES}): {err}",
      schedule.vault.short()
    );

    // next_run_at is untouched so the slot is retried on later ticks.
    let mut updated = schedule.clone();
    updated.failures = failures;
    updated.active = !disabled;
    updated.claimed_at = None;
    if let Err(store_err) = self.store.update_schedule(&updated).await {
      log::error!("failure count not recorded for schedule {}: {store_err}", schedule.id);
      return report(schedule, TaskStatus::Failed, None, Some(store_err.to_string()), schedule.failures);
    }

    let amount_text = format_units(schedule.amount, decimals);
    if disabled {
      self
        .send_notification(
          &schedule.owner,
          "Auto-deposit cancelled",
          &format!(
            "Your recurring deposit of {amount_text} was cancelled after {MAX_CONSECUTIVE_FAILURES} failed attempts. Check your token balance and allowance, then set it up again."
          ),
          NotificationKind::Error,
          None,
          now,
        )
        .await;
      self
        .send_deposit_email(
          &schedule.owner,
          EmailKind::AutoDepositCancelled,
          EmailPayload { amount: amount_text, ..EmailPayload::default() },
        )
        .await;
      return report(schedule, TaskStatus::Disabled, None, Some(err.to_string()), failures);
    }

    // The attempt failed but the schedule stays live; the owner hears
    // about every miss, not just the final cancellation.
    self
      .send_notification(
        &schedule.owner,
        "Auto-deposit failed",
        &format!(
          "Failed to deposit {amount_text} (attempt {failures} of {MAX_CONSECUTIVE_FAILURES}). Check your token balance and allowance."
        ),
        NotificationKind::Error,
        None,
        now,
      )
      .await;

    report(schedule, TaskStatus::Failed, None, Some(err.to_string()), failures)
  }

  async fn send_notification(
    &self,
    recipient: &Address,
    title: &str,
    message: &str,
    kind: NotificationKind,
    receipt_id: Option<String>,
    now: UnixSeconds,
  ) {
    let notification = Notification {
      id: Uuid::new_v4().to_string(),
      recipient: recipient.clone(),
      title: title.to_string(),
      message: message.to_string(),
      kind,
      timestamp: now,
      read: false,
      link: None,
      receipt_id,
    };
    if let Err(err) = self.notifier.notify(&notification).await {
      log::warn!("notification delivery failed for {}: {err}", recipient.short());
    }
  }

  /// Email is best-effort and gated on the owner's deposit preference.
  async fn send_deposit_email(&self, owner: &Address, kind: EmailKind, payload: EmailPayload) {
    let profile = match self.store.profile(owner).await {
      Ok(Some(profile)) => profile,
      Ok(None) => return,
      Err(err) => {
        log::warn!("profile lookup failed for {}: {err}", owner.short());
        return;
      }
    };
    if !profile.preferences.deposits {
      return;
    }
    let Some(email) = profile.email else { return };
    let payload = EmailPayload { to: email, ..payload };
    if let Err(err) = self.notifier.send_email(kind, &payload).await {
      log::warn!("email delivery failed for {}: {err}", owner.short());
    }
  }
}

fn report(
  schedule: &AutoDepositSchedule,
  status: TaskStatus,
  tx_hash: Option<String>,
  error: Option<String>,
  failures: u32,
) -> TaskReport {
  TaskReport {
    schedule_id: schedule.id.clone(),
    vault: schedule.vault.clone(),
    status,
    tx_hash,
    error,
    failures,
  }
}

async fn bounded<T>(
  call: impl std::future::Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
  tokio::time::timeout(CHAIN_CALL_TIMEOUT, call)
    .await
    .unwrap_or(Err(ChainError::Timeout(CHAIN_CALL_TIMEOUT)))
}
