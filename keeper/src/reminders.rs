//! Reminder sweep.
//!
//! Daily job over every profiled user: maturity countdown emails at fixed
//! marks before unlock, and a weekly goal nudge on Mondays for vaults still
//! far from maturity. The two never overlap because the goal nudge only
//! covers vaults beyond the last countdown mark.

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::Serialize;
use uuid::Uuid;

use primitives::params::{CHAIN_CALL_TIMEOUT, GOAL_REMINDER_MIN_DAYS, MATURITY_REMINDER_DAYS};
use primitives::units::format_units;
use primitives::{
  Address, ChainError, ChainReader, EmailKind, EmailPayload, LedgerStore, Notification,
  NotificationKind, Notifier, StoreError, UnixSeconds, UserProfile,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderStats {
  /// Users with an email address on file
  pub users: usize,
  pub countdown_emails: usize,
  pub goal_emails: usize,
  /// Vaults whose chain reads failed this sweep
  pub skipped_vaults: usize,
}

/// Run one reminder sweep at `now`.
///
/// The profile query propagates; everything below it is isolated per user
/// and per vault. Matured and empty vaults are silent: maturity itself is
/// announced by the withdrawal receipt path, not the reminder job.
pub async fn run_reminders<S, C, N>(
  store: &S,
  chain: &C,
  notifier: &N,
  now: UnixSeconds,
) -> Result<ReminderStats, StoreError>
where
  S: LedgerStore,
  C: ChainReader,
  N: Notifier,
{
  let profiles = store.profiles().await?;
  let is_monday = DateTime::<Utc>::from_timestamp(now, 0)
    .map(|dt| dt.weekday() == Weekday::Mon)
    .unwrap_or(false);

  let decimals = match bounded(chain.token_decimals()).await {
    Ok(decimals) => decimals,
    Err(err) => {
      log::warn!("token decimals read failed, formatting with 6: {err}");
      6
    }
  };

  let mut stats = ReminderStats::default();
  for profile in &profiles {
    if profile.email.is_none() {
      continue;
    }
    stats.users += 1;
    if let Err(err) = remind_user(store, chain, notifier, profile, decimals, is_monday, now, &mut stats).await {
      log::warn!("reminder sweep failed for user {}: {err}", profile.wallet.short());
    }
  }

  log::info!(
    "reminder sweep covered {} user(s): {} countdown, {} goal, {} vault(s) skipped",
    stats.users,
    stats.countdown_emails,
    stats.goal_emails,
    stats.skipped_vaults
  );
  Ok(stats)
}

async fn remind_user<S, C, N>(
  store: &S,
  chain: &C,
  notifier: &N,
  profile: &UserProfile,
  decimals: u8,
  is_monday: bool,
  now: UnixSeconds,
  stats: &mut ReminderStats,
) -> Result<(), StoreError>
where
  S: LedgerStore,
  C: ChainReader,
  N: Notifier,
{
  let Some(email) = profile.email.clone() else { return Ok(()) };
  let vaults = store.vaults_by_owner(&profile.wallet).await?;

  for record in &vaults {
    let (balance, unlock_at) = match vault_reads(chain, &record.vault).await {
      Ok(reads) => reads,
      Err(err) => {
        log::warn!("skipping vault {} in reminder sweep: {err}", record.vault.short());
        stats.skipped_vaults += 1;
        continue;
      }
    };
    if balance == 0 || unlock_at <= now {
      continue;
    }
    let days_remaining = (unlock_at - now + 86_399) / 86_400;
    let amount = format_units(balance, decimals);
    let unlock_date = DateTime::<Utc>::from_timestamp(unlock_at, 0)
      .map(|dt| dt.format("%Y-%m-%d").to_string());

    if profile.preferences.maturity_warnings && MATURITY_REMINDER_DAYS.contains(&days_remaining) {
      let payload = EmailPayload {
        to: email.clone(),
        purpose: record.purpose.clone(),
        amount,
        tx_hash: None,
        unlock_date,
        days_remaining: Some(days_remaining),
      };
      if let Err(err) = notifier.send_email(EmailKind::MaturityCountdown, &payload).await {
        log::warn!("countdown email failed for {}: {err}", profile.wallet.short());
        continue;
      }
      countdown_notification(notifier, &profile.wallet, record.purpose.as_str(), days_remaining, now)
        .await;
      stats.countdown_emails += 1;
    } else if is_monday && profile.preferences.deposits && days_remaining > GOAL_REMINDER_MIN_DAYS {
      let payload = EmailPayload {
        to: email.clone(),
        purpose: record.purpose.clone(),
        amount,
        tx_hash: None,
        unlock_date,
        days_remaining: Some(days_remaining),
      };
      if let Err(err) = notifier.send_email(EmailKind::GoalReminder, &payload).await {
        log::warn!("goal email failed for {}: {err}", profile.wallet.short());
        continue;
      }
      stats.goal_emails += 1;
    }
  }
  Ok(())
}

async fn countdown_notification<N: Notifier>(
  notifier: &N,
  recipient: &Address,
  purpose: &str,
  days_remaining: i64,
  now: UnixSeconds,
) {
  let notification = Notification {
    id: Uuid::new_v4().to_string(),
    recipient: recipient.clone(),
    title: "Vault maturing soon".to_string(),
    message: format!("\"{purpose}\" unlocks in {days_remaining} day(s)"),
    kind: NotificationKind::Warning,
    timestamp: now,
    read: false,
    link: None,
    receipt_id: None,
  };
  if let Err(err) = notifier.notify(&notification).await {
    log::warn!("countdown notification failed for {}: {err}", recipient.short());
  }
}

async fn vault_reads<C: ChainReader>(
  chain: &C,
  vault: &Address,
) -> Result<(u128, UnixSeconds), ChainError> {
  tokio::try_join!(bounded(chain.vault_balance(vault)), bounded(chain.vault_unlock_at(vault)))
}

async fn bounded<T>(
  call: impl std::future::Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
  tokio::time::timeout(CHAIN_CALL_TIMEOUT, call)
    .await
    .unwrap_or(Err(ChainError::Timeout(CHAIN_CALL_TIMEOUT)))
}
