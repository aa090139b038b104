//! Unit tests for the Auto-Deposit Scheduler.

use primitives::params::MAX_CONSECUTIVE_FAILURES;
use primitives::{EmailKind, Frequency, NotificationKind, ReceiptKind, StoreError};

use crate::mock::*;
use crate::schedule::{first_run_at, next_run_after};
use crate::{create_schedule, ScheduleRequest, TaskStatus};

mod placement {
  use super::*;

  #[test]
  fn minutely_advances_exactly_sixty_seconds() {
    assert_eq!(next_run_after(Frequency::Minutely, nine_am(), NOW), NOW + 60);
    assert_eq!(next_run_after(Frequency::Minutely, nine_am(), NOW + 7), NOW + 67);
  }

  #[test]
  fn daily_lands_on_next_day_at_configured_time() {
    // Executed 2024-01-10T12:00Z with a 09:00 slot: the next run is
    // 2024-01-11T09:00Z, not 21 hours later.
    assert_eq!(next_run_after(Frequency::Daily, nine_am(), 1_704_888_000), 1_704_963_600);
  }

  #[test]
  fn daily_advances_even_when_executed_before_the_slot() {
    // 2024-01-10T03:00Z is before 09:00 that day; the advance still
    // skips to the 11th.
    assert_eq!(next_run_after(Frequency::Daily, nine_am(), 1_704_855_600), 1_704_963_600);
  }

  #[test]
  fn weekly_steps_seven_days() {
    assert_eq!(next_run_after(Frequency::Weekly, nine_am(), 1_704_888_000), 1_705_482_000);
  }

  #[test]
  fn monthly_clamps_day_of_month() {
    // 2024-01-31T09:00Z advances to 2024-02-29T09:00Z.
    assert_eq!(next_run_after(Frequency::Monthly, nine_am(), 1_706_691_600), 1_709_197_200);
  }

  #[test]
  fn first_daily_run_is_today_when_the_slot_is_ahead() {
    let eleven_pm = chrono::NaiveTime::from_hms_opt(23, 0, 0).unwrap();
    assert_eq!(first_run_at(Frequency::Daily, 1, eleven_pm, NOW), 1_700_002_800);
  }

  #[test]
  fn first_daily_run_rolls_to_tomorrow_when_the_slot_passed() {
    assert_eq!(first_run_at(Frequency::Daily, 1, nine_am(), NOW), 1_700_038_800);
  }

  #[test]
  fn first_weekly_run_targets_the_configured_weekday() {
    // NOW is a Tuesday; day 5 is the coming Friday.
    assert_eq!(first_run_at(Frequency::Weekly, 5, nine_am(), NOW), 1_700_211_600);
    // Day 2 is today, but 09:00 already passed: next Tuesday.
    assert_eq!(first_run_at(Frequency::Weekly, 2, nine_am(), NOW), 1_700_557_200);
  }

  #[test]
  fn first_monthly_run_targets_the_configured_day() {
    // NOW is Nov 14; day 20 is still ahead this month.
    assert_eq!(first_run_at(Frequency::Monthly, 20, nine_am(), NOW), 1_700_470_800);
    // Day 10 already passed: Dec 10.
    assert_eq!(first_run_at(Frequency::Monthly, 10, nine_am(), NOW), 1_702_198_800);
  }

  #[test]
  fn first_minutely_run_is_one_minute_out() {
    assert_eq!(first_run_at(Frequency::Minutely, 1, nine_am(), NOW), NOW + 60);
  }
}

#[tokio::test]
async fn executes_due_schedule_end_to_end() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 30 * 86_400));
  h.store.add_schedule(schedule("s1", &vault, Frequency::Daily, NOW - 10));
  h.store.add_profile(profile_with_email(&owner()));

  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.processed, 1);
  assert_eq!(summary.details[0].status, TaskStatus::Executed);
  let tx_hash = summary.details[0].tx_hash.clone().unwrap();
  assert_eq!(h.chain.deposit_calls(), vec![(vault.clone(), DEPOSIT_AMOUNT)]);

  let updated = h.store.schedule("s1").unwrap();
  assert!(updated.active);
  assert_eq!(updated.failures, 0);
  assert_eq!(updated.last_run_at, Some(NOW));
  assert_eq!(updated.next_run_at, next_run_after(Frequency::Daily, nine_am(), NOW));
  assert_eq!(updated.claimed_at, None);

  let receipts = h.store.receipts();
  assert_eq!(receipts.len(), 1);
  assert_eq!(receipts[0].kind, ReceiptKind::Created);
  assert_eq!(receipts[0].vault, vault);
  assert_eq!(receipts[0].amount, DEPOSIT_AMOUNT);
  assert_eq!(receipts[0].tx_hash, tx_hash);
  assert_eq!(receipts[0].purpose, "Car Fund");

  let notifications = h.notifier.notifications();
  assert_eq!(notifications.len(), 1);
  assert_eq!(notifications[0].kind, NotificationKind::Success);

  let emails = h.notifier.emails();
  assert_eq!(emails.len(), 1);
  assert_eq!(emails[0].0, EmailKind::DepositConfirmed);
  assert_eq!(emails[0].1.to, "alice@example.com");
  assert_eq!(emails[0].1.amount, "50");
}

#[tokio::test]
async fn ignores_schedules_not_yet_due() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 86_400));
  h.store.add_schedule(schedule("s1", &vault, Frequency::Daily, NOW + 100));

  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.processed, 0);
  assert!(h.chain.deposit_calls().is_empty());
}

#[tokio::test]
async fn failure_counts_up_without_moving_the_slot() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 86_400));
  h.chain.revert_next_deposits(vault.clone(), 1);
  h.store.add_schedule(schedule("s1", &vault, Frequency::Daily, NOW - 10));

  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.details[0].status, TaskStatus::Failed);
  assert_eq!(summary.details[0].failures, 1);
  let updated = h.store.schedule("s1").unwrap();
  assert!(updated.active);
  assert_eq!(updated.failures, 1);
  assert_eq!(updated.next_run_at, NOW - 10);
  assert_eq!(updated.claimed_at, None);

  // The owner hears about the miss even though the schedule stays live.
  let notices = h.notifier.notifications();
  assert_eq!(notices.len(), 1);
  assert_eq!(notices[0].kind, NotificationKind::Error);
  assert_eq!(notices[0].title, "Auto-deposit failed");
  assert_eq!(notices[0].recipient, owner());
}

#[tokio::test]
async fn third_failure_disables_with_a_single_notice() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 86_400));
  h.chain.revert_next_deposits(vault.clone(), 3);
  h.store.add_profile(profile_with_email(&owner()));
  let mut sched = schedule("s1", &vault, Frequency::Daily, NOW - 10);
  sched.failures = MAX_CONSECUTIVE_FAILURES - 1;
  h.store.add_schedule(sched);

  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.details[0].status, TaskStatus::Disabled);
  let updated = h.store.schedule("s1").unwrap();
  assert!(!updated.active);
  assert_eq!(updated.failures, MAX_CONSECUTIVE_FAILURES);

  let notices = h.notifier.notifications();
  assert_eq!(notices.len(), 1);
  assert_eq!(notices[0].kind, NotificationKind::Error);
  assert_eq!(notices[0].title, "Auto-deposit cancelled");
  let emails = h.notifier.emails();
  assert_eq!(emails.len(), 1);
  assert_eq!(emails[0].0, EmailKind::AutoDepositCancelled);

  // The disabled schedule is invisible to later ticks: no second notice.
  let again = h.engine.run_tick(NOW + 60).await.unwrap();
  assert_eq!(again.processed, 0);
  assert_eq!(h.notifier.notifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_deposit_times_out_as_a_failure() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 86_400));
  h.chain.hang_deposits(true);
  h.store.add_schedule(schedule("s1", &vault, Frequency::Daily, NOW - 10));

  // Paused time fast-forwards through the per-call timeout.
  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.details[0].status, TaskStatus::Failed);
  assert_eq!(summary.details[0].failures, 1);
  let updated = h.store.schedule("s1").unwrap();
  assert!(updated.active);
  assert_eq!(updated.failures, 1);
  assert_eq!(updated.next_run_at, NOW - 10);
  assert_eq!(updated.claimed_at, None);
}

#[tokio::test]
async fn matured_vault_deactivates_without_a_chain_write() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW - 100));
  h.store.add_schedule(schedule("s1", &vault, Frequency::Daily, NOW - 10));

  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.details[0].status, TaskStatus::Matured);
  assert!(h.chain.deposit_calls().is_empty());
  let updated = h.store.schedule("s1").unwrap();
  assert!(!updated.active);
  // Maturity is not a failure.
  assert_eq!(updated.failures, 0);
  assert_eq!(updated.claimed_at, None);
}

#[tokio::test]
async fn live_claim_blocks_a_second_invocation() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 86_400));
  let mut sched = schedule("s1", &vault, Frequency::Daily, NOW - 10);
  sched.claimed_at = Some(NOW - 10);
  h.store.add_schedule(sched);

  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.details[0].status, TaskStatus::Skipped);
  assert!(h.chain.deposit_calls().is_empty());
}

#[tokio::test]
async fn stale_claim_is_taken_over() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 86_400));
  let mut sched = schedule("s1", &vault, Frequency::Daily, NOW - 10);
  sched.claimed_at = Some(NOW - 700);
  h.store.add_schedule(sched);

  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.details[0].status, TaskStatus::Executed);
  assert_eq!(h.chain.deposit_calls().len(), 1);
}

#[tokio::test]
async fn success_resets_the_failure_count() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 86_400));
  let mut sched = schedule("s1", &vault, Frequency::Daily, NOW - 10);
  sched.failures = 2;
  h.store.add_schedule(sched);

  let summary = h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(summary.details[0].status, TaskStatus::Executed);
  assert_eq!(h.store.schedule("s1").unwrap().failures, 0);
}

#[tokio::test]
async fn minutely_schedule_advances_exactly_one_minute() {
  let h = harness();
  let vault = addr("v1");
  h.chain.add_vault(vault.clone(), chain_vault(&owner(), NOW + 86_400));
  h.store.add_schedule(schedule("s1", &vault, Frequency::Minutely, NOW - 5));

  h.engine.run_tick(NOW).await.unwrap();

  assert_eq!(h.store.schedule("s1").unwrap().next_run_at, NOW + 60);
}

#[tokio::test]
async fn schedule_query_failure_propagates() {
  let h = harness();
  h.store.set_fail_reads(true);

  let result = h.engine.run_tick(NOW).await;

  assert!(matches!(result, Err(StoreError::Io(_))));
}

#[tokio::test]
async fn create_schedule_places_the_first_run() {
  let store = primitives::testing::MemStore::new();
  let vault = addr("v1");

  let created = create_schedule(
    &store,
    ScheduleRequest {
      vault: vault.clone(),
      owner: owner(),
      amount: DEPOSIT_AMOUNT,
      frequency: Frequency::Weekly,
      execution_day: 5,
      execution_time: nine_am(),
    },
    NOW,
  )
  .await
  .unwrap();

  assert!(created.active);
  assert_eq!(created.failures, 0);
  assert_eq!(created.next_run_at, first_run_at(Frequency::Weekly, 5, nine_am(), NOW));
  assert_eq!(store.schedule(&created.id).unwrap(), created);
}
