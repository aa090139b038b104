//! Next-run placement for recurring schedules.
//!
//! All arithmetic is in UTC. A schedule's `execution_day` places the first
//! run only; once a schedule is running, each advance is a fixed calendar
//! step from the executed tick's timestamp at the configured time of day.
//! An execution delayed past its slot therefore shifts the weekday of a
//! weekly schedule rather than snapping back to the configured day.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

use primitives::params::MINUTELY_INTERVAL_SECS;
use primitives::{Frequency, UnixSeconds};

fn utc(ts: UnixSeconds) -> DateTime<Utc> {
  DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

fn at(date: NaiveDate, time: NaiveTime) -> UnixSeconds {
  date.and_time(time).and_utc().timestamp()
}

/// Next run strictly after an execution at `from`.
///
/// Minutely ignores `execution_time` and steps exactly 60 seconds. Daily
/// always lands on the next calendar day, even when the execution ran
/// before `execution_time` on its own day. Monthly steps one calendar
/// month with the day of month clamped (Jan 31 advances to Feb 28/29).
pub fn next_run_after(
  frequency: Frequency,
  execution_time: NaiveTime,
  from: UnixSeconds,
) -> UnixSeconds {
  let date = match frequency {
    Frequency::Minutely => return from + MINUTELY_INTERVAL_SECS,
    Frequency::Daily => utc(from).date_naive() + Days::new(1),
    Frequency::Weekly => utc(from).date_naive() + Days::new(7),
    Frequency::Monthly => utc(from).date_naive() + Months::new(1),
  };
  at(date, execution_time)
}

/// Placement of a brand new schedule's first run, strictly after `from`.
///
/// Weekly schedules target the ISO weekday `execution_day` (1 = Monday);
/// monthly schedules target that day of month (1-28). Daily schedules run
/// today at `execution_time` when that is still ahead, otherwise tomorrow.
pub fn first_run_at(
  frequency: Frequency,
  execution_day: u8,
  execution_time: NaiveTime,
  from: UnixSeconds,
) -> UnixSeconds {
  let today = utc(from).date_naive();
  match frequency {
    Frequency::Minutely => from + MINUTELY_INTERVAL_SECS,
    Frequency::Daily => {
      let candidate = at(today, execution_time);
      if candidate > from {
        candidate
      } else {
        at(today + Days::new(1), execution_time)
      }
    }
    Frequency::Weekly => {
      let target = u32::from(execution_day.clamp(1, 7));
      let ahead = (target + 7 - today.weekday().number_from_monday()) % 7;
      let candidate = at(today + Days::new(u64::from(ahead)), execution_time);
      if candidate > from {
        candidate
      } else {
        at(today + Days::new(u64::from(ahead) + 7), execution_time)
      }
    }
    Frequency::Monthly => {
      let day = u32::from(execution_day.clamp(1, 28));
      let date = today.with_day(day).unwrap_or(today);
      let candidate = at(date, execution_time);
      if candidate > from {
        candidate
      } else {
        at(date + Months::new(1), execution_time)
      }
    }
  }
}
