//! System-wide tuning parameters.
//!
//! Single source of truth for retry bounds, batching, timeouts and reminder
//! cadence, shared by every engine.

use std::time::Duration;

/// Consecutive auto-deposit failures after which a schedule is deactivated.
///
/// The deactivation happens in the same ledger update that records the
/// third failure, so an active schedule never shows `failures >= 3`.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Chunk size for fanned-out vault balance reads.
///
/// Bounds concurrent outstanding RPC requests when classifying large vault
/// sets. A tuning parameter, not a correctness requirement.
pub const BALANCE_CHUNK_SIZE: usize = 20;

/// Interval of the test-only `minutely` cadence.
pub const MINUTELY_INTERVAL_SECS: i64 = 60;

/// Bounded timeout applied to every individual chain call inside batch
/// sweeps, so one hung RPC call cannot stall an entire tick.
pub const CHAIN_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Age after which an in-flight schedule claim is considered abandoned and
/// may be re-claimed. Covers scheduler invocations that crashed mid-tick.
pub const CLAIM_STALE_AFTER_SECS: i64 = 600;

/// Days-before-unlock marks at which a maturity countdown email is sent.
pub const MATURITY_REMINDER_DAYS: [i64; 3] = [7, 3, 1];

/// Weekly goal reminders only go to vaults with more than this many days
/// left; closer vaults are covered by the countdown emails.
pub const GOAL_REMINDER_MIN_DAYS: i64 = 7;
