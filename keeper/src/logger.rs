//! Minimal stderr logger behind the `log` facade.

use log::{LevelFilter, Metadata, Record};

struct StderrLogger;

impl log::Log for StderrLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= log::max_level()
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      eprintln!("{:<5} {} {}", record.level(), record.target(), record.args());
    }
  }

  fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Install the logger. Unknown level strings fall back to `info`; a second
/// call is a no-op so tests can initialize freely.
pub fn init(level: &str) {
  let filter = level.parse().unwrap_or(LevelFilter::Info);
  if log::set_logger(&LOGGER).is_ok() {
    log::set_max_level(filter);
  }
}
