//! Keeper configuration.
//!
//! Everything comes from the environment with CLI flags taking precedence;
//! clap handles both through the same declarations.

use std::path::PathBuf;

use clap::Args;

use primitives::Address;

#[derive(Debug, Clone, Args)]
pub struct KeeperConfig {
  /// Ledger database file
  #[arg(long, env = "KEEPER_DB", default_value = "keeper-db.json", global = true)]
  pub db: PathBuf,

  /// Chain snapshot file
  #[arg(long, env = "KEEPER_CHAIN", default_value = "chain-snapshot.json", global = true)]
  pub chain: PathBuf,

  /// Factory contract address stamped on backfilled registry records
  #[arg(
    long,
    env = "KEEPER_FACTORY",
    default_value = "0x0000000000000000000000000000000000000000",
    global = true
  )]
  pub factory: String,

  /// Shared secret required by the process-deposits trigger. Unset means
  /// the trigger is open; set it everywhere outside local development.
  #[arg(long, env = "KEEPER_TRIGGER_SECRET", hide_env_values = true, global = true)]
  pub trigger_secret: Option<String>,

  /// Log level (error, warn, info, debug, trace)
  #[arg(long, env = "KEEPER_LOG", default_value = "info", global = true)]
  pub log: String,
}

impl KeeperConfig {
  pub fn factory_address(&self) -> Address {
    Address::new(&self.factory)
  }
}
