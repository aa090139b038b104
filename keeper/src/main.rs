//! vaultkeeper: off-chain keeper for on-chain savings vaults.
//!
//! Each subcommand is one batch job an external scheduler invokes: the
//! auto-deposit tick, the reminder sweep, reconciliation, statistics, the
//! beneficiary release sweep, and vault creation. State lives in a JSON
//! ledger file plus a chain snapshot file; both paths come from the
//! environment or flags.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;

use engine_creation_flow::CreationRequest;
use primitives::units::parse_units;
use primitives::{Address, ChainReader, ChainWriter};

mod chain;
mod config;
mod logger;
mod notify;
mod reminders;
mod store;
#[cfg(test)]
mod tests;
mod trigger;

use chain::SnapshotChain;
use config::KeeperConfig;
use notify::{LocalProofIssuer, StoreNotifier};
use store::JsonStore;

#[derive(Parser)]
#[command(name = "vaultkeeper", version, about = "Off-chain keeper for savings vaults")]
struct Cli {
  #[command(flatten)]
  config: KeeperConfig,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run one auto-deposit scheduler tick
  ProcessDeposits {
    /// Shared secret presented by the calling cron
    #[arg(long)]
    secret: Option<String>,
  },
  /// Send maturity countdown and weekly goal reminder emails
  Reminders,
  /// Reconcile and classify one owner's vaults
  Reconcile {
    #[arg(long)]
    owner: String,
  },
  /// Protocol-wide statistics
  Stats,
  /// List vaults claimable by their beneficiary
  BeneficiarySweep {
    /// Also submit the release transactions
    #[arg(long)]
    release: bool,
  },
  /// Create a vault with its ledger records
  CreateVault {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    purpose: String,
    /// Days until unlock
    #[arg(long)]
    lock_days: u32,
    /// Initial deposit, in tokens
    #[arg(long, default_value = "0")]
    amount: String,
    /// Early-break penalty in basis points
    #[arg(long, default_value_t = 500)]
    penalty_bps: u32,
    #[arg(long)]
    beneficiary: Option<String>,
    /// Savings goal, in tokens
    #[arg(long)]
    target: Option<String>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  logger::init(&cli.config.log);

  let store = JsonStore::open(&cli.config.db).context("opening ledger database")?;
  let chain = SnapshotChain::open(&cli.config.chain).context("opening chain snapshot")?;
  let notifier = StoreNotifier::new(store.clone());
  let now = chrono::Utc::now().timestamp();

  match cli.command {
    Command::ProcessDeposits { secret } => {
      let summary = trigger::process_deposits(
        &store,
        &chain,
        &notifier,
        cli.config.trigger_secret.as_deref(),
        secret.as_deref(),
        now,
      )
      .await?;
      emit(&summary)
    }
    Command::Reminders => {
      let stats = reminders::run_reminders(&store, &chain, &notifier, now).await?;
      emit(&stats)
    }
    Command::Reconcile { owner } => {
      let overview =
        trigger::reconcile(&store, &chain, &cli.config.factory_address(), &Address::new(&owner), now)
          .await?;
      emit(&overview)
    }
    Command::Stats => {
      let stats = trigger::stats(&store, &chain, now).await?;
      emit(&stats)
    }
    Command::BeneficiarySweep { release } => {
      let report = trigger::beneficiary_sweep(&chain, now).await?;
      if release {
        for candidate in &report.eligible {
          let tx_hash = chain.trigger_beneficiary_claim(&candidate.vault).await?;
          log::info!(
            "released vault {} to beneficiary {} in tx {tx_hash}",
            candidate.vault.short(),
            candidate.beneficiary.short()
          );
        }
      }
      emit(&report)
    }
    Command::CreateVault { owner, purpose, lock_days, amount, penalty_bps, beneficiary, target } => {
      let decimals = chain.token_decimals().await?;
      let amount = parse_units(&amount, decimals)
        .ok_or_else(|| anyhow!("invalid token amount {amount:?}"))?;
      let target_amount = target
        .map(|t| parse_units(&t, decimals).ok_or_else(|| anyhow!("invalid token amount {t:?}")))
        .transpose()?;
      let request = CreationRequest {
        owner: Address::new(&owner),
        factory: cli.config.factory_address(),
        purpose,
        unlock_at: now + i64::from(lock_days) * 86_400,
        penalty_bps,
        amount,
        target_amount,
        beneficiary: beneficiary.map(|b| Address::new(&b)),
        auto_deposit: None,
      };
      let outcome = engine_creation_flow::run(&store, &chain, &LocalProofIssuer, request, now).await?;
      emit(&outcome)
    }
  }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
