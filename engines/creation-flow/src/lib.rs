//! Creation Flow
//!
//! Vault creation crosses three systems (token approval, factory contract,
//! ledger) plus an external proof issuer, and each step can fail
//! independently. The flow is modeled as an explicit state machine with a
//! single transition function; the async driver walks it step by step, so
//! every partial outcome has a name and the caller always learns how far
//! the flow got.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use engine_auto_deposit::ScheduleRequest;
use primitives::{
  Address, Amount, ChainError, ChainWriter, Frequency, LedgerStore, ProofIssuer, Receipt,
  ReceiptKind, StoreError, UnixSeconds, VaultRecord,
};

#[cfg(test)]
pub mod mock;

/// Where a creation flow currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum FlowState {
  Idle,
  Approving,
  Creating,
  GeneratingProof,
  Done,
  Failed(String),
}

impl FlowState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, FlowState::Done | FlowState::Failed(_))
  }
}

impl Default for FlowState {
  fn default() -> Self {
    FlowState::Idle
  }
}

/// Flow events, emitted by the driver as steps complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
  Start,
  Approved,
  Created,
  ProofHandled,
  Fail(String),
}

/// The creation state machine. All transition logic lives in [`apply`];
/// the driver never mutates state directly.
///
/// [`apply`]: CreationFlow::apply
#[derive(Debug, Clone, Default)]
pub struct CreationFlow {
  state: FlowState,
}

impl CreationFlow {
  pub fn new() -> Self {
    CreationFlow::default()
  }

  pub fn state(&self) -> &FlowState {
    &self.state
  }

  /// Apply one event. Terminal states absorb everything; `Fail` is
  /// accepted from every non-terminal state; an event arriving in the
  /// wrong state fails the flow rather than corrupting it.
  pub fn apply(&mut self, event: FlowEvent) -> &FlowState {
    if self.state.is_terminal() {
      return &self.state;
    }
    self.state = match (&self.state, event) {
      (_, FlowEvent::Fail(reason)) => FlowState::Failed(reason),
      (FlowState::Idle, FlowEvent::Start) => FlowState::Approving,
      (FlowState::Approving, FlowEvent::Approved) => FlowState::Creating,
      (FlowState::Creating, FlowEvent::Created) => FlowState::GeneratingProof,
      (FlowState::GeneratingProof, FlowEvent::ProofHandled) => FlowState::Done,
      (state, event) => FlowState::Failed(format!("unexpected {event:?} in {state:?}")),
    };
    &self.state
  }
}

/// Recurring deposit opt-in carried by a creation request.
#[derive(Debug, Clone)]
pub struct AutoDepositOptIn {
  pub amount: Amount,
  pub frequency: Frequency,
  pub execution_day: u8,
  pub execution_time: chrono::NaiveTime,
}

#[derive(Debug, Clone)]
pub struct CreationRequest {
  pub owner: Address,
  pub factory: Address,
  pub purpose: String,
  pub unlock_at: UnixSeconds,
  pub penalty_bps: u32,
  /// Initial deposit in base units; zero creates an empty vault.
  pub amount: Amount,
  pub target_amount: Option<Amount>,
  pub beneficiary: Option<Address>,
  pub auto_deposit: Option<AutoDepositOptIn>,
}

/// Everything a successful flow produced.
#[derive(Debug, Clone, Serialize)]
pub struct CreationOutcome {
  pub vault: Address,
  pub tx_hash: String,
  pub receipt_id: String,
  /// Absent when proof issuance or attachment failed; the flow still
  /// completes, the receipt just stays unproven.
  pub proof_id: Option<String>,
  pub schedule_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum CreationError {
  #[error(transparent)]
  Chain(#[from] ChainError),
  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Drive a creation flow to completion.
///
/// Chain and ledger failures abort the flow into `Failed`; the proof stage
/// is best-effort because the vault already exists on chain by then and a
/// missing proof is recoverable offline.
pub async fn run<S, C, P>(
  store: &S,
  chain: &C,
  proofs: &P,
  request: CreationRequest,
  now: UnixSeconds,
) -> Result<CreationOutcome, CreationError>
where
  S: LedgerStore,
  C: ChainWriter,
  P: ProofIssuer,
{
  let mut flow = CreationFlow::new();
  flow.apply(FlowEvent::Start);

  // Zero initial deposit needs no allowance.
  if request.amount > 0 {
    if let Err(err) = chain.approve(&request.factory, request.amount).await {
      flow.apply(FlowEvent::Fail(err.to_string()));
      return Err(err.into());
    }
  }
  flow.apply(FlowEvent::Approved);

  let created = chain
    .create_personal_vault(
      &request.purpose,
      request.unlock_at,
      request.penalty_bps,
      request.amount,
      request.beneficiary.as_ref(),
    )
    .await;
  let (vault, tx_hash) = match created {
    Ok(created) => created,
    Err(err) => {
      flow.apply(FlowEvent::Fail(err.to_string()));
      return Err(err.into());
    }
  };
  log::info!("created vault {} for owner {} in tx {tx_hash}", vault.short(), request.owner.short());

  let record = VaultRecord {
    vault: vault.clone(),
    owner: request.owner.clone(),
    factory: request.factory.clone(),
    created_at: now,
    purpose: request.purpose.clone(),
    target_amount: request.target_amount,
    beneficiary: request.beneficiary.clone(),
  };
  let receipt = Receipt {
    id: Uuid::new_v4().to_string(),
    wallet: request.owner.clone(),
    vault: vault.clone(),
    tx_hash: tx_hash.clone(),
    timestamp: now,
    purpose: request.purpose.clone(),
    amount: request.amount,
    penalty: None,
    verified: true,
    kind: ReceiptKind::Created,
    proof_id: None,
  };
  if let Err(err) = ledger_writes(store, &record, &receipt).await {
    flow.apply(FlowEvent::Fail(err.to_string()));
    return Err(err.into());
  }
  flow.apply(FlowEvent::Created);

  let proof_id = match proofs.issue(&receipt).await {
    Ok(proof_id) => match store.attach_proof(&receipt.id, &proof_id).await {
      Ok(()) => Some(proof_id),
      Err(err) => {
        log::warn!("proof {proof_id} not attached to receipt {}: {err}", receipt.id);
        None
      }
    },
    Err(err) => {
      log::warn!("proof issuance failed for receipt {}: {err}", receipt.id);
      None
    }
  };

  let mut schedule_id = None;
  if let Some(opt_in) = request.auto_deposit {
    let schedule = engine_auto_deposit::create_schedule(
      store,
      ScheduleRequest {
        vault: vault.clone(),
        owner: request.owner.clone(),
        amount: opt_in.amount,
        frequency: opt_in.frequency,
        execution_day: opt_in.execution_day,
        execution_time: opt_in.execution_time,
      },
      now,
    )
    .await;
    match schedule {
      Ok(schedule) => schedule_id = Some(schedule.id),
      Err(err) => {
        flow.apply(FlowEvent::Fail(err.to_string()));
        return Err(err.into());
      }
    }
  }

  flow.apply(FlowEvent::ProofHandled);
  Ok(CreationOutcome { vault, tx_hash, receipt_id: receipt.id, proof_id, schedule_id })
}

async fn ledger_writes<S: LedgerStore>(
  store: &S,
  record: &VaultRecord,
  receipt: &Receipt,
) -> Result<(), StoreError> {
  store.upsert_vault(record).await?;
  store.append_receipt(receipt).await?;
  Ok(())
}
