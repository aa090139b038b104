//! Notification and proof collaborators.

use uuid::Uuid;

use primitives::{
  EmailKind, EmailPayload, LedgerStore, Notification, Notifier, NotifyError, ProofError,
  ProofIssuer, Receipt,
};

/// Notifier that persists in-app records through the ledger store and logs
/// outgoing email. The real mail transport is an external service; the
/// keeper only decides and records what would be sent.
#[derive(Clone)]
pub struct StoreNotifier<S> {
  store: S,
}

impl<S> StoreNotifier<S> {
  pub fn new(store: S) -> Self {
    StoreNotifier { store }
  }
}

impl<S: LedgerStore> Notifier for StoreNotifier<S> {
  async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
    self
      .store
      .append_notification(notification)
      .await
      .map_err(|e| NotifyError(e.to_string()))
  }

  async fn send_email(&self, kind: EmailKind, payload: &EmailPayload) -> Result<(), NotifyError> {
    let rendered =
      serde_json::to_string(payload).map_err(|e| NotifyError(e.to_string()))?;
    log::info!("email {kind:?} -> {}: {rendered}", payload.to);
    Ok(())
  }
}

/// Proof issuer handing out locally generated ids. A hosted attestation
/// service sits behind the same trait in production.
#[derive(Clone, Default)]
pub struct LocalProofIssuer;

impl ProofIssuer for LocalProofIssuer {
  async fn issue(&self, receipt: &Receipt) -> Result<String, ProofError> {
    let proof_id = Uuid::new_v4().to_string();
    log::debug!("issued proof {proof_id} for receipt {}", receipt.id);
    Ok(proof_id)
  }
}
