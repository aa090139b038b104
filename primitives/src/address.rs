use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hex address of a wallet, vault or factory contract.
///
/// Identity keys are a correctness hazard: the same address checksummed two
/// ways must never produce two ledger documents. Normalization therefore
/// happens exactly once, at construction — every constructor (including the
/// serde boundary) lower-cases the raw string, and all comparison, hashing
/// and display operate on the normalized form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

/// The zero address, meaning "no beneficiary configured" on chain.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

impl Address {
  pub fn new(raw: &str) -> Self {
    Address(raw.trim().to_ascii_lowercase())
  }

  pub fn zero() -> Self {
    Address(ZERO_ADDRESS.to_string())
  }

  pub fn is_zero(&self) -> bool {
    self.0 == ZERO_ADDRESS
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Abbreviated `0xabcd..ef12` form for logs and notification text.
  ///
  /// Cuts on char boundaries, so a malformed address that slipped in
  /// through user input still formats instead of panicking.
  pub fn short(&self) -> String {
    match (self.0.char_indices().nth(6), self.0.char_indices().nth_back(3)) {
      (Some((head, _)), Some((tail, _))) if head < tail => {
        format!("{}..{}", &self.0[..head], &self.0[tail..])
      }
      _ => self.0.clone(),
    }
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for Address {
  fn from(raw: String) -> Self {
    Address::new(&raw)
  }
}

impl From<Address> for String {
  fn from(addr: Address) -> Self {
    addr.0
  }
}

impl FromStr for Address {
  type Err = core::convert::Infallible;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    Ok(Address::new(raw))
  }
}
