//! Decimal scaling between base units and human-readable amounts.
//!
//! All arithmetic in the engines is on `u128` base units; these helpers only
//! feed notification text, summaries and CLI output.

use crate::Amount;

/// Render a base-unit amount with the token's decimals, trimming trailing
/// zeros from the fractional part (`1500000` at 6 decimals -> `"1.5"`).
pub fn format_units(amount: Amount, decimals: u8) -> String {
  let scale = 10u128.pow(decimals as u32);
  if scale == 1 {
    return amount.to_string();
  }
  let whole = amount / scale;
  let frac = amount % scale;
  if frac == 0 {
    return whole.to_string();
  }
  let frac = format!("{frac:0width$}", width = decimals as usize);
  let frac = frac.trim_end_matches('0');
  format!("{whole}.{frac}")
}

/// Parse a human-readable amount into base units. Rejects malformed input
/// and fractional parts longer than the token's decimals.
pub fn parse_units(text: &str, decimals: u8) -> Option<Amount> {
  let text = text.trim();
  let (whole, frac) = match text.split_once('.') {
    Some((w, f)) => (w, f),
    None => (text, ""),
  };
  if whole.is_empty() && frac.is_empty() {
    return None;
  }
  if frac.len() > decimals as usize {
    return None;
  }
  let whole: Amount = if whole.is_empty() { 0 } else { whole.parse().ok()? };
  let scale = 10u128.pow(decimals as u32);
  let frac_units: Amount = if frac.is_empty() {
    0
  } else {
    let parsed: Amount = frac.parse().ok()?;
    parsed * 10u128.pow((decimals as usize - frac.len()) as u32)
  };
  whole.checked_mul(scale)?.checked_add(frac_units)
}
