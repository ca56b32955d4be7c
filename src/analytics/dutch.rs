//! Dutch staking margins.
//!
//! Stakes are spread over a set of selections so every one returns the
//! same payout. For decimal prices o₁..oₙ the payout per $1 total stake is
//!
//!   R = 1 / Σ(1/oᵢ)
//!
//! and the profit figure shown to users is (R − 1) × 100.

use crate::types::is_valid_price;

/// Profit percentage of Dutching `prices`.
///
/// Returns `0.0` for an empty slice or when any price is not strictly
/// positive; a book containing a non-price has no defined margin.
pub fn dutch_profit(prices: &[f64]) -> f64 {
    if prices.is_empty() || prices.iter().any(|p| !is_valid_price(*p)) {
        return 0.0;
    }
    let implied: f64 = prices.iter().map(|p| 1.0 / p).sum();
    let payout = 1.0 / implied;
    (payout - 1.0) * 100.0
}

/// Dutch profit over the `n` shortest prices of an already ranked,
/// valid-only price list. `None` when fewer than `n` prices exist.
pub fn top_dutch(ranked_prices: &[f64], n: usize) -> Option<f64> {
    if n == 0 || ranked_prices.len() < n {
        return None;
    }
    Some(dutch_profit(&ranked_prices[..n]))
}

/// Signed one-decimal percentage: `+5.3%`, `-12.0%`, `+0.0%`.
pub fn format_signed_pct(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded < 0.0 {
        format!("{rounded:.1}%")
    } else {
        // Folds -0.0 into +0.0.
        format!("+{:.1}%", rounded.abs())
    }
}
