// src/utils/precision.rs
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a quantity DOWN to the nearest multiple of `step_size`. A zero step keeps full precision.
/// Example: amount=10.999, step=1.0 -> 10.0
pub fn floor_to_step(amount: Decimal, step_size: Decimal) -> Decimal {
    if step_size.is_zero() {
        return amount;
    }
    (amount / step_size).floor() * step_size
}

/// Rounds a cash amount to `scale` decimal places, banker's rounding.
/// Clears the 28-digit division residue left by a buy/sell round trip.
pub fn round_cash(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven)
}
