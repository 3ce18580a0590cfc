//! Per-model token prices (USD per token).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Look up (input, output) price per token for a model.
///
/// Unknown models price at zero so the stats endpoint under-reports rather
/// than guesses.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    // Longest prefixes first: "gpt-4o-mini" must not match "gpt-4o".
    let per_million = if model.starts_with("gpt-4o-mini") {
        (dec!(0.15), dec!(0.60))
    } else if model.starts_with("gpt-4o") {
        (dec!(2.50), dec!(10.00))
    } else if model.starts_with("gpt-4.1-mini") {
        (dec!(0.40), dec!(1.60))
    } else if model.starts_with("gpt-4.1") {
        (dec!(2.00), dec!(8.00))
    } else if model.starts_with("gpt-4-turbo") {
        (dec!(10.00), dec!(30.00))
    } else if model.starts_with("gpt-4") {
        (dec!(30.00), dec!(60.00))
    } else if model.starts_with("gpt-3.5-turbo") {
        (dec!(0.50), dec!(1.50))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    let million = dec!(1_000_000);
    (per_million.0 / million, per_million.1 / million)
}

/// Cost of a call given token counts and per-token prices.
pub fn call_cost(prices: (Decimal, Decimal), input_tokens: u64, output_tokens: u64) -> Decimal {
    prices.0 * Decimal::from(input_tokens) + prices.1 * Decimal::from(output_tokens)
}
