// In crates/decision/src/normalize.rs

use core_types::{Decision, ExecutionPreference, Symbol};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for margin and other USD amounts.
pub const MONEY_DP: u32 = 2;
/// Decimal places kept for prices and ratios.
pub const PRICE_DP: u32 = 4;
/// Decimal places kept for `close_quantity`.
pub const QUANTITY_DP: u32 = 4;

/// Normalizes a decision before any comparison is made against it.
///
/// Pure and total: every input produces a decision, and normalizing twice
/// gives the same result as normalizing once.
///
/// 1. Aliases: `stop_loss_price` fills a missing `stop_loss`, `tp3` fills a
///    missing `take_profit`. The remaining alias fields are only logged.
/// 2. `close_ratio` above 1 is read as a percentage, then clamped to `[0, 1]`.
/// 3. USD amounts are rounded to 2 decimals, prices and quantities to 4,
///    which removes float noise such as `95000.00000001` before boundary checks.
/// 4. `execution_preference` is lower-cased and limited to auto/market/limit.
pub fn normalize(mut decision: Decision) -> Decision {
    resolve_aliases(&mut decision);

    decision.symbol = Symbol::new(decision.symbol.as_str());
    decision.close_ratio = decision.close_ratio.map(normalize_ratio);
    decision.close_quantity = decision.close_quantity.map(|q| round(q, QUANTITY_DP));

    for money in [
        &mut decision.position_margin_usd,
        &mut decision.risk_usd,
        &mut decision.position_size_usd,
    ] {
        *money = money.map(|v| round(v, MONEY_DP));
    }

    for price in [
        &mut decision.stop_loss,
        &mut decision.take_profit,
        &mut decision.tp1,
        &mut decision.tp2,
        &mut decision.tp3,
        &mut decision.limit_price,
        &mut decision.current_price,
        &mut decision.stop_loss_price,
        &mut decision.entry_price,
    ] {
        *price = price.map(|v| round(v, PRICE_DP));
    }

    decision.execution_preference = normalize_preference(decision.execution_preference);
    decision
}

fn resolve_aliases(decision: &mut Decision) {
    if decision.stop_loss.is_none() {
        if let Some(stop) = decision.stop_loss_price {
            tracing::debug!(symbol = %decision.symbol, %stop, "Using `stop_loss_price` alias for stop_loss.");
            decision.stop_loss = Some(stop);
        }
    }
    if decision.take_profit.is_none() {
        decision.take_profit = decision.tp3;
    }

    if decision.position_size_usd.is_some()
        || decision.quantity.is_some()
        || decision.entry_price.is_some()
    {
        tracing::debug!(
            symbol = %decision.symbol,
            position_size_usd = ?decision.position_size_usd,
            quantity = ?decision.quantity,
            entry_price = ?decision.entry_price,
            "Decision carries informational alias fields; they are ignored."
        );
    }
}

fn normalize_ratio(ratio: Decimal) -> Decimal {
    let ratio = if ratio > Decimal::ONE {
        ratio / Decimal::ONE_HUNDRED
    } else {
        ratio
    };
    round(ratio.clamp(Decimal::ZERO, Decimal::ONE), PRICE_DP)
}

fn normalize_preference(preference: ExecutionPreference) -> ExecutionPreference {
    match preference {
        ExecutionPreference::Other(raw) => match raw.trim().to_lowercase().as_str() {
            "market" => ExecutionPreference::Market,
            "limit" => ExecutionPreference::Limit,
            _ => ExecutionPreference::Auto,
        },
        known => known,
    }
}

fn round(value: Decimal, dp: u32) -> Decimal {
    value
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}
