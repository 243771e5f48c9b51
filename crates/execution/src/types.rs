// In crates/execution/src/types.rs

use core_types::{Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-assigned order identifier. The symbol travels with it because
/// the exchange needs both to look an order up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId {
    pub symbol: Symbol,
    pub id: u64,
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.symbol, self.id)
    }
}

/// One limit order as sent to the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitOrder {
    pub symbol: Symbol,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Reject instead of taking liquidity.
    pub post_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    /// Resting, possibly with a partial fill.
    Open,
    Filled,
    /// Cancelled by us or by the exchange; any partial fill stands.
    Cancelled,
}

/// What a status poll reports for a single order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSnapshot {
    /// Cumulative for this order.
    pub filled_quantity: Decimal,
    /// Average price of `filled_quantity`; zero while nothing has filled.
    pub avg_price: Decimal,
    pub state: OrderState,
}

/// Top of book for a market whose execution gate only admits limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGate {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

/// An accepted entry, sized and ready for the order lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    /// Base-asset quantity.
    pub quantity: Decimal,
    /// Resting price for limit entries; `None` executes at market.
    pub limit_price: Option<Decimal>,
    /// Last known market price, used to build marketable limits.
    pub reference_price: Decimal,
    pub leverage: u32,
    /// Set when the market currently only accepts limit orders.
    pub gate: Option<ExecutionGate>,
}

/// Behaviour of the [`SimulatedExchange`](crate::simulated::SimulatedExchange).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Time from submission to fill. `None` means orders never fill.
    pub fill_delay_ms: Option<u64>,
    /// Share of each order that fills once the delay has passed. The rest
    /// stays open. `None` fills the whole order.
    pub partial_fill_ratio: Option<Decimal>,
    /// Fill price for every order. `None` fills at the order's own price.
    pub fill_price: Option<Decimal>,
    /// The exchange cancels resting orders on its own after this long.
    pub cancel_after_ms: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            fill_delay_ms: Some(10),
            partial_fill_ratio: None,
            fill_price: None,
            cancel_after_ms: None,
        }
    }
}

impl SimulationSettings {
    pub fn never_fill() -> Self {
        Self {
            fill_delay_ms: None,
            ..Default::default()
        }
    }
}
