// In crates/core-types/src/types.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trading pair symbol, e.g. "BTCUSDT".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Symbol(raw.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// BTC and ETH pairs are "majors"; every other pair trades under the tighter altcoin caps.
    pub fn class(&self) -> SymbolClass {
        if self.0.starts_with("BTC") || self.0.starts_with("ETH") {
            SymbolClass::Major
        } else {
            SymbolClass::Altcoin
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// `1` for longs and `-1` for shorts; turns "price moved up" into "price moved in our favour".
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("long"),
            Side::Short => f.write_str("short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolClass {
    Major,
    Altcoin,
}

/// A position that is already open on the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: Symbol,
    pub side: Side,
}

/// Snapshot of the trading account taken at the start of a decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    /// Wallet balance plus unrealized PnL, in USDT.
    pub total_equity: Decimal,
    /// Balance still available for new margin.
    pub available_balance: Decimal,
    /// Margin in use as a percentage of equity (0-100).
    pub margin_used_pct: Decimal,
    pub position_count: usize,
    /// Open positions, used to recognise add-on trades.
    #[serde(default)]
    pub positions: Vec<OpenPosition>,
}

impl AccountState {
    pub fn new(total_equity: Decimal) -> Self {
        Self {
            total_equity,
            available_balance: total_equity,
            margin_used_pct: Decimal::ZERO,
            position_count: 0,
            positions: Vec::new(),
        }
    }

    /// Adds an open position and keeps `position_count` in step.
    pub fn with_position(mut self, symbol: Symbol, side: Side) -> Self {
        self.positions.push(OpenPosition { symbol, side });
        self.position_count = self.positions.len();
        self
    }

    /// True when a position in the same symbol and direction is already open.
    pub fn holds(&self, symbol: &Symbol, side: Side) -> bool {
        self.positions
            .iter()
            .any(|p| &p.symbol == symbol && p.side == side)
    }
}
