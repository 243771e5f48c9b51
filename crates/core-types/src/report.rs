// In crates/core-types/src/report.rs

use crate::types::{Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of one limit-order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Filled,
    PartiallyFilled,
    Cancelled,
    Timeout,
    RetriesExhausted,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Filled => "FILLED",
            ExecutionStatus::PartiallyFilled => "PARTIALLY_FILLED",
            ExecutionStatus::Cancelled => "CANCELLED",
            ExecutionStatus::Timeout => "TIMEOUT",
            ExecutionStatus::RetriesExhausted => "RETRIES_EXHAUSTED",
        };
        f.write_str(s)
    }
}

/// One submit/poll cycle against the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    /// 1-based.
    pub attempt_index: u32,
    pub submitted_price: Decimal,
    pub submitted_quantity: Decimal,
    /// Quantity filled during this attempt only.
    pub filled_quantity_delta: Decimal,
    /// Average price of the quantity filled during this attempt.
    pub fill_price: Decimal,
    pub elapsed_ms: u64,
}

/// The single report produced for every accepted entry.
///
/// Attempts are appended while the lifecycle runs; `finish` stamps the
/// terminal status once. Filled quantity and the notional-weighted average
/// price always cover every attempt, not only the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub symbol: Symbol,
    pub side: Side,
    pub status: Option<ExecutionStatus>,
    /// Number of attempts consumed.
    pub attempt_index: u32,
    pub requested_quantity: Decimal,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Decimal,
    pub duration_ms: u64,
    pub attempts: Vec<ExecutionAttempt>,
}

impl ExecutionReport {
    pub fn new(symbol: Symbol, side: Side, requested_quantity: Decimal) -> Self {
        Self {
            symbol,
            side,
            status: None,
            attempt_index: 0,
            requested_quantity,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: Decimal::ZERO,
            duration_ms: 0,
            attempts: Vec::new(),
        }
    }

    /// Appends an attempt and folds its fill into the running totals.
    pub fn record(&mut self, attempt: ExecutionAttempt) {
        debug_assert!(self.status.is_none(), "report is already terminal");
        if attempt.filled_quantity_delta > Decimal::ZERO {
            let prior_notional = self.filled_quantity * self.avg_fill_price;
            let added_notional = attempt.filled_quantity_delta * attempt.fill_price;
            self.filled_quantity += attempt.filled_quantity_delta;
            self.avg_fill_price = (prior_notional + added_notional) / self.filled_quantity;
        }
        self.attempt_index = attempt.attempt_index;
        self.attempts.push(attempt);
    }

    pub fn remaining_quantity(&self) -> Decimal {
        (self.requested_quantity - self.filled_quantity).max(Decimal::ZERO)
    }

    pub fn finish(mut self, status: ExecutionStatus, duration_ms: u64) -> Self {
        self.status = Some(status);
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some()
    }
}
