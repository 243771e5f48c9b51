// In crates/risk/src/error.rs

use core_types::{Action, Grade, Side, Symbol, SymbolClass};
use rust_decimal::Decimal;
use thiserror::Error;

/// A single broken rule, with the numbers that broke it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("symbol is empty")]
    MissingSymbol,

    #[error("reasoning is empty")]
    MissingReasoning,

    #[error("account equity {equity} is not positive")]
    NoEquity { equity: Decimal },

    #[error("reasoning carries no grade (expected e.g. `grade: A`)")]
    GradeMissing,

    #[error("reasoning carries no score (expected e.g. `score: 80`)")]
    ScoreMissing,

    #[error("score {score} is outside the {min}-{max} range of grade {grade}")]
    GradeScoreMismatch { grade: Grade, score: u32, min: u32, max: u32 },

    #[error("grade {grade} does not allow opening positions")]
    GradeForbidsOpen { grade: Grade },

    #[error("grade {grade} does not allow market execution; use a limit entry")]
    GradeForbidsMarket { grade: Grade },

    #[error("leverage is missing")]
    MissingLeverage,

    #[error("leverage {leverage}x is outside {min}x-{max}x for {class:?} symbols")]
    LeverageOutOfBounds { leverage: u32, min: u32, max: u32, class: SymbolClass },

    #[error("`{0}` is missing")]
    MissingField(&'static str),

    #[error("`{field}` must be positive, got {value}")]
    NonPositive { field: &'static str, value: Decimal },

    #[error("stop loss {stop_loss} is on the wrong side of entry {entry} for a {side} position")]
    StopWrongSide { side: Side, entry: Decimal, stop_loss: Decimal },

    #[error("reward:risk {ratio} is below {minimum} (entry {entry}, stop {stop_loss}, tp3 {tp3})")]
    RewardRiskTooLow {
        ratio: Decimal,
        minimum: Decimal,
        entry: Decimal,
        stop_loss: Decimal,
        tp3: Decimal,
    },

    #[error("notional {notional} USDT is below the exchange minimum of {minimum} USDT")]
    NotionalBelowMinimum { notional: Decimal, minimum: Decimal },

    #[error("notional {notional} USDT exceeds the {class:?} cap of {cap} USDT")]
    NotionalAboveCap { notional: Decimal, cap: Decimal, class: SymbolClass },

    #[error(
        "margin {margin} USDT is {fraction} of equity {equity}, outside [{lower}, {upper}] USDT{}",
        margin_hint(.gross)
    )]
    MarginOutOfRange {
        margin: Decimal,
        equity: Decimal,
        fraction: Decimal,
        lower: Decimal,
        upper: Decimal,
        gross: bool,
    },

    #[error("take_profit {take_profit} must equal tp3 {tp3}")]
    TakeProfitMismatch { take_profit: Decimal, tp3: Decimal },

    #[error("{side} price ladder is out of order: {ladder}")]
    LadderDisordered { side: Side, ladder: String },

    #[error(
        "stop distance {distance} of entry reaches the liquidation limit {limit} at {leverage}x"
    )]
    StopBeyondLiquidation { distance: Decimal, limit: Decimal, leverage: u32 },

    #[error("risk_usd {declared} disagrees with the computed {expected} (tolerance {tolerance})")]
    RiskUsdMismatch { declared: Decimal, expected: Decimal, tolerance: Decimal },

    #[error("{symbol} is not tradable in the {tier} tier")]
    SymbolNotAllowed { symbol: Symbol, tier: &'static str },

    #[error(
        "risk {risk_usd} USDT is {fraction} of equity, outside [{min_fraction}, {max_fraction}] for grade {grade} in the {tier} tier"
    )]
    RiskBudgetOutOfRange {
        risk_usd: Decimal,
        fraction: Decimal,
        min_fraction: Decimal,
        max_fraction: Decimal,
        grade: Grade,
        tier: &'static str,
    },

    #[error("order_id must be a non-zero exchange order id")]
    MissingOrderId,

    #[error("partial close needs a positive close_quantity or close_ratio")]
    PartialCloseSizeMissing,

    #[error("partial close reasoning must state the {0}")]
    PartialCloseRationale(&'static str),

    #[error("only one extreme intervention is allowed per batch (first was decision #{first})")]
    MultipleExtremeInterventions { first: usize },

    #[error("extreme intervention is not allowed for `{action}`")]
    ExtremeActionNotAllowed { action: Action },

    #[error("extreme intervention needs confidence >= {minimum}, got {confidence:?}")]
    ExtremeConfidenceTooLow { confidence: Option<u32>, minimum: u32 },

    #[error("extreme intervention reasoning lacks the `{marker}` marker")]
    ExtremeMarkerMissing { marker: String },

    #[error("{open} open plus {new} new positions exceed the {tier} tier limit of {max}")]
    TooManyPositions { open: usize, new: usize, max: usize, tier: &'static str },

    #[error("another entry for {symbol} already appears as decision #{first}")]
    DuplicateEntry { symbol: Symbol, first: usize },
}

fn margin_hint(gross: &bool) -> &'static str {
    if *gross {
        " by more than the hard band"
    } else {
        "; resize the margin into range"
    }
}

/// The first violation found in a batch, located by its 1-based ordinal.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("decision #{ordinal} ({symbol} {action}): {violation}")]
pub struct Rejection {
    pub ordinal: usize,
    pub symbol: Symbol,
    pub action: Action,
    #[source]
    pub violation: Violation,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Decision batch was rejected: {0}")]
    Rejected(#[from] Box<Rejection>),

    #[error("Invalid risk parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, Error>;
