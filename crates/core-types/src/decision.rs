// In crates/core-types/src/decision.rs

use crate::lenient;
use crate::types::{AccountState, Side, Symbol};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Every action a model may propose.
///
/// Anything the model writes that is not one of the known actions is kept as
/// `Unknown` so that the validator can reject it with the offending text,
/// instead of failing the whole payload at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    OpenLong,
    OpenShort,
    LimitOpenLong,
    LimitOpenShort,
    CancelLimitOrder,
    UpdateStopLoss,
    UpdateTakeProfit,
    CloseLong,
    CloseShort,
    PartialCloseLong,
    PartialCloseShort,
    Hold,
    Wait,
    Unknown(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::OpenLong => "open_long",
            Action::OpenShort => "open_short",
            Action::LimitOpenLong => "limit_open_long",
            Action::LimitOpenShort => "limit_open_short",
            Action::CancelLimitOrder => "cancel_limit_order",
            Action::UpdateStopLoss => "update_stop_loss",
            Action::UpdateTakeProfit => "update_take_profit",
            Action::CloseLong => "close_long",
            Action::CloseShort => "close_short",
            Action::PartialCloseLong => "partial_close_long",
            Action::PartialCloseShort => "partial_close_short",
            Action::Hold => "hold",
            Action::Wait => "wait",
            Action::Unknown(raw) => raw.as_str(),
        }
    }

    /// Market or resting-limit entries.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Action::OpenLong | Action::OpenShort | Action::LimitOpenLong | Action::LimitOpenShort
        )
    }

    pub fn is_limit_open(&self) -> bool {
        matches!(self, Action::LimitOpenLong | Action::LimitOpenShort)
    }

    /// The position direction an entry would create.
    pub fn open_side(&self) -> Option<Side> {
        match self {
            Action::OpenLong | Action::LimitOpenLong => Some(Side::Long),
            Action::OpenShort | Action::LimitOpenShort => Some(Side::Short),
            _ => None,
        }
    }

    /// Actions an extreme intervention is allowed to carry.
    pub fn is_protective(&self) -> bool {
        matches!(
            self,
            Action::CloseLong
                | Action::CloseShort
                | Action::PartialCloseLong
                | Action::PartialCloseShort
                | Action::UpdateStopLoss
        )
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::Unknown(String::new())
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let action = match raw.trim().to_lowercase().as_str() {
            "open_long" => Action::OpenLong,
            "open_short" => Action::OpenShort,
            "limit_open_long" => Action::LimitOpenLong,
            "limit_open_short" => Action::LimitOpenShort,
            "cancel_limit_order" => Action::CancelLimitOrder,
            "update_stop_loss" => Action::UpdateStopLoss,
            "update_take_profit" => Action::UpdateTakeProfit,
            "close_long" => Action::CloseLong,
            "close_short" => Action::CloseShort,
            "partial_close_long" => Action::PartialCloseLong,
            "partial_close_short" => Action::PartialCloseShort,
            "hold" => Action::Hold,
            "wait" => Action::Wait,
            _ => Action::Unknown(raw.to_string()),
        };
        Ok(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = lenient::text(d)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// How the model would like an entry to be executed.
///
/// `Other` holds whatever the payload contained before normalization; the
/// normalizer folds it into one of the three known values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionPreference {
    #[default]
    Auto,
    Market,
    Limit,
    Other(String),
}

impl ExecutionPreference {
    pub fn as_str(&self) -> &str {
        match self {
            ExecutionPreference::Auto => "auto",
            ExecutionPreference::Market => "market",
            ExecutionPreference::Limit => "limit",
            ExecutionPreference::Other(raw) => raw.as_str(),
        }
    }
}

impl Serialize for ExecutionPreference {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ExecutionPreference {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = lenient::text(d)?;
        Ok(match raw.as_str() {
            "" | "auto" => ExecutionPreference::Auto,
            "market" => ExecutionPreference::Market,
            "limit" => ExecutionPreference::Limit,
            _ => ExecutionPreference::Other(raw),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionLevel {
    #[default]
    None,
    Extreme,
}

impl<'de> Deserialize<'de> for InterventionLevel {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = lenient::text(d)?;
        if raw.trim().eq_ignore_ascii_case("extreme") {
            Ok(InterventionLevel::Extreme)
        } else {
            Ok(InterventionLevel::None)
        }
    }
}

/// The quality grade a model attaches to an entry idea in its reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// The scores a model may claim for this grade.
    pub fn score_range(&self) -> RangeInclusive<u32> {
        match self {
            Grade::S => 85..=100,
            Grade::A => 75..=84,
            Grade::B => 65..=74,
            Grade::C | Grade::D | Grade::F => 0..=64,
        }
    }

    pub fn allows_open(&self) -> bool {
        matches!(self, Grade::S | Grade::A | Grade::B)
    }

    /// B-grade ideas must rest as limit orders.
    pub fn allows_market(&self) -> bool {
        matches!(self, Grade::S | Grade::A)
    }

    /// Share of the tier's maximum risk budget this grade may use.
    pub fn risk_multiplier(&self) -> Decimal {
        match self {
            Grade::S => Decimal::ONE,
            Grade::A => Decimal::new(8, 1),
            Grade::B => Decimal::new(6, 1),
            Grade::C | Grade::D | Grade::F => Decimal::ZERO,
        }
    }
}

impl FromStr for Grade {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_uppercase().as_str() {
            "S" => Ok(Grade::S),
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            other => Err(Error::UnknownGrade(other.to_string())),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single action proposed by the model.
///
/// Built once by extraction, then rewritten by normalization and (for
/// boundary clamps) by validation. Every numeric field is optional because
/// the model may omit anything; the validator decides what is required for
/// each action.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Decision {
    #[serde(deserialize_with = "de_symbol")]
    pub symbol: Symbol,
    pub action: Action,
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,
    /// Margin committed to the trade, not the notional.
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub position_margin_usd: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub tp1: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub tp2: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub tp3: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_u64", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<u64>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub close_quantity: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub close_ratio: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub risk_usd: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u32>,
    #[serde(deserialize_with = "lenient::text")]
    pub reasoning: String,
    pub intervention_level: InterventionLevel,
    pub execution_preference: ExecutionPreference,

    /// Reference price injected by the pipeline. Never read from the payload.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Decimal>,

    // --- Alias fields ---
    // Accepted for compatibility with older prompt versions.
    /// Alternate name for `stop_loss`.
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub stop_loss_price: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub position_size_usd: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(deserialize_with = "lenient::opt_decimal", skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<Decimal>,
}

fn de_symbol<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Symbol, D::Error> {
    Ok(Symbol::new(lenient::text(d)?))
}

impl Decision {
    pub fn new(symbol: &str, action: Action) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            action,
            ..Default::default()
        }
    }

    /// Margin multiplied by leverage, when both are present.
    pub fn notional(&self) -> Option<Decimal> {
        match (self.position_margin_usd, self.leverage) {
            (Some(margin), Some(leverage)) => Some(margin * Decimal::from(leverage)),
            _ => None,
        }
    }

    /// An entry that rests at `limit_price` instead of crossing the book:
    /// a limit action, or a plain open that asked for a limit entry.
    pub fn rests_at_limit(&self) -> bool {
        self.action.is_limit_open()
            || (self.action.is_open() && self.execution_preference == ExecutionPreference::Limit)
    }

    /// An entry that adds to a position already open in the same direction.
    pub fn is_add_on(&self, account: &AccountState) -> bool {
        self.action
            .open_side()
            .is_some_and(|side| account.holds(&self.symbol, side))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_full_open_decision() {
        let json = r#"{
            "symbol": "btcusdt",
            "action": "Open_Long",
            "leverage": 10,
            "position_margin_usd": "100.5",
            "stop_loss": 95000,
            "tp1": 101000, "tp2": 102000, "tp3": 103000,
            "confidence": 88,
            "reasoning": "grade: A score: 80",
            "intervention_level": "EXTREME",
            "execution_preference": "Market",
            "current_price": 1
        }"#;
        let decision: Decision = serde_json::from_str(json).unwrap();

        assert_eq!(decision.symbol, Symbol("BTCUSDT".into()));
        assert_eq!(decision.action, Action::OpenLong);
        assert_eq!(decision.leverage, Some(10));
        assert_eq!(decision.position_margin_usd, Some(dec!(100.5)));
        assert_eq!(decision.tp3, Some(dec!(103000)));
        assert_eq!(decision.intervention_level, InterventionLevel::Extreme);
        assert_eq!(
            decision.execution_preference,
            ExecutionPreference::Other("Market".into())
        );
        // The model cannot inject its own reference price.
        assert_eq!(decision.current_price, None);
        assert_eq!(decision.notional(), Some(dec!(1005.0)));
    }

    #[test]
    fn test_unknown_action_is_preserved() {
        let decision: Decision =
            serde_json::from_str(r#"{"symbol": "ETHUSDT", "action": "yolo"}"#).unwrap();
        assert_eq!(decision.action, Action::Unknown("yolo".into()));
        assert!(!decision.action.is_open());
    }

    #[test]
    fn test_grade_ranges_and_gates() {
        assert!(Grade::S.score_range().contains(&85));
        assert!(!Grade::A.score_range().contains(&85));
        assert!(Grade::B.allows_open());
        assert!(!Grade::B.allows_market());
        assert!(!Grade::C.allows_open());
        assert_eq!(Grade::A.risk_multiplier(), dec!(0.8));
        assert!("x".parse::<Grade>().is_err());
    }

    #[test]
    fn test_add_on_detection() {
        let account = AccountState::new(dec!(500)).with_position(Symbol::new("SOLUSDT"), Side::Long);
        assert!(Decision::new("SOLUSDT", Action::LimitOpenLong).is_add_on(&account));
        assert!(!Decision::new("SOLUSDT", Action::OpenShort).is_add_on(&account));
        assert!(!Decision::new("SOLUSDT", Action::CloseLong).is_add_on(&account));
    }

    #[test]
    fn test_limit_preference_rests_plain_opens() {
        assert!(Decision::new("BTCUSDT", Action::LimitOpenShort).rests_at_limit());
        assert!(!Decision::new("BTCUSDT", Action::OpenLong).rests_at_limit());

        let preferred = Decision {
            execution_preference: ExecutionPreference::Limit,
            ..Decision::new("BTCUSDT", Action::OpenLong)
        };
        assert!(preferred.rests_at_limit());

        let close = Decision {
            action: Action::CloseLong,
            ..preferred
        };
        assert!(!close.rests_at_limit());
    }
}
