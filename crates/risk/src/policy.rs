// In crates/risk/src/policy.rs

use core_types::{Symbol, SymbolClass};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// --- Tier bounds ---

/// Small accounts: a short allow-list, a leverage floor and a generous risk budget.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AggressiveBounds {
    pub allowed_symbols: Vec<Symbol>,
    pub min_leverage: u32,
    pub max_leverage: u32,
    /// Risk per trade as a fraction of equity.
    pub risk_usd_min_pct: Decimal,
    pub risk_usd_max_pct: Decimal,
    pub max_concurrent_positions: usize,
}

impl Default for AggressiveBounds {
    fn default() -> Self {
        Self {
            allowed_symbols: ["BTCUSDT", "ETHUSDT", "SOLUSDT"]
                .into_iter()
                .map(Symbol::new)
                .collect(),
            min_leverage: 5,
            max_leverage: 20,
            risk_usd_min_pct: dec!(0.03),
            risk_usd_max_pct: dec!(0.10),
            max_concurrent_positions: 2,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StandardBounds {
    pub major_max_leverage: u32,
    pub altcoin_max_leverage: u32,
    pub risk_usd_min_pct: Decimal,
    pub risk_usd_max_pct: Decimal,
    pub max_concurrent_positions: usize,
}

impl Default for StandardBounds {
    fn default() -> Self {
        Self {
            major_max_leverage: 20,
            altcoin_max_leverage: 10,
            risk_usd_min_pct: dec!(0.02),
            risk_usd_max_pct: dec!(0.05),
            max_concurrent_positions: 3,
        }
    }
}

/// Large accounts: low leverage, tight risk budget, more room for diversification.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConservativeBounds {
    pub major_max_leverage: u32,
    pub altcoin_max_leverage: u32,
    pub risk_usd_min_pct: Decimal,
    pub risk_usd_max_pct: Decimal,
    pub max_concurrent_positions: usize,
}

impl Default for ConservativeBounds {
    fn default() -> Self {
        Self {
            major_max_leverage: 10,
            altcoin_max_leverage: 5,
            risk_usd_min_pct: dec!(0.01),
            risk_usd_max_pct: dec!(0.03),
            max_concurrent_positions: 5,
        }
    }
}

// --- Policy ---

/// The risk policy in force for one decision cycle, chosen by account equity.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "tier", content = "bounds", rename_all = "lowercase")]
pub enum RiskPolicy {
    Aggressive(AggressiveBounds),
    Standard(StandardBounds),
    Conservative(ConservativeBounds),
}

impl RiskPolicy {
    pub fn tier(&self) -> &'static str {
        match self {
            RiskPolicy::Aggressive(_) => "aggressive",
            RiskPolicy::Standard(_) => "standard",
            RiskPolicy::Conservative(_) => "conservative",
        }
    }

    pub fn allows_symbol(&self, symbol: &Symbol) -> bool {
        match self {
            RiskPolicy::Aggressive(b) => b.allowed_symbols.contains(symbol),
            RiskPolicy::Standard(_) | RiskPolicy::Conservative(_) => true,
        }
    }

    /// Inclusive `(min, max)` leverage for a symbol class.
    pub fn leverage_bounds(&self, class: SymbolClass) -> (u32, u32) {
        match (self, class) {
            (RiskPolicy::Aggressive(b), _) => (b.min_leverage, b.max_leverage),
            (RiskPolicy::Standard(b), SymbolClass::Major) => (1, b.major_max_leverage),
            (RiskPolicy::Standard(b), SymbolClass::Altcoin) => (1, b.altcoin_max_leverage),
            (RiskPolicy::Conservative(b), SymbolClass::Major) => (1, b.major_max_leverage),
            (RiskPolicy::Conservative(b), SymbolClass::Altcoin) => (1, b.altcoin_max_leverage),
        }
    }

    /// Inclusive `(min, max)` risk per trade as fractions of equity.
    pub fn risk_budget(&self) -> (Decimal, Decimal) {
        match self {
            RiskPolicy::Aggressive(b) => (b.risk_usd_min_pct, b.risk_usd_max_pct),
            RiskPolicy::Standard(b) => (b.risk_usd_min_pct, b.risk_usd_max_pct),
            RiskPolicy::Conservative(b) => (b.risk_usd_min_pct, b.risk_usd_max_pct),
        }
    }

    pub fn max_concurrent_positions(&self) -> usize {
        match self {
            RiskPolicy::Aggressive(b) => b.max_concurrent_positions,
            RiskPolicy::Standard(b) => b.max_concurrent_positions,
            RiskPolicy::Conservative(b) => b.max_concurrent_positions,
        }
    }
}

// --- Resolution ---

/// The `[risk]` configuration block: one bounds record per tier plus the
/// equity thresholds separating them.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RiskTiers {
    /// Equity up to and including this value trades under the aggressive tier.
    pub aggressive_max_equity: Decimal,
    /// Equity up to and including this value trades under the standard tier.
    pub standard_max_equity: Decimal,
    pub aggressive: AggressiveBounds,
    pub standard: StandardBounds,
    pub conservative: ConservativeBounds,
}

impl Default for RiskTiers {
    fn default() -> Self {
        Self {
            aggressive_max_equity: dec!(200),
            standard_max_equity: dec!(1000),
            aggressive: AggressiveBounds::default(),
            standard: StandardBounds::default(),
            conservative: ConservativeBounds::default(),
        }
    }
}

/// Maps account equity onto a [`RiskPolicy`].
#[derive(Debug, Clone, Default)]
pub struct PolicyResolver {
    tiers: RiskTiers,
}

impl PolicyResolver {
    pub fn new(tiers: RiskTiers) -> Self {
        Self { tiers }
    }

    pub fn resolve(&self, equity: Decimal) -> RiskPolicy {
        let policy = if equity <= self.tiers.aggressive_max_equity {
            RiskPolicy::Aggressive(self.tiers.aggressive.clone())
        } else if equity <= self.tiers.standard_max_equity {
            RiskPolicy::Standard(self.tiers.standard.clone())
        } else {
            RiskPolicy::Conservative(self.tiers.conservative.clone())
        };
        tracing::debug!(%equity, tier = policy.tier(), "Resolved risk policy.");
        policy
    }
}
