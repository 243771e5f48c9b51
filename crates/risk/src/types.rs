// In crates/risk/src/types.rs

use core_types::SymbolClass;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Account-wide limits applied to every decision, whatever the equity tier.
///
/// Fractions are expressed as fractions of total equity (`0.05` = 5%).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ValidatorSettings {
    /// Hard leverage cap for BTC/ETH pairs.
    pub major_max_leverage: u32,
    /// Hard leverage cap for every other pair.
    pub altcoin_max_leverage: u32,

    /// Smallest position notional the exchange accepts, in USDT.
    pub min_notional_usd: Decimal,
    /// Minimum reward:risk measured from entry to `tp3`.
    pub min_reward_risk: Decimal,

    pub margin_min_fraction: Decimal,
    pub margin_max_fraction: Decimal,
    /// Margin within `max(equity * clamp_band_fraction, clamp_band_floor_usd)` of
    /// the range is pulled onto the nearest bound instead of rejected.
    pub clamp_band_fraction: Decimal,
    pub clamp_band_floor_usd: Decimal,
    /// Margin beyond `max(equity * hard_band_fraction, hard_band_floor_usd)` of
    /// the range is reported as a gross violation.
    pub hard_band_fraction: Decimal,
    pub hard_band_floor_usd: Decimal,

    /// The stop must sit closer to entry than `liquidation_buffer / leverage`.
    pub liquidation_buffer: Decimal,

    pub risk_usd_tolerance_fraction: Decimal,
    pub risk_usd_tolerance_floor_usd: Decimal,

    /// When set, notional is capped at a multiple of equity per symbol class.
    pub enforce_notional_cap: bool,
    pub major_notional_equity_multiple: Decimal,
    pub altcoin_notional_equity_multiple: Decimal,

    /// Where the entry is assumed to sit, as a fraction of the way from the
    /// stop to `tp3`, when no reference price is known.
    pub estimated_entry_fraction: Decimal,

    pub extreme_min_confidence: u32,
    pub extreme_marker: String,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            major_max_leverage: 50,
            altcoin_max_leverage: 20,
            min_notional_usd: dec!(20),
            min_reward_risk: dec!(1.8),
            margin_min_fraction: dec!(0.05),
            margin_max_fraction: dec!(0.13),
            clamp_band_fraction: dec!(0.003),
            clamp_band_floor_usd: dec!(0.2),
            hard_band_fraction: dec!(0.01),
            hard_band_floor_usd: dec!(1),
            liquidation_buffer: dec!(0.85),
            risk_usd_tolerance_fraction: dec!(0.08),
            risk_usd_tolerance_floor_usd: dec!(0.5),
            enforce_notional_cap: false,
            major_notional_equity_multiple: dec!(10),
            altcoin_notional_equity_multiple: dec!(1.5),
            estimated_entry_fraction: dec!(0.2),
            extreme_min_confidence: 85,
            extreme_marker: "EXTREME_INTERVENTION".to_string(),
        }
    }
}

impl ValidatorSettings {
    pub fn max_leverage(&self, class: SymbolClass) -> u32 {
        match class {
            SymbolClass::Major => self.major_max_leverage,
            SymbolClass::Altcoin => self.altcoin_max_leverage,
        }
    }

    pub fn notional_equity_multiple(&self, class: SymbolClass) -> Decimal {
        match class {
            SymbolClass::Major => self.major_notional_equity_multiple,
            SymbolClass::Altcoin => self.altcoin_notional_equity_multiple,
        }
    }

    /// Rejects settings that would make every decision fail or pass trivially.
    pub fn check(&self) -> Result<()> {
        if self.major_max_leverage == 0 || self.altcoin_max_leverage == 0 {
            return Err(Error::InvalidParameters(
                "leverage caps must be at least 1x".to_string(),
            ));
        }
        if self.margin_min_fraction <= Decimal::ZERO
            || self.margin_min_fraction >= self.margin_max_fraction
        {
            return Err(Error::InvalidParameters(format!(
                "margin range [{}, {}] is empty",
                self.margin_min_fraction, self.margin_max_fraction
            )));
        }
        if self.liquidation_buffer <= Decimal::ZERO || self.liquidation_buffer > Decimal::ONE {
            return Err(Error::InvalidParameters(format!(
                "liquidation_buffer must be in (0, 1], got {}",
                self.liquidation_buffer
            )));
        }
        if self.estimated_entry_fraction <= Decimal::ZERO
            || self.estimated_entry_fraction >= Decimal::ONE
        {
            return Err(Error::InvalidParameters(format!(
                "estimated_entry_fraction must be in (0, 1), got {}",
                self.estimated_entry_fraction
            )));
        }
        if self.extreme_marker.trim().is_empty() {
            return Err(Error::InvalidParameters(
                "extreme_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass_check() {
        assert!(ValidatorSettings::default().check().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: ValidatorSettings = toml::from_str(
            r#"
            enforce_notional_cap = true
            min_reward_risk = 2.5
            "#,
        )
        .unwrap();

        assert!(settings.enforce_notional_cap);
        assert_eq!(settings.min_reward_risk, dec!(2.5));
        assert_eq!(settings.min_notional_usd, dec!(20));
    }

    #[test]
    fn test_empty_margin_range_is_invalid() {
        let settings = ValidatorSettings {
            margin_min_fraction: dec!(0.2),
            ..Default::default()
        };
        assert!(matches!(settings.check(), Err(Error::InvalidParameters(_))));
    }
}
