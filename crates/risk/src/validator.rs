// In crates/risk/src/validator.rs

use crate::error::{Rejection, Violation};
use crate::policy::RiskPolicy;
use crate::reasoning;
use crate::types::ValidatorSettings;
use crate::DecisionValidator;
use core_types::{
    AccountState, Action, Decision, Grade, InterventionLevel, Side, Symbol, SymbolClass,
};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

type Checked<T> = std::result::Result<T, Violation>;

/// The entry price the price checks are measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Entry {
    /// A limit price, or the market price injected by the pipeline.
    Observed(Decimal),
    /// Interpolated between the stop and `tp3` when no price is known.
    /// Only the take-profit ladder is checked against it.
    Estimated(Decimal),
}

impl Entry {
    fn price(&self) -> Decimal {
        match self {
            Entry::Observed(p) | Entry::Estimated(p) => *p,
        }
    }
}

/// Validates decisions against account-wide limits and the equity tier's policy.
///
/// Open actions run the full chain: grade, execution mode, leverage, reward:risk,
/// margin and notional, the take-profit ladder, liquidation distance, declared
/// risk and finally the tier's own bounds. Every other action only needs the
/// fields it acts on plus a reasoning.
#[derive(Debug, Clone, Default)]
pub struct TieredValidator {
    settings: ValidatorSettings,
}

impl TieredValidator {
    pub fn new(settings: ValidatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    /// Validates a whole batch. All-or-nothing: the first failing decision
    /// rejects the batch, and the rejection names its 1-based position.
    ///
    /// Each decision is checked against its own injected `current_price`.
    pub fn validate_batch(
        &self,
        decisions: Vec<Decision>,
        account: &AccountState,
        policy: &RiskPolicy,
    ) -> std::result::Result<Vec<Decision>, Rejection> {
        let mut accepted = Vec::with_capacity(decisions.len());

        for (idx, decision) in decisions.into_iter().enumerate() {
            let symbol = decision.symbol.clone();
            let action = decision.action.clone();
            let reference_price = decision.current_price;

            match self.validate(decision, account, policy, reference_price) {
                Ok(decision) => accepted.push(decision),
                Err(violation) => return Err(reject(idx + 1, symbol, action, violation)),
            }
        }

        self.check_batch(&accepted, account, policy)?;
        Ok(accepted)
    }

    // --- Batch-wide rules ---

    fn check_batch(
        &self,
        decisions: &[Decision],
        account: &AccountState,
        policy: &RiskPolicy,
    ) -> std::result::Result<(), Rejection> {
        let max_positions = policy.max_concurrent_positions();
        let mut first_extreme: Option<usize> = None;
        let mut entries: HashMap<&Symbol, usize> = HashMap::new();
        let mut new_positions = 0;

        for (idx, decision) in decisions.iter().enumerate() {
            let ordinal = idx + 1;
            let fail = |violation: Violation| {
                reject(ordinal, decision.symbol.clone(), decision.action.clone(), violation)
            };

            if decision.intervention_level == InterventionLevel::Extreme {
                if let Some(first) = first_extreme {
                    return Err(fail(Violation::MultipleExtremeInterventions { first }));
                }
                first_extreme = Some(ordinal);
                self.check_extreme(decision).map_err(fail)?;
            }

            if decision.action.is_open() {
                if let Some(&first) = entries.get(&decision.symbol) {
                    return Err(fail(Violation::DuplicateEntry {
                        symbol: decision.symbol.clone(),
                        first,
                    }));
                }
                entries.insert(&decision.symbol, ordinal);

                if !decision.is_add_on(account) {
                    new_positions += 1;
                    if account.position_count + new_positions > max_positions {
                        return Err(fail(Violation::TooManyPositions {
                            open: account.position_count,
                            new: new_positions,
                            max: max_positions,
                            tier: policy.tier(),
                        }));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_extreme(&self, decision: &Decision) -> Checked<()> {
        if !decision.action.is_protective() {
            return Err(Violation::ExtremeActionNotAllowed {
                action: decision.action.clone(),
            });
        }
        let minimum = self.settings.extreme_min_confidence;
        if decision.confidence.is_none_or(|c| c < minimum) {
            return Err(Violation::ExtremeConfidenceTooLow {
                confidence: decision.confidence,
                minimum,
            });
        }
        if !decision.reasoning.contains(&self.settings.extreme_marker) {
            return Err(Violation::ExtremeMarkerMissing {
                marker: self.settings.extreme_marker.clone(),
            });
        }
        Ok(())
    }

    // --- Open actions ---

    fn validate_open(
        &self,
        mut decision: Decision,
        side: Side,
        account: &AccountState,
        policy: &RiskPolicy,
        reference_price: Option<Decimal>,
    ) -> Checked<Decision> {
        let equity = account.total_equity;
        if equity <= Decimal::ZERO {
            return Err(Violation::NoEquity { equity });
        }

        // Grade and execution mode.
        let (grade, score) = reasoning::parse_grade(&decision.reasoning)?;
        if !grade.allows_open() {
            return Err(Violation::GradeForbidsOpen { grade });
        }
        if !grade.allows_market() && !decision.rests_at_limit() {
            return Err(Violation::GradeForbidsMarket { grade });
        }
        if decision.rests_at_limit() && !decision.action.is_limit_open() {
            // A plain open that asked for a limit entry rests at its limit price.
            require_positive("limit_price", decision.limit_price)?;
        }

        // Account-wide leverage cap.
        let class = decision.symbol.class();
        let leverage = decision.leverage.ok_or(Violation::MissingLeverage)?;
        let max_leverage = self.settings.max_leverage(class);
        if leverage < 1 || leverage > max_leverage {
            return Err(Violation::LeverageOutOfBounds {
                leverage,
                min: 1,
                max: max_leverage,
                class,
            });
        }

        // Reference price and reward:risk.
        let stop_loss = require_positive("stop_loss", decision.stop_loss)?;
        let tp3 = require_positive("tp3", decision.tp3)?;
        let entry = self.resolve_entry(&decision, reference_price, stop_loss, tp3);
        self.check_reward_risk(side, entry.price(), stop_loss, tp3)?;

        // Margin and notional.
        let margin = require_positive("position_margin_usd", decision.position_margin_usd)?;
        let margin = round_money(margin);
        self.check_notional(margin, leverage, class, equity)?;

        let margin = if decision.is_add_on(account) {
            tracing::debug!(symbol = %decision.symbol, %side, "Add-on trade, skipping margin range check.");
            margin
        } else {
            let checked = self.check_margin_fraction(margin, equity)?;
            if checked != margin {
                tracing::warn!(
                    symbol = %decision.symbol,
                    requested = %margin,
                    clamped = %checked,
                    %equity,
                    "Margin within clamp tolerance, snapped to the nearest bound."
                );
                self.check_notional(checked, leverage, class, equity)?;
            }
            checked
        };
        decision.position_margin_usd = Some(margin);
        let notional = margin * Decimal::from(leverage);

        // Stop and take-profit fields.
        let take_profit = require_positive("take_profit", decision.take_profit)?;
        let tp1 = require_positive("tp1", decision.tp1)?;
        let tp2 = require_positive("tp2", decision.tp2)?;
        if take_profit != tp3 {
            return Err(Violation::TakeProfitMismatch { take_profit, tp3 });
        }
        let ladder_entry = match entry {
            Entry::Observed(price) => Some(price),
            Entry::Estimated(_) => None,
        };
        check_ladder(side, stop_loss, ladder_entry, [tp1, tp2, tp3])?;

        // Liquidation distance and declared risk.
        let entry_price = entry.price();
        let distance = (entry_price - stop_loss).abs() / entry_price;
        let expected_risk = round_money(notional * distance);
        if let Entry::Observed(_) = entry {
            let limit = self.settings.liquidation_buffer / Decimal::from(leverage);
            if distance >= limit {
                return Err(Violation::StopBeyondLiquidation {
                    distance: round_ratio(distance),
                    limit: round_ratio(limit),
                    leverage,
                });
            }
            if let Some(declared) = decision.risk_usd {
                let tolerance = (expected_risk * self.settings.risk_usd_tolerance_fraction)
                    .max(self.settings.risk_usd_tolerance_floor_usd);
                if (declared - expected_risk).abs() > tolerance {
                    return Err(Violation::RiskUsdMismatch {
                        declared,
                        expected: expected_risk,
                        tolerance: round_money(tolerance),
                    });
                }
            }
        }
        let risk_usd = *decision.risk_usd.get_or_insert(expected_risk);

        // Tier bounds.
        self.check_tier(&decision, leverage, risk_usd, equity, grade, policy)?;

        if decision.action.is_limit_open() {
            require_positive("limit_price", decision.limit_price)?;
        }

        tracing::debug!(
            symbol = %decision.symbol,
            action = %decision.action,
            %grade,
            score,
            %margin,
            leverage,
            %risk_usd,
            "Open decision accepted."
        );
        Ok(decision)
    }

    fn resolve_entry(
        &self,
        decision: &Decision,
        reference_price: Option<Decimal>,
        stop_loss: Decimal,
        tp3: Decimal,
    ) -> Entry {
        let limit = if decision.rests_at_limit() {
            decision.limit_price
        } else {
            None
        };
        match limit.or(reference_price).filter(|p| *p > Decimal::ZERO) {
            Some(price) => Entry::Observed(price),
            None => {
                let estimate = stop_loss + (tp3 - stop_loss) * self.settings.estimated_entry_fraction;
                tracing::debug!(
                    symbol = %decision.symbol,
                    %estimate,
                    "No reference price, estimating entry from the stop and tp3."
                );
                Entry::Estimated(estimate)
            }
        }
    }

    fn check_reward_risk(
        &self,
        side: Side,
        entry: Decimal,
        stop_loss: Decimal,
        tp3: Decimal,
    ) -> Checked<()> {
        let risk = (entry - stop_loss) * side.sign();
        if risk <= Decimal::ZERO {
            return Err(Violation::StopWrongSide { side, entry, stop_loss });
        }
        let reward = (tp3 - entry) * side.sign();
        let ratio = (reward / risk).max(Decimal::ZERO);
        if ratio < self.settings.min_reward_risk {
            return Err(Violation::RewardRiskTooLow {
                ratio: round_money(ratio),
                minimum: self.settings.min_reward_risk,
                entry,
                stop_loss,
                tp3,
            });
        }
        Ok(())
    }

    fn check_notional(
        &self,
        margin: Decimal,
        leverage: u32,
        class: SymbolClass,
        equity: Decimal,
    ) -> Checked<()> {
        let notional = margin * Decimal::from(leverage);
        if notional < self.settings.min_notional_usd {
            return Err(Violation::NotionalBelowMinimum {
                notional,
                minimum: self.settings.min_notional_usd,
            });
        }
        if self.settings.enforce_notional_cap {
            let cap = equity * self.settings.notional_equity_multiple(class);
            if notional > cap {
                return Err(Violation::NotionalAboveCap {
                    notional,
                    cap: round_money(cap),
                    class,
                });
            }
        }
        Ok(())
    }

    /// Returns the margin to use: unchanged when in range, snapped onto the
    /// nearest bound when within the clamp band, rejected otherwise.
    fn check_margin_fraction(&self, margin: Decimal, equity: Decimal) -> Checked<Decimal> {
        let s = &self.settings;
        let lower = equity * s.margin_min_fraction;
        let upper = equity * s.margin_max_fraction;
        if margin >= lower && margin <= upper {
            return Ok(margin);
        }

        let clamp_tolerance = (equity * s.clamp_band_fraction).max(s.clamp_band_floor_usd);
        let hard_tolerance = (equity * s.hard_band_fraction).max(s.hard_band_floor_usd);
        let (gap, snapped) = if margin < lower {
            // Round away from the range edge so the snapped value stays inside it.
            (lower - margin, lower.round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity))
        } else {
            (margin - upper, upper.round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity))
        };

        if gap <= clamp_tolerance {
            return Ok(snapped.normalize());
        }
        Err(Violation::MarginOutOfRange {
            margin,
            equity,
            fraction: round_ratio(margin / equity),
            lower: round_money(lower),
            upper: round_money(upper),
            gross: gap > hard_tolerance,
        })
    }

    fn check_tier(
        &self,
        decision: &Decision,
        leverage: u32,
        risk_usd: Decimal,
        equity: Decimal,
        grade: Grade,
        policy: &RiskPolicy,
    ) -> Checked<()> {
        let tier = policy.tier();
        if !policy.allows_symbol(&decision.symbol) {
            return Err(Violation::SymbolNotAllowed {
                symbol: decision.symbol.clone(),
                tier,
            });
        }

        let class = decision.symbol.class();
        let (min, max) = policy.leverage_bounds(class);
        if leverage < min || leverage > max {
            return Err(Violation::LeverageOutOfBounds { leverage, min, max, class });
        }

        let (min_fraction, max_pct) = policy.risk_budget();
        let max_fraction = max_pct * grade.risk_multiplier();
        let fraction = risk_usd / equity;
        if fraction < min_fraction || fraction > max_fraction {
            return Err(Violation::RiskBudgetOutOfRange {
                risk_usd,
                fraction: round_ratio(fraction),
                min_fraction,
                max_fraction: max_fraction.normalize(),
                grade,
                tier,
            });
        }
        Ok(())
    }
}

impl DecisionValidator for TieredValidator {
    fn name(&self) -> &'static str {
        "TieredValidator"
    }

    fn validate(
        &self,
        decision: Decision,
        account: &AccountState,
        policy: &RiskPolicy,
        reference_price: Option<Decimal>,
    ) -> Checked<Decision> {
        let action = decision.action.clone();

        if let Action::Unknown(raw) = &action {
            return Err(Violation::UnknownAction(raw.clone()));
        }
        if decision.symbol.as_str().is_empty() && !matches!(action, Action::Hold | Action::Wait) {
            return Err(Violation::MissingSymbol);
        }

        if let Some(side) = action.open_side() {
            return self.validate_open(decision, side, account, policy, reference_price);
        }

        require_reasoning(&decision)?;
        match action {
            Action::CancelLimitOrder => {
                if decision.order_id.unwrap_or(0) == 0 {
                    return Err(Violation::MissingOrderId);
                }
            }
            Action::UpdateStopLoss => {
                require_positive("stop_loss", decision.stop_loss)?;
            }
            Action::UpdateTakeProfit => {
                require_positive("take_profit", decision.take_profit)?;
            }
            Action::PartialCloseLong | Action::PartialCloseShort => {
                let sized = decision.close_quantity.is_some_and(|q| q > Decimal::ZERO)
                    || decision.close_ratio.is_some_and(|r| r > Decimal::ZERO);
                if !sized {
                    return Err(Violation::PartialCloseSizeMissing);
                }
                reasoning::check_partial_close_rationale(&decision.reasoning)?;
            }
            _ => {}
        }
        Ok(decision)
    }
}

// --- Helpers ---

fn reject(ordinal: usize, symbol: Symbol, action: Action, violation: Violation) -> Rejection {
    Rejection {
        ordinal,
        symbol,
        action,
        violation,
    }
}

fn require_reasoning(decision: &Decision) -> Checked<()> {
    if decision.reasoning.trim().is_empty() {
        return Err(Violation::MissingReasoning);
    }
    Ok(())
}

fn require_positive(field: &'static str, value: Option<Decimal>) -> Checked<Decimal> {
    match value {
        None => Err(Violation::MissingField(field)),
        Some(v) if v <= Decimal::ZERO => Err(Violation::NonPositive { field, value: v }),
        Some(v) => Ok(v),
    }
}

/// Long: `stop < entry < tp1 < tp2 < tp3`. Short: the same chain descending.
/// Without an observed entry only the stop and the take-profits are ordered.
fn check_ladder(
    side: Side,
    stop_loss: Decimal,
    entry: Option<Decimal>,
    take_profits: [Decimal; 3],
) -> Checked<()> {
    let mut ladder: Vec<(&str, Decimal)> = vec![("stop_loss", stop_loss)];
    if let Some(entry) = entry {
        ladder.push(("entry", entry));
    }
    ladder.extend(["tp1", "tp2", "tp3"].into_iter().zip(take_profits));

    let ordered = ladder
        .windows(2)
        .all(|pair| (pair[1].1 - pair[0].1) * side.sign() > Decimal::ZERO);
    if ordered {
        return Ok(());
    }

    let separator = match side {
        Side::Long => " < ",
        Side::Short => " > ",
    };
    let ladder = ladder
        .iter()
        .map(|(name, price)| format!("{name}={price}"))
        .collect::<Vec<_>>()
        .join(separator);
    Err(Violation::LadderDisordered { side, ladder })
}

fn round_money(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

fn round_ratio(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyResolver;
    use core_types::ExecutionPreference;
    use rust_decimal_macros::dec;

    const GRADE_A: &str = "Breakout retest holds. grade: A score: 80";

    fn standard() -> RiskPolicy {
        PolicyResolver::default().resolve(dec!(500))
    }

    fn account() -> AccountState {
        AccountState::new(dec!(500))
    }

    /// BTC long at 100000 with a 3% stop and tp3 at +10%: reward:risk 3.33.
    fn open_long(margin: Decimal, leverage: u32) -> Decision {
        Decision {
            leverage: Some(leverage),
            position_margin_usd: Some(margin),
            stop_loss: Some(dec!(97000)),
            take_profit: Some(dec!(110000)),
            tp1: Some(dec!(103000)),
            tp2: Some(dec!(106000)),
            tp3: Some(dec!(110000)),
            reasoning: GRADE_A.to_string(),
            current_price: Some(dec!(100000)),
            ..Decision::new("BTCUSDT", Action::OpenLong)
        }
    }

    fn validate(decision: Decision) -> Checked<Decision> {
        let reference = decision.current_price;
        TieredValidator::default().validate(decision, &account(), &standard(), reference)
    }

    // --- Open actions ---

    #[test]
    fn test_valid_long_is_accepted_and_risk_filled() {
        let accepted = validate(open_long(dec!(30), 20)).unwrap();

        assert_eq!(accepted.position_margin_usd, Some(dec!(30)));
        // 600 notional * 3% stop distance.
        assert_eq!(accepted.risk_usd, Some(dec!(18)));
    }

    #[test]
    fn test_valid_short_ladder_is_accepted() {
        let decision = Decision {
            action: Action::OpenShort,
            stop_loss: Some(dec!(103000)),
            tp1: Some(dec!(97000)),
            tp2: Some(dec!(94000)),
            tp3: Some(dec!(90000)),
            take_profit: Some(dec!(90000)),
            ..open_long(dec!(30), 20)
        };
        assert!(validate(decision).is_ok());
    }

    #[test]
    fn test_margin_just_below_range_is_clamped_up() {
        // Equity 500: lower bound 25, clamp tolerance max(1.5, 0.2) = 1.5.
        let accepted = validate(open_long(dec!(24), 20)).unwrap();
        assert_eq!(accepted.position_margin_usd, Some(dec!(25)));

        let accepted = validate(open_long(dec!(23.5), 20)).unwrap();
        assert_eq!(accepted.position_margin_usd, Some(dec!(25)));
        assert_eq!(accepted.risk_usd, Some(dec!(15)));
    }

    #[test]
    fn test_margin_just_above_range_is_clamped_down() {
        let decision = Decision {
            stop_loss: Some(dec!(96000)),
            ..open_long(dec!(66), 5)
        };
        let accepted = validate(decision).unwrap();
        assert_eq!(accepted.position_margin_usd, Some(dec!(65)));
    }

    #[test]
    fn test_margin_beyond_clamp_band_is_rejected() {
        match validate(open_long(dec!(23), 20)) {
            Err(Violation::MarginOutOfRange { gross, lower, .. }) => {
                assert!(!gross);
                assert_eq!(lower, dec!(25));
            }
            other => panic!("expected margin rejection, got {other:?}"),
        }
        match validate(open_long(dec!(19), 20)) {
            Err(Violation::MarginOutOfRange { gross, .. }) => assert!(gross),
            other => panic!("expected gross margin rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_clamp_boundary_holds_across_equities() {
        let validator = TieredValidator::default();
        for equity in [dec!(40), dec!(250), dec!(900), dec!(4000)] {
            let lower = equity * dec!(0.05);
            let tolerance = (equity * dec!(0.003)).max(dec!(0.2));

            let inside = validator.check_margin_fraction(lower - tolerance, equity);
            assert_eq!(inside, Ok(lower.round_dp(2).normalize()), "equity {equity}");

            let outside = validator.check_margin_fraction(lower - tolerance - dec!(0.01), equity);
            assert!(outside.is_err(), "equity {equity}");
        }
    }

    #[test]
    fn test_add_on_skips_margin_range() {
        let account = account().with_position(Symbol::new("BTCUSDT"), Side::Long);
        let decision = open_long(dec!(80), 5);
        let reference = decision.current_price;
        let accepted = TieredValidator::default()
            .validate(decision, &account, &standard(), reference)
            .unwrap();
        assert_eq!(accepted.position_margin_usd, Some(dec!(80)));
    }

    #[test]
    fn test_low_grades_never_open() {
        for reasoning in ["grade: C score: 60", "grade: D score: 30", "grade: F score: 0"] {
            let decision = Decision {
                reasoning: reasoning.to_string(),
                ..open_long(dec!(30), 20)
            };
            assert!(matches!(
                validate(decision),
                Err(Violation::GradeForbidsOpen { .. })
            ));
        }
    }

    #[test]
    fn test_grade_b_is_limit_only() {
        let market = Decision {
            reasoning: "grade: B score: 70".to_string(),
            ..open_long(dec!(30), 15)
        };
        assert_eq!(
            validate(market.clone()),
            Err(Violation::GradeForbidsMarket { grade: Grade::B })
        );

        let limit = Decision {
            action: Action::LimitOpenLong,
            limit_price: Some(dec!(100000)),
            ..market
        };
        assert!(validate(limit).is_ok());
    }

    #[test]
    fn test_limit_preference_needs_a_limit_price() {
        let preferred = Decision {
            reasoning: "grade: B score: 70".to_string(),
            execution_preference: ExecutionPreference::Limit,
            ..open_long(dec!(30), 15)
        };
        assert_eq!(
            validate(preferred.clone()),
            Err(Violation::MissingField("limit_price"))
        );

        let priced = Decision {
            limit_price: Some(dec!(100000)),
            ..preferred
        };
        assert!(validate(priced).is_ok());
    }

    #[test]
    fn test_limit_preference_is_checked_at_its_limit_price() {
        let preferred = |limit_price: Decimal| Decision {
            execution_preference: ExecutionPreference::Limit,
            limit_price: Some(limit_price),
            ..open_long(dec!(30), 20)
        };

        // Below the stop: the resting entry, not the 100000 market price, is checked.
        assert_eq!(
            validate(preferred(dec!(96500))),
            Err(Violation::StopWrongSide {
                side: Side::Long,
                entry: dec!(96500),
                stop_loss: dec!(97000),
            })
        );

        let wide_targets = |decision: Decision| Decision {
            tp3: Some(dec!(130000)),
            take_profit: Some(dec!(130000)),
            ..decision
        };
        assert!(validate(wide_targets(open_long(dec!(30), 20))).is_ok());
        assert!(matches!(
            validate(wide_targets(preferred(dec!(104000)))),
            Err(Violation::LadderDisordered { side: Side::Long, .. })
        ));
    }

    #[test]
    fn test_reward_risk_below_minimum() {
        let decision = Decision {
            tp1: Some(dec!(101000)),
            tp2: Some(dec!(102000)),
            tp3: Some(dec!(104000)),
            take_profit: Some(dec!(104000)),
            ..open_long(dec!(30), 20)
        };
        match validate(decision) {
            Err(Violation::RewardRiskTooLow { ratio, minimum, .. }) => {
                assert_eq!(ratio, dec!(1.33));
                assert_eq!(minimum, dec!(1.8));
            }
            other => panic!("expected reward:risk rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_disordered_ladder() {
        let decision = Decision {
            tp1: Some(dec!(106000)),
            tp2: Some(dec!(103000)),
            ..open_long(dec!(30), 20)
        };
        assert!(matches!(
            validate(decision),
            Err(Violation::LadderDisordered { side: Side::Long, .. })
        ));
    }

    #[test]
    fn test_take_profit_must_equal_tp3() {
        let decision = Decision {
            take_profit: Some(dec!(109000)),
            ..open_long(dec!(30), 20)
        };
        assert_eq!(
            validate(decision),
            Err(Violation::TakeProfitMismatch {
                take_profit: dec!(109000),
                tp3: dec!(110000)
            })
        );
    }

    #[test]
    fn test_missing_reference_uses_estimated_entry() {
        let decision = Decision {
            current_price: None,
            ..open_long(dec!(30), 20)
        };
        // Entry estimated at 97000 + 20% of 13000 = 99600.
        let accepted = validate(decision).unwrap();
        assert_eq!(accepted.risk_usd, Some(dec!(15.66)));
    }

    #[test]
    fn test_stop_beyond_liquidation() {
        let decision = Decision {
            stop_loss: Some(dec!(95000)),
            ..open_long(dec!(30), 20)
        };
        assert!(matches!(
            validate(decision),
            Err(Violation::StopBeyondLiquidation { leverage: 20, .. })
        ));
    }

    #[test]
    fn test_declared_risk_must_match() {
        let close_enough = Decision {
            risk_usd: Some(dec!(19)),
            ..open_long(dec!(30), 20)
        };
        assert_eq!(validate(close_enough).unwrap().risk_usd, Some(dec!(19)));

        let wrong = Decision {
            risk_usd: Some(dec!(30)),
            ..open_long(dec!(30), 20)
        };
        assert!(matches!(
            validate(wrong),
            Err(Violation::RiskUsdMismatch { .. })
        ));
    }

    #[test]
    fn test_notional_cap_is_off_by_default() {
        let decision = open_long(dec!(30), 20);
        assert!(validate(decision.clone()).is_ok());

        let capped = TieredValidator::new(ValidatorSettings {
            enforce_notional_cap: true,
            major_notional_equity_multiple: dec!(1),
            ..Default::default()
        });
        let reference = decision.current_price;
        assert!(matches!(
            capped.validate(decision, &account(), &standard(), reference),
            Err(Violation::NotionalAboveCap { .. })
        ));
    }

    #[test]
    fn test_aggressive_tier_bounds() {
        let account = AccountState::new(dec!(150));
        let policy = PolicyResolver::default().resolve(dec!(150));
        let validator = TieredValidator::default();

        let doge = Decision {
            leverage: Some(10),
            position_margin_usd: Some(dec!(15)),
            stop_loss: Some(dec!(0.194)),
            tp1: Some(dec!(0.206)),
            tp2: Some(dec!(0.212)),
            tp3: Some(dec!(0.22)),
            take_profit: Some(dec!(0.22)),
            reasoning: GRADE_A.to_string(),
            current_price: Some(dec!(0.2)),
            ..Decision::new("DOGEUSDT", Action::OpenLong)
        };
        assert!(matches!(
            validator.validate(doge, &account, &policy, Some(dec!(0.2))),
            Err(Violation::SymbolNotAllowed { tier: "aggressive", .. })
        ));

        let low_leverage = open_long(dec!(15), 3);
        assert!(matches!(
            validator.validate(low_leverage, &account, &policy, Some(dec!(100000))),
            Err(Violation::LeverageOutOfBounds { min: 5, max: 20, .. })
        ));
    }

    #[test]
    fn test_risk_budget_scales_with_grade() {
        // 36 USDT risk is 7.2% of equity: above 5% * 0.8 for grade A.
        let decision = Decision {
            stop_loss: Some(dec!(94000)),
            tp1: Some(dec!(106000)),
            tp2: Some(dec!(112000)),
            tp3: Some(dec!(120000)),
            take_profit: Some(dec!(120000)),
            ..open_long(dec!(60), 10)
        };
        match validate(decision) {
            Err(Violation::RiskBudgetOutOfRange { max_fraction, grade, .. }) => {
                assert_eq!(grade, Grade::A);
                assert_eq!(max_fraction, dec!(0.04));
            }
            other => panic!("expected risk budget rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_limit_open_requires_limit_price() {
        let decision = Decision {
            action: Action::LimitOpenLong,
            ..open_long(dec!(30), 20)
        };
        assert_eq!(validate(decision), Err(Violation::MissingField("limit_price")));
    }

    // --- Other actions ---

    #[test]
    fn test_non_open_actions() {
        let with = |action: Action, reasoning: &str| Decision {
            reasoning: reasoning.to_string(),
            ..Decision::new("ETHUSDT", action)
        };

        assert_eq!(validate(with(Action::Hold, "  ")), Err(Violation::MissingReasoning));
        assert!(validate(with(Action::CloseShort, "trend flipped")).is_ok());
        assert_eq!(
            validate(with(Action::CancelLimitOrder, "stale order")),
            Err(Violation::MissingOrderId)
        );
        assert_eq!(
            validate(with(Action::UpdateStopLoss, "trail to breakeven")),
            Err(Violation::MissingField("stop_loss"))
        );
        assert_eq!(
            validate(with(Action::Unknown("moon".into()), "why not")),
            Err(Violation::UnknownAction("moon".into()))
        );

        let partial = Decision {
            close_ratio: Some(dec!(0.5)),
            ..with(
                Action::PartialCloseLong,
                "TP1 reached, closing 50% and trailing the remainder",
            )
        };
        assert!(validate(partial.clone()).is_ok());
        let unsized_close = Decision {
            close_ratio: None,
            ..partial
        };
        assert_eq!(validate(unsized_close), Err(Violation::PartialCloseSizeMissing));
    }

    // --- Batches ---

    fn extreme_close(symbol: &str) -> Decision {
        Decision {
            intervention_level: InterventionLevel::Extreme,
            confidence: Some(90),
            reasoning: "EXTREME_INTERVENTION: exchange outage, flatten now".to_string(),
            ..Decision::new(symbol, Action::CloseLong)
        }
    }

    fn batch(decisions: Vec<Decision>) -> std::result::Result<Vec<Decision>, Rejection> {
        TieredValidator::default().validate_batch(decisions, &account(), &standard())
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let hold = Decision {
            reasoning: "nothing to do".to_string(),
            ..Decision::new("ETHUSDT", Action::Hold)
        };
        let bad = Decision {
            reasoning: "grade: C score: 50".to_string(),
            ..open_long(dec!(30), 20)
        };

        let rejection = batch(vec![hold, bad]).unwrap_err();
        assert_eq!(rejection.ordinal, 2);
        assert_eq!(rejection.symbol.as_str(), "BTCUSDT");
        assert!(rejection.to_string().starts_with("decision #2 (BTCUSDT open_long)"));
    }

    #[test]
    fn test_single_extreme_intervention() {
        assert!(batch(vec![extreme_close("BTCUSDT")]).is_ok());

        let rejection = batch(vec![extreme_close("BTCUSDT"), extreme_close("ETHUSDT")]).unwrap_err();
        assert_eq!(rejection.ordinal, 2);
        assert_eq!(
            rejection.violation,
            Violation::MultipleExtremeInterventions { first: 1 }
        );
    }

    #[test]
    fn test_extreme_intervention_requirements() {
        let low_confidence = Decision {
            confidence: Some(70),
            ..extreme_close("BTCUSDT")
        };
        assert!(matches!(
            batch(vec![low_confidence]).unwrap_err().violation,
            Violation::ExtremeConfidenceTooLow { minimum: 85, .. }
        ));

        let no_marker = Decision {
            reasoning: "just close it".to_string(),
            ..extreme_close("BTCUSDT")
        };
        assert!(matches!(
            batch(vec![no_marker]).unwrap_err().violation,
            Violation::ExtremeMarkerMissing { .. }
        ));

        let hold = Decision {
            action: Action::Hold,
            ..extreme_close("BTCUSDT")
        };
        assert!(matches!(
            batch(vec![hold]).unwrap_err().violation,
            Violation::ExtremeActionNotAllowed { .. }
        ));
    }

    #[test]
    fn test_duplicate_entries_and_position_limit() {
        let rejection = batch(vec![open_long(dec!(30), 20), open_long(dec!(30), 20)]).unwrap_err();
        assert_eq!(
            rejection.violation,
            Violation::DuplicateEntry { symbol: Symbol::new("BTCUSDT"), first: 1 }
        );

        let full = AccountState::new(dec!(500))
            .with_position(Symbol::new("SOLUSDT"), Side::Long)
            .with_position(Symbol::new("XRPUSDT"), Side::Short)
            .with_position(Symbol::new("ADAUSDT"), Side::Long);
        let rejection = TieredValidator::default()
            .validate_batch(vec![open_long(dec!(30), 20)], &full, &standard())
            .unwrap_err();
        assert!(matches!(
            rejection.violation,
            Violation::TooManyPositions { open: 3, new: 1, max: 3, .. }
        ));
    }
}
