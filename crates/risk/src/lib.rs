// In crates/risk/src/lib.rs

use core_types::{AccountState, Decision};
use rust_decimal::Decimal;

pub mod error;
pub mod policy;
pub mod reasoning;
pub mod types;
pub mod validator;

// Re-export public types
pub use error::{Error, Rejection, Result, Violation};
pub use policy::{PolicyResolver, RiskPolicy, RiskTiers};
pub use types::ValidatorSettings;
pub use validator::TieredValidator;

/// The universal interface for checking a model decision against risk rules.
///
/// A `DecisionValidator` looks at one normalized `Decision` in isolation and
/// either accepts it, possibly with its margin clamped onto a bound, or
/// reports the first rule it breaks. Rules that span a whole batch live on
/// the implementing type.
pub trait DecisionValidator: Send + Sync {
    /// The name of the validator.
    fn name(&self) -> &'static str;

    /// Validates a single decision.
    ///
    /// # Arguments
    ///
    /// * `decision`: A normalized decision.
    /// * `account`: The account snapshot for this cycle.
    /// * `policy`: The tier policy resolved from the account's equity.
    /// * `reference_price`: The current market price for the decision's symbol,
    ///   if one is known. Limit entries use their own `limit_price` instead.
    ///
    /// # Returns
    ///
    /// * `Ok(Decision)`: The accepted decision, with any in-tolerance margin clamp
    ///   and a computed `risk_usd` applied.
    /// * `Err(Violation)`: The first rule the decision breaks.
    fn validate(
        &self,
        decision: Decision,
        account: &AccountState,
        policy: &RiskPolicy,
        reference_price: Option<Decimal>,
    ) -> std::result::Result<Decision, Violation>;
}
