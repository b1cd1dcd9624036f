use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Cents, MealSelection};

pub const STANDARD_MEAL_PRICE: Cents = 5250;
pub const PREMIUM_MEAL_PRICE: Cents = 12000;
pub const EXTRA_RICE_PRICE: Cents = 1000;
pub const EXTRA_BREAD_PRICE: Cents = 400;

/// Price list used to cost a consumption record.
///
/// The policy is operator configuration. Callers never supply prices with a
/// meal, so the same selection always costs the same under one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    pub standard_meal: Cents,
    pub premium_meal: Cents,
    pub extra_rice: Cents,
    pub extra_bread: Cents,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            standard_meal: STANDARD_MEAL_PRICE,
            premium_meal: PREMIUM_MEAL_PRICE,
            extra_rice: EXTRA_RICE_PRICE,
            extra_bread: EXTRA_BREAD_PRICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("price for {0} must not be negative")]
    NegativePrice(&'static str),
    #[error("meal cost overflows the money range")]
    Overflow,
}

impl PricingPolicy {
    /// Reject a policy that could produce a negative charge.
    pub fn validate(&self) -> Result<(), PricingError> {
        let prices = [
            ("standard meal", self.standard_meal),
            ("premium meal", self.premium_meal),
            ("extra rice", self.extra_rice),
            ("extra bread", self.extra_bread),
        ];
        match prices.into_iter().find(|(_, price)| *price < 0) {
            Some((name, _)) => Err(PricingError::NegativePrice(name)),
            None => Ok(()),
        }
    }

    /// Cost of one meal: base price (zero without a main meal, premium price
    /// when the premium flag is set) plus the priced extras.
    pub fn compute_cost(
        &self,
        has_main_meal: bool,
        is_premium: bool,
        extra_rice: u32,
        extra_bread: u32,
    ) -> Result<Cents, PricingError> {
        let base = match (has_main_meal, is_premium) {
            (false, _) => 0,
            (true, false) => self.standard_meal,
            (true, true) => self.premium_meal,
        };

        let rice = self
            .extra_rice
            .checked_mul(Cents::from(extra_rice))
            .ok_or(PricingError::Overflow)?;
        let bread = self
            .extra_bread
            .checked_mul(Cents::from(extra_bread))
            .ok_or(PricingError::Overflow)?;

        base.checked_add(rice)
            .and_then(|c| c.checked_add(bread))
            .ok_or(PricingError::Overflow)
    }

    pub fn cost_of(&self, selection: &MealSelection) -> Result<Cents, PricingError> {
        self.compute_cost(
            selection.has_main_meal,
            selection.is_premium,
            selection.extra_rice,
            selection.extra_bread,
        )
    }
}
