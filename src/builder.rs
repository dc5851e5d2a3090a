//! Accumulator assembly and constraint validation.
//!
//! Combined odds are the exact `Decimal` product of the leg odds and the
//! potential return is stake × combined odds. Two runs over the same legs
//! always record identical figures, at any leg count.

use rust_decimal::Decimal;

use crate::types::{Accumulator, BetError, Leg};

/// Builds and validates accumulators under the configured constraints.
#[derive(Debug, Clone)]
pub struct AccumulatorBuilder {
    min_odds: Decimal,
    max_legs: usize,
}

impl AccumulatorBuilder {
    pub fn new(min_odds: Decimal, max_legs: usize) -> Self {
        Self { min_odds, max_legs }
    }

    /// Assemble an accumulator from selected legs.
    ///
    /// Recomputes the combined odds from the legs themselves; aggregates
    /// from the selector or backend are never trusted.
    pub fn build(&self, legs: Vec<Leg>, stake: Decimal) -> Result<Accumulator, BetError> {
        if stake <= Decimal::ZERO {
            return Err(BetError::Constraint(format!(
                "stake must be positive, got {stake}"
            )));
        }
        if legs.len() < 2 {
            return Err(BetError::Constraint(format!(
                "an accumulator needs at least 2 legs, got {}",
                legs.len()
            )));
        }
        if legs.len() > self.max_legs {
            return Err(BetError::Constraint(format!(
                "too many legs: {} exceeds the limit of {}",
                legs.len(),
                self.max_legs
            )));
        }
        if let Some(bad) = legs.iter().find(|l| l.odds < self.min_odds) {
            return Err(BetError::Constraint(format!(
                "leg {} odds {} below the floor of {}",
                bad.match_id, bad.odds, self.min_odds
            )));
        }

        let combined_odds = legs.iter().fold(Decimal::ONE, |acc, leg| acc * leg.odds);
        let potential_return = stake * combined_odds;

        Ok(Accumulator {
            legs,
            stake,
            combined_odds,
            potential_return,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
