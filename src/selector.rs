//! Match selection policies.
//!
//! Turns the backend's match list into a candidate leg set. All policies
//! share the same qualification filter (available, odds at or above the
//! floor) and the same truncation to the leg limit; they differ only in
//! ordering. Selection is deterministic for identical inputs — the random
//! policy takes an explicit seed so tests can reproduce draws.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::types::{BetError, Leg, Match};

/// An accumulator below two legs is not an accumulator.
const MIN_LEGS: usize = 2;

/// Selection mode as named in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Top,
    Random,
    FromFeed,
}

/// A fully-resolved selection policy.
#[derive(Debug, Clone)]
pub enum SelectionPolicy {
    /// Highest odds first.
    Top,
    /// Uniform draw without replacement; seeded for reproducibility.
    Random { seed: Option<u64> },
    /// Pre-supplied ordered candidate list from an external feed.
    FromFeed { ids: Vec<String> },
}

/// Select up to `max_legs` qualifying legs under `policy`.
///
/// Fails with [`BetError::InsufficientMatches`] when fewer than two
/// matches survive filtering (or, for `from_feed`, when the feed names
/// fewer than two qualifying matches).
pub fn select(
    matches: &[Match],
    policy: &SelectionPolicy,
    min_odds: Decimal,
    max_legs: usize,
) -> Result<Vec<Leg>, BetError> {
    let qualifying: Vec<&Match> = matches.iter().filter(|m| m.qualifies(min_odds)).collect();

    debug!(
        offered = matches.len(),
        qualifying = qualifying.len(),
        %min_odds,
        "Filtered match list"
    );

    if qualifying.len() < MIN_LEGS {
        return Err(BetError::InsufficientMatches {
            found: qualifying.len(),
            required: MIN_LEGS,
        });
    }

    let selected: Vec<&Match> = match policy {
        SelectionPolicy::Top => {
            let mut ordered = qualifying;
            // Odds descending, id ascending as a deterministic tie-break.
            ordered.sort_by(|a, b| b.odds.cmp(&a.odds).then_with(|| a.id.cmp(&b.id)));
            ordered.into_iter().take(max_legs).collect()
        }
        SelectionPolicy::Random { seed } => {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(*s),
                None => StdRng::from_entropy(),
            };
            qualifying
                .choose_multiple(&mut rng, max_legs)
                .copied()
                .collect()
        }
        SelectionPolicy::FromFeed { ids } => {
            // A feed may repeat an id; a leg must not.
            let mut seen = std::collections::HashSet::new();
            let picked: Vec<&Match> = ids
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .filter_map(|id| qualifying.iter().find(|m| &m.id == id).copied())
                .take(max_legs)
                .collect();
            if picked.len() < MIN_LEGS {
                return Err(BetError::InsufficientMatches {
                    found: picked.len(),
                    required: MIN_LEGS,
                });
            }
            picked
        }
    };

    Ok(selected.iter().map(|m| Leg::from_match(m)).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
