//! Daily puzzle derivation.
//!
//! A puzzle is fully determined by its calendar date: the date key reduces
//! to an integer seed, and the seeded generator drives every selection in a
//! fixed draw order. The scheduled daily job and any client that falls back
//! to local derivation run this exact code path, which is what keeps all
//! players on the same puzzle for a given day.

pub mod rng;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PuzzleError;
use crate::words;
use rng::SeededRng;

/// Number of target words per puzzle.
pub const TARGET_WORD_COUNT: usize = 3;

/// Inclusive bounds on blacklist size.
pub const BLACKLIST_MIN: usize = 5;
pub const BLACKLIST_MAX: usize = 7;

/// The deterministic daily configuration of target and blacklist words.
///
/// Immutable once derived; `target_words` and `blacklist_words` are disjoint
/// and both are fully determined by `seed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    /// Canonical `YYYY-MM-DD` date this puzzle belongs to.
    pub date_key: String,

    /// Integer seed the date key reduces to.
    pub seed: u32,

    /// Three distinct words drawn from three distinct categories.
    pub target_words: Vec<String>,

    /// Five to seven distinct words disjoint from the targets.
    pub blacklist_words: Vec<String>,
}

/// Current UTC calendar date as a canonical `YYYY-MM-DD` date key.
pub fn today_key() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Reduce a date key to its integer seed (`2025-10-24` -> `20251024`).
///
/// The key must be a real calendar date in canonical form; anything else is
/// rejected so two sites can never disagree on what a key means.
pub fn seed_from_date_key(date_key: &str) -> Result<u32, PuzzleError> {
    let parsed = NaiveDate::parse_from_str(date_key, "%Y-%m-%d")
        .map_err(|_| PuzzleError::InvalidDateKey(date_key.to_string()))?;
    if parsed.format("%Y-%m-%d").to_string() != date_key {
        return Err(PuzzleError::InvalidDateKey(date_key.to_string()));
    }

    let digits: String = date_key.chars().filter(|c| c.is_ascii_digit()).collect();
    digits
        .parse::<u32>()
        .map_err(|_| PuzzleError::InvalidDateKey(date_key.to_string()))
}

/// Derive the puzzle for a date key.
///
/// Draw order is the contract: category shuffle, one target draw per
/// selected category in shuffled order, remainder shuffle, then the
/// blacklist-count draw. Reordering any step changes the output for an
/// identical seed and breaks cross-site agreement.
pub fn derive_puzzle(date_key: &str) -> Result<Puzzle, PuzzleError> {
    let seed = seed_from_date_key(date_key)?;
    let mut rng = SeededRng::new(seed);

    let mut pools: Vec<words::Pool> = words::WORD_POOLS.to_vec();
    rng.shuffle(&mut pools);

    let mut target_words = Vec::with_capacity(TARGET_WORD_COUNT);
    for (_, pool) in pools.iter().take(TARGET_WORD_COUNT) {
        target_words.push(pool[rng.pick_index(pool.len())].to_string());
    }

    let mut remainder: Vec<&str> = words::all_words()
        .into_iter()
        .filter(|w| !target_words.iter().any(|t| t == w))
        .collect();
    rng.shuffle(&mut remainder);

    let blacklist_count = BLACKLIST_MIN + rng.pick_index(BLACKLIST_MAX - BLACKLIST_MIN + 1);
    let blacklist_words: Vec<String> = remainder
        .iter()
        .take(blacklist_count)
        .map(|w| w.to_string())
        .collect();

    Ok(Puzzle {
        date_key: date_key.to_string(),
        seed,
        target_words,
        blacklist_words,
    })
}
