//! Daily puzzle persistence.
//!
//! One record per date key, written once and never updated. The store is
//! an optimization, not an authority: derivation is deterministic, so any
//! client can rebuild the day's puzzle locally when the store is
//! unreachable and arrive at the same words.
//!
//! `get_or_create` is safe under true concurrency. Racing writers for the
//! same date key derive identical puzzles; the conditional insert lets one
//! row win and every caller reads that row back.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqlitePuzzleStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::puzzle::Puzzle;
use crate::words::WORD_POOL_VERSION;

/// Schema version stamped on stored puzzle records.
pub const PUZZLE_RECORD_VERSION: &str = "1.0";

/// A persisted daily puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPuzzle {
    /// Canonical `YYYY-MM-DD` date key.
    pub date: String,

    /// Numeric seed the words were derived from.
    pub seed: u32,

    /// The three hidden target words, in draw order.
    pub target_words: Vec<String>,

    /// The forbidden words, in draw order.
    pub blacklist_words: Vec<String>,

    /// When the record was first written.
    pub created_at: DateTime<Utc>,

    /// Record schema version.
    pub version: String,

    /// Version of the word pool tables used for derivation.
    pub word_pool_version: String,
}

impl StoredPuzzle {
    /// Build a fresh record for a derived puzzle.
    pub fn from_puzzle(puzzle: &Puzzle, created_at: DateTime<Utc>) -> Self {
        Self {
            date: puzzle.date_key.clone(),
            seed: puzzle.seed,
            target_words: puzzle.target_words.clone(),
            blacklist_words: puzzle.blacklist_words.clone(),
            created_at,
            version: PUZZLE_RECORD_VERSION.to_string(),
            word_pool_version: WORD_POOL_VERSION.to_string(),
        }
    }

    /// The domain view of this record.
    pub fn puzzle(&self) -> Puzzle {
        Puzzle {
            date_key: self.date.clone(),
            seed: self.seed,
            target_words: self.target_words.clone(),
            blacklist_words: self.blacklist_words.clone(),
        }
    }
}

/// Idempotent, date-keyed puzzle persistence.
#[async_trait]
pub trait PuzzleStore: Send + Sync {
    /// Fetch the record for `date_key`, if one exists.
    async fn get(&self, date_key: &str) -> Result<Option<StoredPuzzle>, StoreError>;

    /// Fetch the record for `date_key`, deriving and storing it first if
    /// absent. Concurrent callers for the same key all receive the row
    /// that won the write race.
    async fn get_or_create(&self, date_key: &str) -> Result<StoredPuzzle, StoreError>;
}
