//! In-memory puzzle store for tests and offline play.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::puzzle::derive_puzzle;
use crate::store::{PuzzleStore, StoredPuzzle};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, StoredPuzzle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PuzzleStore for MemoryStore {
    async fn get(&self, date_key: &str) -> Result<Option<StoredPuzzle>, StoreError> {
        Ok(self.records.lock().await.get(date_key).cloned())
    }

    async fn get_or_create(&self, date_key: &str) -> Result<StoredPuzzle, StoreError> {
        // The lock is held across derivation, so the first caller wins and
        // later callers observe its record.
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(date_key) {
            return Ok(existing.clone());
        }

        let puzzle = derive_puzzle(date_key)?;
        let record = StoredPuzzle::from_puzzle(&puzzle, Utc::now());
        records.insert(date_key.to_string(), record.clone());
        Ok(record)
    }
}
