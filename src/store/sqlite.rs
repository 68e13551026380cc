//! SQLite-backed daily puzzle store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::error::StoreError;
use crate::puzzle::derive_puzzle;
use crate::store::{PuzzleStore, StoredPuzzle};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS daily_puzzles (
    date_key          TEXT    NOT NULL,
    seed              INTEGER NOT NULL,
    target_words      TEXT    NOT NULL,
    blacklist_words   TEXT    NOT NULL,
    created_at        TEXT    NOT NULL,
    version           TEXT    NOT NULL,
    word_pool_version TEXT    NOT NULL,

    PRIMARY KEY (date_key)
);
"#;

/// Puzzle store on a local SQLite database. Word lists are stored as JSON
/// text columns.
#[derive(Clone)]
pub struct SqlitePuzzleStore {
    pool: SqlitePool,
}

impl SqlitePuzzleStore {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!(path = path, "puzzle store opened");
        Ok(Self { pool })
    }
}

#[async_trait]
impl PuzzleStore for SqlitePuzzleStore {
    async fn get(&self, date_key: &str) -> Result<Option<StoredPuzzle>, StoreError> {
        let row = sqlx::query("SELECT * FROM daily_puzzles WHERE date_key = ?1")
            .bind(date_key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let target_words: Vec<String> = serde_json::from_str(&row.get::<String, _>("target_words"))?;
        let blacklist_words: Vec<String> =
            serde_json::from_str(&row.get::<String, _>("blacklist_words"))?;

        Ok(Some(StoredPuzzle {
            date: row.get("date_key"),
            seed: row.get::<i64, _>("seed") as u32,
            target_words,
            blacklist_words,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            version: row.get("version"),
            word_pool_version: row.get("word_pool_version"),
        }))
    }

    async fn get_or_create(&self, date_key: &str) -> Result<StoredPuzzle, StoreError> {
        if let Some(existing) = self.get(date_key).await? {
            return Ok(existing);
        }

        let puzzle = derive_puzzle(date_key)?;
        let record = StoredPuzzle::from_puzzle(&puzzle, Utc::now());

        // Conditional create: a racing writer may have inserted first, in
        // which case its row stands and ours is dropped.
        sqlx::query(
            "INSERT INTO daily_puzzles (
                date_key, seed, target_words, blacklist_words,
                created_at, version, word_pool_version
            ) VALUES (?1,?2,?3,?4,?5,?6,?7)
            ON CONFLICT(date_key) DO NOTHING",
        )
        .bind(&record.date)
        .bind(record.seed as i64)
        .bind(serde_json::to_string(&record.target_words)?)
        .bind(serde_json::to_string(&record.blacklist_words)?)
        .bind(record.created_at)
        .bind(&record.version)
        .bind(&record.word_pool_version)
        .execute(&self.pool)
        .await?;

        // Read back whichever record won.
        self.get(date_key)
            .await?
            .ok_or_else(|| StoreError::NotFound(date_key.to_string()))
    }
}
