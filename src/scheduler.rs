//! Midnight puzzle trigger.
//!
//! Runs the store's idempotent get-or-create once per UTC day. A failed
//! run is logged and retried at the next midnight; nothing downstream
//! depends on it, because clients derive the same puzzle locally whenever
//! the store has no record yet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::puzzle;
use crate::store::{PuzzleStore, StoredPuzzle};

/// Fires the daily puzzle creation job.
pub struct DailyTrigger {
    store: Arc<dyn PuzzleStore>,
}

impl DailyTrigger {
    pub fn new(store: Arc<dyn PuzzleStore>) -> Self {
        Self { store }
    }

    /// Ensure today's puzzle exists. One scheduled firing.
    pub async fn run_once(&self) -> Result<StoredPuzzle, StoreError> {
        let date_key = puzzle::today_key();
        let record = self.store.get_or_create(&date_key).await?;
        info!(date = %record.date, seed = record.seed, "daily puzzle ensured");
        Ok(record)
    }

    /// Fire at every UTC midnight until `shutdown` delivers.
    ///
    /// Covers today immediately on startup, so a process launched mid-day
    /// is not a day behind.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        if let Err(err) = self.run_once().await {
            warn!(error = %err, "initial daily puzzle run failed");
        }

        loop {
            let wait = until_next_utc_midnight(Utc::now());
            info!(seconds = wait.as_secs(), "sleeping until next UTC midnight");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(err) = self.run_once().await {
                        warn!(error = %err, "scheduled daily puzzle run failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("daily trigger shutting down");
                    return;
                }
            }
        }
    }
}

/// Time remaining until the next UTC midnight. At midnight exactly, a
/// full day: the current day's firing has already happened.
fn until_next_utc_midnight(now: DateTime<Utc>) -> Duration {
    let next_midnight = (now + chrono::Duration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| now + chrono::Duration::days(1));

    (next_midnight - now)
        .to_std()
        .unwrap_or(Duration::from_secs(60))
}
