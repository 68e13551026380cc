//! Game session data model.
//!
//! A session is one player's progress against one daily puzzle: attempt
//! counters, matched words, the attempt trail, and an append-only event
//! log. Sessions are owned values: transitions mutate a session passed in
//! by the caller, and persistence is an explicit save performed after each
//! transition, never an implicit side effect.

pub mod engine;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::SessionError;
use crate::puzzle::Puzzle;

/// Lifecycle of a game session.
///
/// `Active` is the only state that accepts prompt submissions; `Won` and
/// `Lost` are terminal. A new calendar day never reopens a session, it
/// replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Active,
    Won,
    Lost,
}

impl GameStatus {
    /// True once the session has ended, in either direction.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::Active)
    }
}

/// One completed round-trip in the attempt trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// 1-based attempt number, equal to the session's `attempts` counter at
    /// recording time.
    pub number: u32,

    /// When the attempt was recorded.
    pub timestamp: DateTime<Utc>,

    /// The player's prompt, trimmed.
    pub prompt: String,

    /// Reply text, or the canonical refusal haiku on a violation.
    pub response: String,

    /// Tokens consumed by the prompt side of the call.
    pub prompt_tokens: u32,

    /// Tokens consumed by the generated reply.
    pub output_tokens: u32,

    /// Total tokens for the call. Zero for violations, which never reach
    /// the remote service.
    pub total_tokens: u32,

    /// Target words newly found this turn, in target-word order.
    pub found_words: Vec<String>,

    /// Snapshot of every matched word after this turn.
    pub matched_so_far: Vec<String>,

    /// True when the prompt used a blacklisted word.
    pub violation: bool,

    /// Blacklist words present in the prompt.
    pub violated_words: Vec<String>,
}

/// An entry in the append-only session event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Snake-case event tag, e.g. `response_processed`.
    pub event_type: String,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// Free-form event payload.
    pub data: Value,
}

impl Event {
    /// Record an event now.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// One player's progress against a daily puzzle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Opaque session identifier.
    pub session_id: Uuid,

    /// The puzzle this session plays against.
    pub puzzle: Puzzle,

    /// Completed attempts. Violations count; failed remote calls do not.
    pub attempts: u32,

    /// Tokens consumed across all successful remote calls.
    pub total_tokens: u64,

    /// Matched target words. Ordered so snapshots serialize stably.
    pub matched_words: BTreeSet<String>,

    /// Attempt records, most recent first.
    pub trail: Vec<AttemptRecord>,

    /// Append-only event log. Entries are never mutated or removed.
    pub events: Vec<Event>,

    /// Lifecycle state.
    pub status: GameStatus,

    /// When the session began.
    pub start_time: DateTime<Utc>,

    /// Set once the session reaches a terminal state.
    pub end_time: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Start a fresh session against a puzzle.
    pub fn new(puzzle: Puzzle) -> Self {
        let date_key = puzzle.date_key.clone();
        let mut session = Self {
            session_id: Uuid::new_v4(),
            puzzle,
            attempts: 0,
            total_tokens: 0,
            matched_words: BTreeSet::new(),
            trail: Vec::new(),
            events: Vec::new(),
            status: GameStatus::Active,
            start_time: Utc::now(),
            end_time: None,
        };
        session.events.push(Event::new(
            "session_start",
            json!({ "reason": "new_day", "dateKey": date_key }),
        ));
        session
    }

    /// Record that a saved session was picked up again.
    pub fn record_resume(&mut self) {
        self.events.push(Event::new(
            "session_resume",
            json!({
                "attempts": self.attempts,
                "matchedWords": self.matched_words.len(),
            }),
        ));
    }

    /// True once the session has ended.
    pub fn game_over(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when every target word has been matched.
    pub fn all_matched(&self) -> bool {
        self.matched_words.len() == self.puzzle.target_words.len()
    }

    /// True when the session belongs to a different calendar day than
    /// `current_date_key`, which means a fresh session must replace it.
    pub fn is_stale(&self, current_date_key: &str) -> bool {
        self.puzzle.date_key != current_date_key
    }

    /// Persist the session as pretty-printed JSON.
    pub fn save_to(&self, path: &Path) -> Result<(), SessionError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load a previously saved session.
    pub fn load_from(path: &Path) -> Result<Self, SessionError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::derive_puzzle;

    fn sample_session() -> SessionState {
        SessionState::new(derive_puzzle("2025-10-24").unwrap())
    }

    #[test]
    fn test_new_session_is_active_and_empty() {
        let session = sample_session();
        assert_eq!(session.status, GameStatus::Active);
        assert!(!session.game_over());
        assert_eq!(session.attempts, 0);
        assert_eq!(session.total_tokens, 0);
        assert!(session.matched_words.is_empty());
        assert!(session.trail.is_empty());
        assert!(session.end_time.is_none());
    }

    #[test]
    fn test_new_session_records_session_start() {
        let session = sample_session();
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.events[0].event_type, "session_start");
        assert_eq!(session.events[0].data["reason"], "new_day");
        assert_eq!(session.events[0].data["dateKey"], "2025-10-24");
    }

    #[test]
    fn test_record_resume_appends_event() {
        let mut session = sample_session();
        session.record_resume();
        let last = session.events.last().unwrap();
        assert_eq!(last.event_type, "session_resume");
        assert_eq!(last.data["attempts"], 0);
    }

    #[test]
    fn test_staleness_by_date_key() {
        let session = sample_session();
        assert!(!session.is_stale("2025-10-24"));
        assert!(session.is_stale("2025-10-25"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!GameStatus::Active.is_terminal());
        assert!(GameStatus::Won.is_terminal());
        assert!(GameStatus::Lost.is_terminal());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = sample_session();
        session.attempts = 2;
        session.total_tokens = 137;
        session.matched_words.insert("forest".to_string());
        session.save_to(&path).unwrap();

        let loaded = SessionState::load_from(&path).unwrap();
        assert_eq!(loaded.session_id, session.session_id);
        assert_eq!(loaded.attempts, 2);
        assert_eq!(loaded.total_tokens, 137);
        assert!(loaded.matched_words.contains("forest"));
        assert_eq!(loaded.puzzle, session.puzzle);
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let session = sample_session();
        let value = serde_json::to_value(&session).unwrap();
        assert!(value["sessionId"].is_string());
        assert!(value["totalTokens"].is_u64());
        assert!(value["matchedWords"].is_array());
        assert_eq!(value["status"], "active");
        assert!(value["startTime"].is_string());
    }

    #[test]
    fn test_attempt_record_serializes_camel_case() {
        let record = AttemptRecord {
            number: 1,
            timestamp: Utc::now(),
            prompt: "a quiet place".to_string(),
            response: "haiku".to_string(),
            prompt_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
            found_words: vec!["forest".to_string()],
            matched_so_far: vec!["forest".to_string()],
            violation: false,
            violated_words: Vec::new(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["number"], 1);
        assert_eq!(value["promptTokens"], 10);
        assert_eq!(value["foundWords"][0], "forest");
        assert_eq!(value["matchedSoFar"][0], "forest");
        assert_eq!(value["violation"], false);
    }
}
