//! Session scoring and export.
//!
//! [`SessionReport`] is a pure projection of a [`SessionState`]: building
//! it never mutates the session, so a report can be regenerated at any
//! point mid-game or after the end and the same state always yields the
//! same report.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ExportError;
use crate::session::engine::{REASON_ALL_MATCHED, REASON_VIOLATION};
use crate::session::{Event, SessionState};

/// Report schema version stamped on every export.
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Efficiency score for a won session: `attempts * 10 + totalTokens / 10`,
/// integer division. Lower is better.
pub fn efficiency_score(attempts: u32, total_tokens: u64) -> u64 {
    u64::from(attempts) * 10 + total_tokens / 10
}

/// Portable record of one full session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: String,
    /// Date key of the puzzle the session played.
    pub game_date: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// ISO-8601 duration in whole seconds, e.g. `PT128S`. Measured up to
    /// the report time while the session is still active.
    pub duration: String,
    pub game_configuration: GameConfiguration,
    pub game_outcome: GameOutcome,
    pub kpis: Kpis,
    pub metrics: Metrics,
    /// Attempt details in trail order, most recent first.
    pub attempts: Vec<AttemptDetail>,
    pub events: Vec<Event>,
    pub aggregate_statistics: AggregateStatistics,
    pub generated_at: DateTime<Utc>,
    pub schema_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfiguration {
    pub target_words: Vec<String>,
    pub blacklist_words: Vec<String>,
    pub target_word_count: usize,
    pub blacklist_word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOutcome {
    /// `completed` or `in_progress`.
    pub status: String,
    /// `victory`, `defeat` or `ongoing`.
    pub result: String,
    /// Terminal reason, absent while the session is active.
    pub completion_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    /// Fraction of target words matched, 0 to 1.
    pub success_rate: f64,
    /// Average tokens consumed per attempt.
    pub token_efficiency: f64,
    /// Average attempts per matched word. Zero before the first match.
    pub attempt_efficiency: f64,
    /// Efficiency score, present only for a won session.
    pub completion_score: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub prompt_metrics: PromptMetrics,
    pub response_metrics: ResponseMetrics,
    pub token_metrics: TokenMetrics,
    pub timing_metrics: TimingMetrics,
    pub event_metrics: EventMetrics,
}

/// Length figures are character counts; zero when there are no attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetrics {
    pub average_length: u64,
    pub min_length: u64,
    pub max_length: u64,
    pub total_prompts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetrics {
    pub average_length: u64,
    pub min_length: u64,
    pub max_length: u64,
    pub total_responses: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetrics {
    pub total_tokens: u64,
    pub average_per_attempt: u64,
    pub min_per_attempt: u64,
    pub max_per_attempt: u64,
    pub prompt_tokens_total: u64,
    pub output_tokens_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingMetrics {
    pub session_duration_ms: i64,
    /// Mean gap between consecutive attempts; zero with fewer than two.
    pub average_ms_between_attempts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetrics {
    pub total_events: usize,
    pub event_types: BTreeMap<String, u64>,
    /// Count of `api_error` events.
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDetail {
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    pub user_prompt: TextStats,
    pub ai_response: TextStats,
    pub token_usage: TokenUsage,
    pub word_matching: WordMatching,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStats {
    pub text: String,
    pub length: u64,
    pub word_count: usize,
}

impl TextStats {
    fn of(text: &str) -> Self {
        Self {
            text: text.to_string(),
            length: text.chars().count() as u64,
            word_count: text.split_whitespace().count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordMatching {
    pub words_found_in_response: Vec<String>,
    pub new_words_found: usize,
    pub cumulative_matches: usize,
    pub is_violation: bool,
    pub violated_words: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStatistics {
    pub total_attempts: u32,
    pub total_tokens_consumed: u64,
    pub average_tokens_per_attempt: u64,
    pub words_matched: usize,
    pub words_remaining: usize,
    pub match_percentage: u64,
    /// Present only for a won session.
    pub efficiency_score: Option<u64>,
}

impl SessionReport {
    /// Project a session into a report as of `now`.
    pub fn from_state(state: &SessionState, now: DateTime<Utc>) -> Self {
        let end = state.end_time;
        let duration_ms = (end.unwrap_or(now) - state.start_time).num_milliseconds();
        let won = state.all_matched();
        let over = state.game_over();

        let attempts: Vec<AttemptDetail> = state
            .trail
            .iter()
            .map(|record| AttemptDetail {
                attempt_number: record.number,
                timestamp: record.timestamp,
                user_prompt: TextStats::of(&record.prompt),
                ai_response: TextStats::of(&record.response),
                token_usage: TokenUsage {
                    prompt_tokens: record.prompt_tokens,
                    output_tokens: record.output_tokens,
                    total_tokens: record.total_tokens,
                },
                word_matching: WordMatching {
                    words_found_in_response: record.found_words.clone(),
                    new_words_found: record.found_words.len(),
                    cumulative_matches: record.matched_so_far.len(),
                    is_violation: record.violation,
                    violated_words: record.violated_words.clone(),
                },
            })
            .collect();

        Self {
            session_id: state.session_id.to_string(),
            game_date: state.puzzle.date_key.clone(),
            start_time: state.start_time,
            end_time: end,
            duration: format!("PT{}S", duration_ms / 1000),
            game_configuration: GameConfiguration {
                target_words: state.puzzle.target_words.clone(),
                blacklist_words: state.puzzle.blacklist_words.clone(),
                target_word_count: state.puzzle.target_words.len(),
                blacklist_word_count: state.puzzle.blacklist_words.len(),
            },
            game_outcome: GameOutcome {
                status: if over { "completed" } else { "in_progress" }.to_string(),
                result: if won {
                    "victory"
                } else if over {
                    "defeat"
                } else {
                    "ongoing"
                }
                .to_string(),
                completion_reason: over.then(|| {
                    if won { REASON_ALL_MATCHED } else { REASON_VIOLATION }.to_string()
                }),
            },
            kpis: kpis(state, won, over),
            metrics: metrics(state, duration_ms),
            attempts,
            events: state.events.clone(),
            aggregate_statistics: aggregate_statistics(state, won, over),
            generated_at: now,
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
        }
    }
}

fn kpis(state: &SessionState, won: bool, over: bool) -> Kpis {
    let targets = state.puzzle.target_words.len();
    let matched = state.matched_words.len();
    Kpis {
        success_rate: if targets > 0 {
            matched as f64 / targets as f64
        } else {
            0.0
        },
        token_efficiency: if state.attempts > 0 {
            state.total_tokens as f64 / f64::from(state.attempts)
        } else {
            0.0
        },
        attempt_efficiency: if matched > 0 {
            f64::from(state.attempts) / matched as f64
        } else {
            0.0
        },
        completion_score: (over && won).then(|| efficiency_score(state.attempts, state.total_tokens)),
    }
}

fn metrics(state: &SessionState, duration_ms: i64) -> Metrics {
    let prompt_lengths: Vec<u64> = state
        .trail
        .iter()
        .map(|r| r.prompt.chars().count() as u64)
        .collect();
    let response_lengths: Vec<u64> = state
        .trail
        .iter()
        .map(|r| r.response.chars().count() as u64)
        .collect();
    let token_counts: Vec<u64> = state
        .trail
        .iter()
        .map(|r| u64::from(r.total_tokens))
        .collect();

    let mut event_types: BTreeMap<String, u64> = BTreeMap::new();
    for event in &state.events {
        *event_types.entry(event.event_type.clone()).or_insert(0) += 1;
    }
    let errors = event_types.get("api_error").copied().unwrap_or(0);

    Metrics {
        prompt_metrics: PromptMetrics {
            average_length: rounded_mean(&prompt_lengths),
            min_length: prompt_lengths.iter().min().copied().unwrap_or(0),
            max_length: prompt_lengths.iter().max().copied().unwrap_or(0),
            total_prompts: prompt_lengths.len(),
        },
        response_metrics: ResponseMetrics {
            average_length: rounded_mean(&response_lengths),
            min_length: response_lengths.iter().min().copied().unwrap_or(0),
            max_length: response_lengths.iter().max().copied().unwrap_or(0),
            total_responses: response_lengths.len(),
        },
        token_metrics: TokenMetrics {
            total_tokens: state.total_tokens,
            average_per_attempt: rounded_mean(&token_counts),
            min_per_attempt: token_counts.iter().min().copied().unwrap_or(0),
            max_per_attempt: token_counts.iter().max().copied().unwrap_or(0),
            prompt_tokens_total: state
                .trail
                .iter()
                .map(|r| u64::from(r.prompt_tokens))
                .sum(),
            output_tokens_total: state
                .trail
                .iter()
                .map(|r| u64::from(r.output_tokens))
                .sum(),
        },
        timing_metrics: TimingMetrics {
            session_duration_ms: duration_ms,
            average_ms_between_attempts: average_gap_ms(state),
        },
        event_metrics: EventMetrics {
            total_events: state.events.len(),
            event_types,
            errors,
        },
    }
}

fn aggregate_statistics(state: &SessionState, won: bool, over: bool) -> AggregateStatistics {
    let targets = state.puzzle.target_words.len();
    let matched = state.matched_words.len();
    AggregateStatistics {
        total_attempts: state.attempts,
        total_tokens_consumed: state.total_tokens,
        average_tokens_per_attempt: if state.attempts > 0 {
            (state.total_tokens as f64 / f64::from(state.attempts)).round() as u64
        } else {
            0
        },
        words_matched: matched,
        words_remaining: targets.saturating_sub(matched),
        match_percentage: if targets > 0 {
            (matched as f64 / targets as f64 * 100.0).round() as u64
        } else {
            0
        },
        efficiency_score: (over && won).then(|| efficiency_score(state.attempts, state.total_tokens)),
    }
}

fn rounded_mean(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let sum: u64 = values.iter().sum();
    (sum as f64 / values.len() as f64).round() as u64
}

fn average_gap_ms(state: &SessionState) -> i64 {
    if state.trail.len() < 2 {
        return 0;
    }
    let mut stamps: Vec<i64> = state
        .trail
        .iter()
        .map(|r| r.timestamp.timestamp_millis())
        .collect();
    stamps.sort_unstable();
    let total: i64 = stamps.windows(2).map(|pair| pair[1] - pair[0]).sum();
    (total as f64 / (stamps.len() - 1) as f64).round() as i64
}

/// Where an exported report landed and how big it was.
#[derive(Debug, Clone)]
pub struct ExportReceipt {
    pub path: PathBuf,
    pub bytes: usize,
}

/// Report filename embedding the session id and the export date.
pub fn report_filename(state: &SessionState, now: DateTime<Utc>) -> String {
    format!(
        "wordveil-session-{}-{}.json",
        state.session_id,
        now.format("%Y-%m-%d")
    )
}

/// Write a pretty-printed report into `dir`.
pub fn write_report(state: &SessionState, dir: &Path) -> Result<ExportReceipt, ExportError> {
    let now = Utc::now();
    let report = SessionReport::from_state(state, now);
    let serialized = serde_json::to_string_pretty(&report)?;
    let path = dir.join(report_filename(state, now));
    fs::write(&path, &serialized)?;
    tracing::info!(path = %path.display(), bytes = serialized.len(), "session report written");
    Ok(ExportReceipt {
        path,
        bytes: serialized.len(),
    })
}
