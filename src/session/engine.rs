//! Attempt submission state machine.
//!
//! [`AttemptProcessor::submit_prompt`] runs one full turn: screen the
//! prompt, call the haiku collaborator, scan the reply, and commit the
//! resulting events and attempt record in one step. A turn either commits
//! completely or leaves the session untouched, with a single exception: a
//! failed collaborator call appends an `api_error` event and nothing else,
//! so the player can retry without burning an attempt.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::export::efficiency_score;
use crate::llm::{HaikuProvider, HaikuRequest, HaikuReply};
use crate::prompts;
use crate::session::{AttemptRecord, Event, GameStatus, SessionState};

/// Maximum accepted prompt length in characters, counted after trimming.
pub const MAX_PROMPT_CHARS: usize = 500;

/// Terminal reason recorded when a blacklisted word ends the session.
pub const REASON_VIOLATION: &str = "blacklist_violation";

/// Terminal reason recorded when every target word has been matched.
pub const REASON_ALL_MATCHED: &str = "all_words_matched";

/// Verdict from a pre-submission prompt screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenVerdict {
    Allow,
    Block { reason: String },
}

/// Pre-submission prompt screening.
///
/// Implementations wrap external safety scanners. The screen runs in the
/// caller before [`AttemptProcessor::submit_prompt`]; a blocked prompt
/// never reaches the session, so it costs no attempt and no tokens. The
/// engine itself enforces only the blacklist.
#[async_trait]
pub trait PromptScreen: Send + Sync {
    async fn screen(&self, prompt: &str) -> ScreenVerdict;
}

/// Screen that allows everything, for local play.
pub struct AllowAllScreen;

#[async_trait]
impl PromptScreen for AllowAllScreen {
    async fn screen(&self, _prompt: &str) -> ScreenVerdict {
        ScreenVerdict::Allow
    }
}

/// What a committed turn did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The prompt used a blacklisted word; the session is lost. No remote
    /// call was made and no tokens were consumed.
    Violation { violated_words: Vec<String> },

    /// The reply was processed and the session stays active.
    Continue {
        response: String,
        found_words: Vec<String>,
    },

    /// The reply was processed and every target word is now matched.
    Won {
        response: String,
        found_words: Vec<String>,
        efficiency_score: u64,
    },
}

/// Runs prompt submissions against session state.
///
/// Holds the haiku collaborator; all game state lives in the
/// [`SessionState`] passed to each call. Callers persist the session after
/// each committed turn; nothing here saves.
pub struct AttemptProcessor {
    provider: Arc<dyn HaikuProvider>,
}

impl AttemptProcessor {
    pub fn new(provider: Arc<dyn HaikuProvider>) -> Self {
        Self { provider }
    }

    /// Submit one prompt and advance the session.
    ///
    /// Rejected prompts (empty, oversize, or submitted after the game
    /// ended) are full no-ops: no attempt, no events, no tokens. The
    /// blacklist screen runs before any remote call, so a violating prompt
    /// costs zero tokens.
    pub async fn submit_prompt(
        &self,
        state: &mut SessionState,
        raw_prompt: &str,
    ) -> Result<TurnOutcome, SessionError> {
        if state.status.is_terminal() {
            return Err(SessionError::SessionOver);
        }

        let prompt = raw_prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        let length = prompt.chars().count();
        if length > MAX_PROMPT_CHARS {
            return Err(SessionError::PromptTooLong {
                length,
                limit: MAX_PROMPT_CHARS,
            });
        }

        // Buffered until the turn is known to commit.
        let submitted = Event::new(
            "prompt_submitted",
            json!({
                "promptLength": length,
                "attemptNumber": state.attempts + 1,
            }),
        );

        let violated_words = scan_blacklist(prompt, &state.puzzle.blacklist_words);
        if !violated_words.is_empty() {
            return Ok(commit_violation(state, submitted, prompt, violated_words));
        }

        let request = HaikuRequest {
            system_instruction: prompts::system_instruction(&state.puzzle.blacklist_words),
            user_prompt: prompt.to_string(),
        };
        debug!(session = %state.session_id, prompt_chars = length, "requesting haiku reply");
        let reply = match self.provider.generate_haiku(request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(session = %state.session_id, error = %err, "haiku call failed; attempt not counted");
                state.events.push(Event::new(
                    "api_error",
                    json!({
                        "error": err.to_string(),
                        "attemptNumber": state.attempts + 1,
                    }),
                ));
                return Err(SessionError::Provider(err));
            }
        };

        Ok(commit_reply(state, submitted, prompt, reply))
    }
}

/// Case-insensitive substring scan of the player's prompt. Replies are
/// never scanned for blacklisted words.
fn scan_blacklist(prompt: &str, blacklist: &[String]) -> Vec<String> {
    let haystack = prompt.to_lowercase();
    blacklist
        .iter()
        .filter(|word| haystack.contains(&word.to_lowercase()))
        .cloned()
        .collect()
}

/// Target words present in the reply that have not been matched before,
/// in target-word order.
fn scan_targets(
    response: &str,
    targets: &[String],
    matched: &BTreeSet<String>,
) -> Vec<String> {
    let haystack = response.to_lowercase();
    targets
        .iter()
        .filter(|word| !matched.contains(*word) && haystack.contains(&word.to_lowercase()))
        .cloned()
        .collect()
}

/// Commit a violating turn: one attempt, zero tokens, terminal loss.
/// Infallible once entered, so the session never half-commits.
fn commit_violation(
    state: &mut SessionState,
    submitted: Event,
    prompt: &str,
    violated_words: Vec<String>,
) -> TurnOutcome {
    let now = Utc::now();
    state.attempts += 1;
    state.status = GameStatus::Lost;
    state.end_time = Some(now);

    state.events.push(submitted);
    state.events.push(Event::new(
        "blacklist_violation_detected",
        json!({
            "violatedWords": violated_words,
            "promptLength": prompt.chars().count(),
        }),
    ));

    state.trail.insert(
        0,
        AttemptRecord {
            number: state.attempts,
            timestamp: now,
            prompt: prompt.to_string(),
            response: prompts::REFUSAL_HAIKU.to_string(),
            prompt_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            found_words: Vec::new(),
            matched_so_far: state.matched_words.iter().cloned().collect(),
            violation: true,
            violated_words: violated_words.clone(),
        },
    );

    state.events.push(Event::new(
        "game_over",
        json!({
            "reason": REASON_VIOLATION,
            "violatedWords": violated_words,
            "finalAttempts": state.attempts,
            "finalTokens": state.total_tokens,
            "wordsMatched": state.matched_words.len(),
            "wordsTotal": state.puzzle.target_words.len(),
        }),
    ));

    info!(
        session = %state.session_id,
        words = ?violated_words,
        "blacklist violation ended the session"
    );
    TurnOutcome::Violation { violated_words }
}

/// Commit a clean turn: count the attempt and its tokens, fold newly
/// found words into the match set, and end the game if all targets are
/// matched. Infallible once entered.
fn commit_reply(
    state: &mut SessionState,
    submitted: Event,
    prompt: &str,
    reply: HaikuReply,
) -> TurnOutcome {
    let now = Utc::now();
    state.attempts += 1;
    state.total_tokens += u64::from(reply.usage.total_tokens);

    let found_words = scan_targets(&reply.text, &state.puzzle.target_words, &state.matched_words);
    for word in &found_words {
        state.matched_words.insert(word.clone());
    }

    state.events.push(submitted);
    state.events.push(Event::new(
        "response_processed",
        json!({
            "attemptNumber": state.attempts,
            "promptTokens": reply.usage.prompt_tokens,
            "outputTokens": reply.usage.output_tokens,
            "totalTokens": reply.usage.total_tokens,
            "foundWords": found_words,
            "newWordsFound": found_words.len(),
            "totalMatches": state.matched_words.len(),
            "responseLength": reply.text.chars().count(),
        }),
    ));

    state.trail.insert(
        0,
        AttemptRecord {
            number: state.attempts,
            timestamp: now,
            prompt: prompt.to_string(),
            response: reply.text.clone(),
            prompt_tokens: reply.usage.prompt_tokens,
            output_tokens: reply.usage.output_tokens,
            total_tokens: reply.usage.total_tokens,
            found_words: found_words.clone(),
            matched_so_far: state.matched_words.iter().cloned().collect(),
            violation: false,
            violated_words: Vec::new(),
        },
    );

    if state.all_matched() {
        state.status = GameStatus::Won;
        state.end_time = Some(now);
        let score = efficiency_score(state.attempts, state.total_tokens);
        state.events.push(Event::new(
            "game_over",
            json!({
                "reason": REASON_ALL_MATCHED,
                "finalAttempts": state.attempts,
                "finalTokens": state.total_tokens,
                "wordsMatched": state.matched_words.len(),
                "wordsTotal": state.puzzle.target_words.len(),
                "efficiencyScore": score,
            }),
        ));
        info!(
            session = %state.session_id,
            attempts = state.attempts,
            tokens = state.total_tokens,
            score,
            "all target words matched"
        );
        TurnOutcome::Won {
            response: reply.text,
            found_words,
            efficiency_score: score,
        }
    } else {
        debug!(
            session = %state.session_id,
            matched = state.matched_words.len(),
            "turn committed"
        );
        TurnOutcome::Continue {
            response: reply.text,
            found_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::Usage;
    use crate::puzzle::Puzzle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns one canned reply for every call and counts calls.
    struct FixedProvider {
        text: String,
        usage: Usage,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(text: &str, total_tokens: u32) -> Self {
            Self {
                text: text.to_string(),
                usage: Usage {
                    prompt_tokens: total_tokens / 2,
                    output_tokens: total_tokens - total_tokens / 2,
                    total_tokens,
                },
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HaikuProvider for FixedProvider {
        async fn generate_haiku(&self, _request: HaikuRequest) -> Result<HaikuReply, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HaikuReply {
                text: self.text.clone(),
                usage: self.usage,
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl HaikuProvider for FailingProvider {
        async fn generate_haiku(&self, _request: HaikuRequest) -> Result<HaikuReply, LlmError> {
            Err(LlmError::RequestFailed("connection reset".to_string()))
        }
    }

    fn test_puzzle() -> Puzzle {
        Puzzle {
            date_key: "2025-10-24".to_string(),
            seed: 20251024,
            target_words: vec![
                "river".to_string(),
                "dawn".to_string(),
                "frost".to_string(),
            ],
            blacklist_words: vec![
                "ocean".to_string(),
                "storm".to_string(),
                "fire".to_string(),
                "owl".to_string(),
                "leaf".to_string(),
            ],
        }
    }

    fn event_types(state: &SessionState) -> Vec<&str> {
        state.events.iter().map(|e| e.event_type.as_str()).collect()
    }

    #[tokio::test]
    async fn test_violation_ends_session_without_remote_call() {
        let provider = Arc::new(FixedProvider::new("unused", 100));
        let processor = AttemptProcessor::new(provider.clone());
        let mut state = SessionState::new(test_puzzle());

        let outcome = processor
            .submit_prompt(&mut state, "tell me about the ocean depths")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Violation {
                violated_words: vec!["ocean".to_string()]
            }
        );
        assert_eq!(provider.call_count(), 0);
        assert_eq!(state.status, GameStatus::Lost);
        assert_eq!(state.attempts, 1);
        assert_eq!(state.total_tokens, 0);
        assert!(state.end_time.is_some());

        let record = &state.trail[0];
        assert!(record.violation);
        assert_eq!(record.total_tokens, 0);
        assert_eq!(record.response, prompts::REFUSAL_HAIKU);
        assert_eq!(record.violated_words, vec!["ocean".to_string()]);

        assert_eq!(
            event_types(&state),
            vec![
                "session_start",
                "prompt_submitted",
                "blacklist_violation_detected",
                "game_over",
            ]
        );
        let game_over = state.events.last().unwrap();
        assert_eq!(game_over.data["reason"], REASON_VIOLATION);
        assert_eq!(game_over.data["finalAttempts"], 1);
    }

    #[tokio::test]
    async fn test_violation_scan_is_case_insensitive_substring() {
        let provider = Arc::new(FixedProvider::new("unused", 100));
        let processor = AttemptProcessor::new(provider.clone());
        let mut state = SessionState::new(test_puzzle());

        // "OCEANIC" contains "ocean" regardless of case.
        let outcome = processor
            .submit_prompt(&mut state, "describe an OCEANIC voyage")
            .await
            .unwrap();

        assert!(matches!(outcome, TurnOutcome::Violation { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_a_full_no_op() {
        let provider = Arc::new(FixedProvider::new("unused", 100));
        let processor = AttemptProcessor::new(provider.clone());
        let mut state = SessionState::new(test_puzzle());
        let events_before = state.events.len();

        let err = processor.submit_prompt(&mut state, "   ").await.unwrap_err();

        assert!(matches!(err, SessionError::EmptyPrompt));
        assert_eq!(state.attempts, 0);
        assert_eq!(state.events.len(), events_before);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversize_prompt_is_rejected_by_char_count() {
        let provider = Arc::new(FixedProvider::new("unused", 100));
        let processor = AttemptProcessor::new(provider.clone());
        let mut state = SessionState::new(test_puzzle());

        let long_prompt = "x".repeat(MAX_PROMPT_CHARS + 1);
        let err = processor
            .submit_prompt(&mut state, &long_prompt)
            .await
            .unwrap_err();

        match err {
            SessionError::PromptTooLong { length, limit } => {
                assert_eq!(length, MAX_PROMPT_CHARS + 1);
                assert_eq!(limit, MAX_PROMPT_CHARS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(state.attempts, 0);
        assert_eq!(provider.call_count(), 0);

        // Exactly at the limit is accepted.
        let max_prompt = "y".repeat(MAX_PROMPT_CHARS);
        processor.submit_prompt(&mut state, &max_prompt).await.unwrap();
        assert_eq!(state.attempts, 1);
    }

    #[tokio::test]
    async fn test_clean_turn_matches_new_words() {
        let provider = Arc::new(FixedProvider::new(
            "The river at dawn,\nCarries light through quiet mist,\nMorning finds its way.",
            120,
        ));
        let processor = AttemptProcessor::new(provider);
        let mut state = SessionState::new(test_puzzle());

        let outcome = processor
            .submit_prompt(&mut state, "what moves through the valley at first light")
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Continue {
                found_words,
                response,
            } => {
                assert_eq!(found_words, vec!["river".to_string(), "dawn".to_string()]);
                assert!(response.contains("river"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(state.status, GameStatus::Active);
        assert_eq!(state.attempts, 1);
        assert_eq!(state.total_tokens, 120);
        assert_eq!(state.matched_words.len(), 2);

        let processed = &state.events[2];
        assert_eq!(processed.event_type, "response_processed");
        assert_eq!(processed.data["newWordsFound"], 2);
        assert_eq!(processed.data["totalMatches"], 2);
        assert_eq!(processed.data["totalTokens"], 120);
    }

    #[tokio::test]
    async fn test_found_words_exclude_already_matched() {
        let provider = Arc::new(FixedProvider::new(
            "A river runs on,\nThe same river as before,\nNothing new is found.",
            80,
        ));
        let processor = AttemptProcessor::new(provider);
        let mut state = SessionState::new(test_puzzle());

        processor.submit_prompt(&mut state, "first").await.unwrap();
        let outcome = processor.submit_prompt(&mut state, "second").await.unwrap();

        match outcome {
            TurnOutcome::Continue { found_words, .. } => assert!(found_words.is_empty()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(state.attempts, 2);
        assert_eq!(state.matched_words.len(), 1);
        // Both attempts are in the trail, most recent first.
        assert_eq!(state.trail[0].number, 2);
        assert_eq!(state.trail[1].number, 1);
        assert!(state.trail[0].found_words.is_empty());
        assert_eq!(state.trail[1].found_words, vec!["river".to_string()]);
    }

    #[tokio::test]
    async fn test_matching_all_targets_wins() {
        let provider = Arc::new(FixedProvider::new(
            "River meets the dawn,\nFrost retreats from waking fields,\nDay begins again.",
            150,
        ));
        let processor = AttemptProcessor::new(provider);
        let mut state = SessionState::new(test_puzzle());

        let outcome = processor
            .submit_prompt(&mut state, "morning in the cold fields")
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Won {
                found_words,
                efficiency_score,
                ..
            } => {
                assert_eq!(found_words.len(), 3);
                // 1 attempt * 10 + 150 / 10
                assert_eq!(efficiency_score, 25);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(state.status, GameStatus::Won);
        assert!(state.end_time.is_some());

        let game_over = state.events.last().unwrap();
        assert_eq!(game_over.event_type, "game_over");
        assert_eq!(game_over.data["reason"], REASON_ALL_MATCHED);
        assert_eq!(game_over.data["efficiencyScore"], 25);
        assert_eq!(game_over.data["wordsMatched"], 3);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_session_unchanged() {
        let processor = AttemptProcessor::new(Arc::new(FailingProvider));
        let mut state = SessionState::new(test_puzzle());

        let err = processor
            .submit_prompt(&mut state, "a perfectly fine prompt")
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Provider(_)));
        assert_eq!(state.attempts, 0);
        assert_eq!(state.total_tokens, 0);
        assert_eq!(state.status, GameStatus::Active);
        assert!(state.trail.is_empty());

        // Only the api_error event was appended; no prompt_submitted.
        assert_eq!(event_types(&state), vec!["session_start", "api_error"]);
        assert_eq!(state.events[1].data["attemptNumber"], 1);
    }

    #[tokio::test]
    async fn test_terminal_session_rejects_submissions() {
        let provider = Arc::new(FixedProvider::new("unused", 100));
        let processor = AttemptProcessor::new(provider.clone());
        let mut state = SessionState::new(test_puzzle());

        processor
            .submit_prompt(&mut state, "the storm is coming")
            .await
            .unwrap();
        assert_eq!(state.status, GameStatus::Lost);
        let events_after_loss = state.events.len();

        let err = processor
            .submit_prompt(&mut state, "another try")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionOver));
        assert_eq!(state.attempts, 1);
        assert_eq!(state.events.len(), events_after_loss);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_allow_all_screen_allows() {
        let verdict = AllowAllScreen.screen("any prompt at all").await;
        assert_eq!(verdict, ScreenVerdict::Allow);
    }

    #[tokio::test]
    async fn test_violation_reports_every_violated_word() {
        let provider = Arc::new(FixedProvider::new("unused", 100));
        let processor = AttemptProcessor::new(provider);
        let mut state = SessionState::new(test_puzzle());

        let outcome = processor
            .submit_prompt(&mut state, "fire and storm over the ocean")
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Violation { violated_words } => {
                // Blacklist order, not prompt order.
                assert_eq!(violated_words, vec!["ocean", "storm", "fire"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
