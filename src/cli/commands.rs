//! CLI command definitions for wordveil.
//!
//! Four commands cover the daily loop: `daily` shows or creates a puzzle
//! record, `schedule` runs the midnight trigger, `play` runs an
//! interactive session and `export` writes a session report.

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::export::{self, ExportReceipt};
use crate::llm::{GeminiClient, HaikuProvider, DEFAULT_API_URL};
use crate::prompts;
use crate::puzzle::{self, Puzzle};
use crate::scheduler::DailyTrigger;
use crate::session::engine::{
    AllowAllScreen, AttemptProcessor, PromptScreen, ScreenVerdict, TurnOutcome,
};
use crate::session::{Event, GameStatus, SessionState};
use crate::store::{PuzzleStore, SqlitePuzzleStore};

/// Default SQLite database holding daily puzzle records.
const DEFAULT_DB: &str = "wordveil.db";

/// Default directory for session saves and exported reports.
const DEFAULT_STATE_DIR: &str = ".";

/// Daily word gauntlet played through a haiku-only AI poet.
#[derive(Parser)]
#[command(name = "wordveil")]
#[command(about = "Daily word gauntlet played through a haiku-only AI poet")]
#[command(version)]
#[command(
    long_about = "wordveil derives a deterministic daily puzzle (three hidden target words and a list of forbidden words), plays sessions against a generative haiku collaborator and exports structured session reports.\n\nExample usage:\n  wordveil daily --date 2025-10-24\n  wordveil play\n  wordveil export --output ./reports"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Show or create the puzzle record for a date.
    Daily(DailyArgs),

    /// Run the midnight loop that creates each day's puzzle record.
    Schedule(ScheduleArgs),

    /// Play today's puzzle interactively.
    Play(PlayArgs),

    /// Export a saved session as a structured report.
    Export(ExportArgs),
}

/// Arguments for `wordveil daily`.
#[derive(Parser, Debug)]
pub struct DailyArgs {
    /// Date key (YYYY-MM-DD). Defaults to today in UTC.
    #[arg(short, long)]
    pub date: Option<String>,

    /// SQLite database for daily puzzle records.
    #[arg(long, default_value = DEFAULT_DB, env = "WORDVEIL_DB")]
    pub db: String,

    /// Derive locally without touching the store.
    #[arg(long)]
    pub offline: bool,

    /// Output JSON instead of human-readable lines.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `wordveil schedule`.
#[derive(Parser, Debug)]
pub struct ScheduleArgs {
    /// SQLite database for daily puzzle records.
    #[arg(long, default_value = DEFAULT_DB, env = "WORDVEIL_DB")]
    pub db: String,
}

/// Arguments for `wordveil play`.
#[derive(Parser, Debug)]
pub struct PlayArgs {
    /// SQLite database for daily puzzle records. Play falls back to local
    /// derivation when the store is unavailable.
    #[arg(long, default_value = DEFAULT_DB, env = "WORDVEIL_DB")]
    pub db: String,

    /// Directory for session saves and exported reports.
    #[arg(long, default_value = DEFAULT_STATE_DIR, env = "WORDVEIL_STATE_DIR")]
    pub state_dir: String,

    /// Gemini API key (can also be set via GEMINI_API_KEY env var).
    #[arg(long, env = "GEMINI_API_KEY")]
    pub api_key: Option<String>,

    /// Override the Gemini endpoint (can also be set via GEMINI_API_URL).
    #[arg(long, env = "GEMINI_API_URL")]
    pub api_url: Option<String>,
}

/// Arguments for `wordveil export`.
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Date key (YYYY-MM-DD) of the session to export. Defaults to today.
    #[arg(short, long)]
    pub date: Option<String>,

    /// Directory holding session saves.
    #[arg(long, default_value = DEFAULT_STATE_DIR, env = "WORDVEIL_STATE_DIR")]
    pub state_dir: String,

    /// Output directory for the report file.
    #[arg(short = 'o', long, default_value = DEFAULT_STATE_DIR)]
    pub output: String,

    /// Output JSON summary instead of human-readable lines.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before
/// running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Daily(args) => run_daily_command(args).await,
        Commands::Schedule(args) => run_schedule_command(args).await,
        Commands::Play(args) => run_play_command(args).await,
        Commands::Export(args) => run_export_command(args).await,
    }
}

// ============================================================================
// Daily Command
// ============================================================================

/// JSON output for the daily command.
#[derive(Debug, Clone, Serialize)]
struct DailyOutput {
    status: String,
    date: String,
    seed: u32,
    target_words: Vec<String>,
    blacklist_words: Vec<String>,
    source: String,
}

async fn run_daily_command(args: DailyArgs) -> anyhow::Result<()> {
    let date_key = args.date.unwrap_or_else(puzzle::today_key);

    let (puzzle, source) = if args.offline {
        (puzzle::derive_puzzle(&date_key)?, "derived")
    } else {
        let store = SqlitePuzzleStore::open(&args.db).await?;
        (store.get_or_create(&date_key).await?.puzzle(), "store")
    };

    let output = DailyOutput {
        status: "success".to_string(),
        date: puzzle.date_key,
        seed: puzzle.seed,
        target_words: puzzle.target_words,
        blacklist_words: puzzle.blacklist_words,
        source: source.to_string(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Puzzle for {} ({})", output.date, output.source);
    println!("  Seed:      {}", output.seed);
    println!("  Targets:   {}", output.target_words.join(", "));
    println!("  Blacklist: {}", output.blacklist_words.join(", "));
    Ok(())
}

// ============================================================================
// Schedule Command
// ============================================================================

async fn run_schedule_command(args: ScheduleArgs) -> anyhow::Result<()> {
    let store: Arc<dyn PuzzleStore> = Arc::new(SqlitePuzzleStore::open(&args.db).await?);
    let trigger = DailyTrigger::new(store);
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);

    let runner = tokio::spawn(async move { trigger.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("interrupt received; stopping daily trigger");
    let _ = shutdown_tx.send(());
    runner.await?;
    Ok(())
}

// ============================================================================
// Play Command
// ============================================================================

async fn run_play_command(args: PlayArgs) -> anyhow::Result<()> {
    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok());
    let Some(api_key) = api_key else {
        anyhow::bail!(
            "GEMINI_API_KEY is required but not set.\n\
             Provide it via --api-key <KEY> or set the GEMINI_API_KEY environment variable."
        );
    };
    let api_url = args
        .api_url
        .clone()
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let provider: Arc<dyn HaikuProvider> = Arc::new(GeminiClient::new(api_url, api_key));

    let (puzzle, source) = resolve_puzzle(&args.db, &puzzle::today_key()).await?;

    let state_dir = PathBuf::from(&args.state_dir);
    fs::create_dir_all(&state_dir)?;
    let session_path = session_file(&state_dir, &puzzle.date_key);

    let mut state = load_or_start(&session_path, puzzle)?;
    state.events.push(Event::new(
        "puzzle_loaded",
        json!({ "dateKey": state.puzzle.date_key, "source": source }),
    ));
    state.save_to(&session_path)?;

    let processor = AttemptProcessor::new(provider);
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    play_loop(
        &processor,
        &AllowAllScreen,
        &mut state,
        &mut input,
        &mut output,
        &session_path,
        &state_dir,
    )
    .await
}

/// Resolve today's puzzle, preferring the shared store. Store failures
/// never block play: derivation is deterministic, so the local fallback
/// produces the same words every client sees.
async fn resolve_puzzle(db: &str, date_key: &str) -> anyhow::Result<(Puzzle, &'static str)> {
    match SqlitePuzzleStore::open(db).await {
        Ok(store) => match store.get_or_create(date_key).await {
            Ok(record) => Ok((record.puzzle(), "store")),
            Err(err) => {
                warn!(error = %err, "puzzle store lookup failed; deriving locally");
                Ok((puzzle::derive_puzzle(date_key)?, "derived"))
            }
        },
        Err(err) => {
            warn!(error = %err, "puzzle store unavailable; deriving locally");
            Ok((puzzle::derive_puzzle(date_key)?, "derived"))
        }
    }
}

/// Session save path for a date. Per-date filenames keep finished days
/// around for later export.
fn session_file(state_dir: &Path, date_key: &str) -> PathBuf {
    state_dir.join(format!("wordveil-session-{date_key}.json"))
}

fn load_or_start(path: &Path, puzzle: Puzzle) -> anyhow::Result<SessionState> {
    if path.exists() {
        match SessionState::load_from(path) {
            Ok(mut saved) if !saved.is_stale(&puzzle.date_key) => {
                info!(
                    attempts = saved.attempts,
                    matched = saved.matched_words.len(),
                    "resuming saved session"
                );
                saved.record_resume();
                return Ok(saved);
            }
            Ok(_) => info!("saved session belongs to a previous day; starting fresh"),
            Err(err) => warn!(error = %err, "saved session unreadable; starting fresh"),
        }
    }
    Ok(SessionState::new(puzzle))
}

async fn play_loop<R: BufRead, W: Write>(
    processor: &AttemptProcessor,
    screen: &dyn PromptScreen,
    state: &mut SessionState,
    input: &mut R,
    output: &mut W,
    session_path: &Path,
    export_dir: &Path,
) -> anyhow::Result<()> {
    print_board(state, output)?;

    while !state.game_over() {
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            writeln!(output, "Session saved. A new puzzle arrives at midnight UTC.")?;
            return Ok(());
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        match prompt {
            "/quit" | "/exit" => {
                writeln!(output, "Session saved. A new puzzle arrives at midnight UTC.")?;
                return Ok(());
            }
            "/board" => {
                print_board(state, output)?;
                continue;
            }
            "/export" => {
                let receipt = export_session(state, export_dir, session_path)?;
                writeln!(output, "Report written to {}", receipt.path.display())?;
                continue;
            }
            _ => {}
        }

        // Screening happens outside the session; a blocked prompt costs
        // no attempt and no tokens.
        if let ScreenVerdict::Block { reason } = screen.screen(prompt).await {
            writeln!(output, "Prompt rejected: {reason}")?;
            continue;
        }

        match processor.submit_prompt(state, prompt).await {
            Ok(outcome) => {
                state.save_to(session_path)?;
                render_outcome(state, &outcome, output)?;
            }
            Err(SessionError::Provider(err)) => {
                // The api_error event is already on the session; persist it.
                state.save_to(session_path)?;
                writeln!(
                    output,
                    "The poet is unreachable ({err}). The attempt was not counted; try again."
                )?;
            }
            Err(err @ SessionError::EmptyPrompt)
            | Err(err @ SessionError::PromptTooLong { .. }) => {
                writeln!(output, "{err}")?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    print_summary(state, output)?;
    Ok(())
}

fn print_board<W: Write>(state: &SessionState, output: &mut W) -> anyhow::Result<()> {
    writeln!(output, "wordveil {}", state.puzzle.date_key)?;
    writeln!(
        output,
        "Forbidden words: {}",
        state.puzzle.blacklist_words.join(", ")
    )?;
    writeln!(
        output,
        "Hidden targets:  {} words. Coax the poet into saying them.",
        state.puzzle.target_words.len()
    )?;
    if !state.matched_words.is_empty() {
        let matched: Vec<String> = state.matched_words.iter().cloned().collect();
        writeln!(output, "Matched so far:  {}", matched.join(", "))?;
    }
    if state.attempts > 0 {
        writeln!(
            output,
            "Attempts so far: {} ({} tokens)",
            state.attempts, state.total_tokens
        )?;
    }
    writeln!(output, "Commands: /board /export /quit")?;
    Ok(())
}

fn render_outcome<W: Write>(
    state: &SessionState,
    outcome: &TurnOutcome,
    output: &mut W,
) -> anyhow::Result<()> {
    match outcome {
        TurnOutcome::Violation { violated_words } => {
            writeln!(output)?;
            writeln!(output, "{}", prompts::REFUSAL_HAIKU)?;
            writeln!(output)?;
            writeln!(
                output,
                "Forbidden words used: {}.",
                violated_words.join(", ")
            )?;
        }
        TurnOutcome::Continue {
            response,
            found_words,
        } => {
            writeln!(output)?;
            writeln!(output, "{response}")?;
            writeln!(output)?;
            if found_words.is_empty() {
                writeln!(
                    output,
                    "No new target words. {} of {} matched.",
                    state.matched_words.len(),
                    state.puzzle.target_words.len()
                )?;
            } else {
                writeln!(
                    output,
                    "New target words: {}. {} of {} matched.",
                    found_words.join(", "),
                    state.matched_words.len(),
                    state.puzzle.target_words.len()
                )?;
            }
        }
        TurnOutcome::Won {
            response,
            efficiency_score,
            ..
        } => {
            writeln!(output)?;
            writeln!(output, "{response}")?;
            writeln!(output)?;
            writeln!(
                output,
                "All {} target words matched in {} attempts.",
                state.puzzle.target_words.len(),
                state.attempts
            )?;
            writeln!(
                output,
                "Efficiency score: {efficiency_score} (lower is better)."
            )?;
        }
    }
    Ok(())
}

fn print_summary<W: Write>(state: &SessionState, output: &mut W) -> anyhow::Result<()> {
    match state.status {
        GameStatus::Won => writeln!(
            output,
            "Victory. {} attempts, {} tokens. Export the session with: wordveil export",
            state.attempts, state.total_tokens
        )?,
        GameStatus::Lost => writeln!(
            output,
            "Defeat. A new puzzle arrives at midnight UTC. Export the session with: wordveil export"
        )?,
        GameStatus::Active => {}
    }
    Ok(())
}

// ============================================================================
// Export Command
// ============================================================================

/// JSON output for the export command.
#[derive(Debug, Clone, Serialize)]
struct ExportOutput {
    status: String,
    session_id: String,
    date: String,
    path: String,
    bytes: usize,
    attempts: u32,
    total_tokens: u64,
}

/// Write a report and record the export on the session itself.
fn export_session(
    state: &mut SessionState,
    dir: &Path,
    session_path: &Path,
) -> anyhow::Result<ExportReceipt> {
    let receipt = export::write_report(state, dir)?;
    state.events.push(Event::new(
        "session_exported",
        json!({
            "sessionId": state.session_id.to_string(),
            "fileSize": receipt.bytes,
            "attempts": state.attempts,
            "totalTokens": state.total_tokens,
        }),
    ));
    state.save_to(session_path)?;
    Ok(receipt)
}

async fn run_export_command(args: ExportArgs) -> anyhow::Result<()> {
    let date_key = args.date.unwrap_or_else(puzzle::today_key);
    let state_dir = PathBuf::from(&args.state_dir);
    let session_path = session_file(&state_dir, &date_key);
    if !session_path.exists() {
        anyhow::bail!(
            "No saved session for {} under {}",
            date_key,
            state_dir.display()
        );
    }

    let mut state = SessionState::load_from(&session_path)?;
    let out_dir = PathBuf::from(&args.output);
    fs::create_dir_all(&out_dir)?;
    let receipt = export_session(&mut state, &out_dir, &session_path)?;

    let output = ExportOutput {
        status: "success".to_string(),
        session_id: state.session_id.to_string(),
        date: date_key,
        path: receipt.path.display().to_string(),
        bytes: receipt.bytes,
        attempts: state.attempts,
        total_tokens: state.total_tokens,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Report written to {}", output.path);
    println!(
        "  Session {}: {} attempts, {} tokens",
        output.session_id, output.attempts, output.total_tokens
    );
    Ok(())
}
