//! wordveil: Daily word gauntlet played through a haiku-only AI poet.
//!
//! This library derives deterministic daily puzzles, runs game sessions
//! against a generative haiku collaborator and exports structured
//! session reports.

// Core modules
pub mod cli;
pub mod error;
pub mod export;
pub mod llm;
pub mod prompts;
pub mod proxy;
pub mod puzzle;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod words;

// Re-export commonly used error types
pub use error::{ExportError, LlmError, ProxyError, PuzzleError, SessionError, StoreError};
