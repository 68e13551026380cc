//! Generative-text integration for wordveil.
//!
//! The game talks to its haiku collaborator through the [`HaikuProvider`]
//! trait; [`GeminiClient`] is the production implementation. Keeping the
//! trait at the seam lets the session engine and the proxy run against
//! scripted collaborators in tests.
//!
//! ```ignore
//! use wordveil::llm::{GeminiClient, HaikuProvider, HaikuRequest};
//!
//! let client = GeminiClient::from_env()?;
//! let reply = client
//!     .generate_haiku(HaikuRequest {
//!         system_instruction: instruction,
//!         user_prompt: "what wakes before the birds".to_string(),
//!     })
//!     .await?;
//! println!("{} ({} tokens)", reply.text, reply.usage.total_tokens);
//! ```

pub mod gemini;

pub use gemini::{GeminiClient, HaikuProvider, HaikuReply, HaikuRequest, Usage, DEFAULT_API_URL};
