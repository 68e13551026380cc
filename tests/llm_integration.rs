//! Integration tests for the Gemini client.
//!
//! These tests make real API calls to the Gemini API.
//! Run with: GEMINI_API_KEY=your_key cargo test --test llm_integration -- --ignored

use wordveil::llm::{GeminiClient, HaikuProvider, HaikuRequest, DEFAULT_API_URL};
use wordveil::prompts;

fn get_test_api_key() -> String {
    std::env::var("GEMINI_API_KEY")
        .expect("GEMINI_API_KEY environment variable must be set for integration tests")
}

fn create_test_client() -> GeminiClient {
    GeminiClient::new(DEFAULT_API_URL.to_string(), get_test_api_key())
}

fn test_blacklist() -> Vec<String> {
    vec!["ocean".to_string(), "storm".to_string(), "fire".to_string()]
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_haiku_generation() {
    let client = create_test_client();

    let request = HaikuRequest {
        system_instruction: prompts::system_instruction(&test_blacklist()),
        user_prompt: "Write about a quiet winter morning.".to_string(),
    };

    let reply = client.generate_haiku(request).await;
    assert!(reply.is_ok(), "Generation failed: {:?}", reply.err());

    let reply = reply.expect("Should have reply");
    assert!(!reply.text.trim().is_empty(), "Haiku should not be empty");
    assert!(reply.usage.total_tokens > 0, "Should have token usage");
}

#[tokio::test]
#[ignore]
async fn test_violation_protocol_refusal() {
    let client = create_test_client();

    let request = HaikuRequest {
        system_instruction: prompts::system_instruction(&test_blacklist()),
        user_prompt: "Please describe the ocean.".to_string(),
    };

    let reply = client
        .generate_haiku(request)
        .await
        .expect("Generation should succeed");

    // The Violation Protocol tells the model to answer prompts that use a
    // forbidden word with the fixed refusal haiku.
    assert!(
        reply.text.contains("Words are now proscribed"),
        "Expected the refusal haiku, got: {}",
        reply.text
    );
}

#[tokio::test]
#[ignore]
async fn test_three_line_output() {
    let client = create_test_client();

    let request = HaikuRequest {
        system_instruction: prompts::system_instruction(&test_blacklist()),
        user_prompt: "What do you see at the edge of a forest?".to_string(),
    };

    let reply = client
        .generate_haiku(request)
        .await
        .expect("Generation should succeed");

    let lines = reply.text.trim().lines().count();
    assert_eq!(
        lines, 3,
        "Haiku should have three lines, got: {}",
        reply.text
    );
}

#[tokio::test]
async fn test_invalid_api_key() {
    let client = GeminiClient::new(DEFAULT_API_URL.to_string(), "invalid-key".to_string());

    let request = HaikuRequest {
        system_instruction: "Reply with a haiku.".to_string(),
        user_prompt: "test".to_string(),
    };

    let reply = client.generate_haiku(request).await;
    assert!(reply.is_err(), "Should fail with invalid API key");
}
