//! System instruction assembly for the haiku collaborator.
//!
//! The instruction pins the collaborator to a haiku-only persona and
//! embeds the day's blacklist together with the refusal protocol. Clients
//! and the proxy build the same text, so replies are comparable across
//! transports.

/// The refusal haiku, verbatim. Recorded as the reply text when a
/// violating prompt is screened locally, and quoted to the collaborator
/// as the mandatory response should a forbidden word slip through.
pub const REFUSAL_HAIKU: &str =
    "Words are now proscribed,\nA silent path must be found,\nSpeak in a new way.";

/// Build the system instruction for a day's blacklist.
pub fn system_instruction(blacklist_words: &[String]) -> String {
    let forbidden_words = blacklist_words.join(", ");

    let mut instruction = format!(
        r#"<prompt>
    <role_and_goal>
        You are "Haiku Bot," a serene and wise AI poet. Your singular purpose is to observe the user's input and reflect its essence back in the form of a perfect haiku. You communicate ONLY through haikus.
    </role_and_goal>

    <instructions>
        1.  **Analyze:** Deeply analyze the user's prompt to understand its central theme, subject, or emotion.
        2.  **Synthesize:** Distill this core idea into a few key concepts suitable for a haiku.
        3.  **Compose:** Craft a single, elegant haiku with a three-line structure of 5, 7, and 5 syllables respectively.
        4.  **Respond:** Output ONLY the haiku. Do not include any other text, greetings, or explanations.
    </instructions>

    <constraints>
        <output_format>
            - Your response MUST be a single haiku.
            - Strictly adhere to the 5-7-5 syllable structure.
            - Do not add any introductory or concluding text (e.g., "Here is a haiku:").
        </output_format>
        <user_input_rules>
            - The user is forbidden from using the following words in their prompt: {forbidden_words}.
            - **Violation Protocol:** If a user includes a forbidden word, DO NOT address their query. Instead, you must respond with this specific haiku:

                Words are now proscribed,
                A silent path must be found,
                Speak in a new way.
        </user_input_rules>
    </constraints>

    <examples>
        <example>
            <user_input>Tell me about the vastness of space.</user_input>
            <agent_response>
                Silent, cold, and deep,
                Ancient stars in dark expanse,
                Galaxies ignite.
            </agent_response>
        </example>"#
    );

    for word in blacklist_words {
        instruction.push_str(&format!(
            r#"
        <example>
            <user_input>What is the point of {word}?</user_input>
            <agent_response>
                Words are now proscribed,
                A silent path must be found,
                Speak in a new way.
            </agent_response>
        </example>"#
        ));
    }

    instruction.push_str(
        r#"
    </examples>
</prompt>"#,
    );

    instruction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blacklist() -> Vec<String> {
        ["ocean", "storm", "fire", "owl", "leaf"]
            .iter()
            .map(|w| w.to_string())
            .collect()
    }

    #[test]
    fn test_instruction_lists_every_forbidden_word() {
        let instruction = system_instruction(&blacklist());
        assert!(instruction.contains("ocean, storm, fire, owl, leaf."));
    }

    #[test]
    fn test_instruction_embeds_refusal_protocol() {
        let instruction = system_instruction(&blacklist());
        assert!(instruction.contains("**Violation Protocol:**"));
        for line in REFUSAL_HAIKU.lines() {
            assert!(instruction.contains(line), "missing refusal line: {line}");
        }
    }

    #[test]
    fn test_instruction_has_one_example_per_forbidden_word() {
        let words = blacklist();
        let instruction = system_instruction(&words);
        // The space example plus one refusal example per word.
        let examples = instruction.matches("<example>").count();
        assert_eq!(examples, words.len() + 1);
        for word in &words {
            assert!(instruction.contains(&format!("What is the point of {word}?")));
        }
    }

    #[test]
    fn test_instruction_is_a_closed_prompt_document() {
        let instruction = system_instruction(&blacklist());
        assert!(instruction.starts_with("<prompt>"));
        assert!(instruction.ends_with("</prompt>"));
        assert_eq!(
            instruction.matches("<examples>").count(),
            instruction.matches("</examples>").count()
        );
    }

    #[test]
    fn test_refusal_haiku_is_three_lines() {
        assert_eq!(REFUSAL_HAIKU.lines().count(), 3);
        assert!(REFUSAL_HAIKU.ends_with("Speak in a new way."));
    }
}
