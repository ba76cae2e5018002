//! Prompt templates for LLM interactions

use crate::extract::Chunk;

/// Prompt asking for a one-paragraph summary of a declaration
pub struct SummaryPrompt;

impl SummaryPrompt {
    /// Characters of source included before truncation
    pub const MAX_SOURCE_CHARS: usize = 4000;

    pub fn generate(chunk: &Chunk) -> String {
        let mut prompt = String::new();

        prompt.push_str(SUMMARY_SYSTEM_PROMPT);
        prompt.push('\n');

        prompt.push_str("## Declaration\n\n");
        if let Some(ref name) = chunk.name {
            prompt.push_str(&format!("**Name:** `{}`\n", name));
        }
        if let Some(ref parent) = chunk.parent_name {
            prompt.push_str(&format!("**Member of:** `{}`\n", parent));
        }
        prompt.push_str(&format!("**Kind:** {}\n", chunk.base_kind()));
        prompt.push_str(&format!(
            "**Lines:** {}-{}\n",
            chunk.start_line, chunk.end_line
        ));

        let source = chunk.source();
        let truncated: String = source.chars().take(Self::MAX_SOURCE_CHARS).collect();
        prompt.push_str(&format!(
            "\n**Code:**\n```{}\n{}\n```\n",
            chunk.language, truncated
        ));
        if truncated.len() < source.len() {
            prompt.push_str("(truncated)\n");
        }
        prompt.push('\n');

        prompt.push_str(SUMMARY_INSTRUCTIONS);

        prompt
    }
}

const SUMMARY_SYSTEM_PROMPT: &str = r#"You are documenting a codebase for engineers who navigate it by search.
Describe what the declaration below does, not how it is written."#;

const SUMMARY_INSTRUCTIONS: &str = r#"## Instructions

Respond with a JSON object containing:
- summary: one or two sentences describing the declaration's purpose
- confidence: your confidence in the summary (0.0 to 1.0)

Respond ONLY with valid JSON, no other text.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            token_count: 10,
            start_line: 3,
            end_line: 5,
            start_byte: 0,
            end_byte: content.len(),
            language: "python".to_string(),
            node_type: "function_definition".to_string(),
            name: Some("load".to_string()),
            parent_name: Some("Store".to_string()),
            is_import: false,
            is_function: true,
            is_class: false,
            is_exported: Some(true),
            context_len: 0,
        }
    }

    #[test]
    fn test_summary_prompt() {
        let prompt = SummaryPrompt::generate(&chunk("def load(self):\n    pass\n"));
        assert!(prompt.contains("`load`"));
        assert!(prompt.contains("`Store`"));
        assert!(prompt.contains("```python"));
        assert!(prompt.contains("JSON"));
        assert!(!prompt.contains("(truncated)"));
    }

    #[test]
    fn test_long_source_truncated() {
        let body = "x".repeat(SummaryPrompt::MAX_SOURCE_CHARS + 10);
        let prompt = SummaryPrompt::generate(&chunk(&body));
        assert!(prompt.contains("(truncated)"));
    }
}
