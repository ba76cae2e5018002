//! Summaries for declarations
//!
//! The scanner asks a [`Summarizer`] for a short description of each
//! function, class and interface it writes. [`LlmSummarizer`] is the
//! LLM-backed implementation.

mod client;
mod prompts;

pub use client::{LlmClient, LlmResponse};
pub use prompts::SummaryPrompt;

use crate::extract::Chunk;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Summary of one declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    /// Confidence in the summary (0.0 - 1.0)
    pub confidence: f32,
    /// Which generator produced the summary
    pub generated_by: String,
    /// Whether a richer summary should be requested later
    pub needs_ai_summary: bool,
}

/// Produces summaries for declaration chunks
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, chunk: &Chunk) -> Result<SummaryResult>;
}

/// Shape of the JSON the prompt asks for
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Summarizer backed by an [`LlmClient`]
pub struct LlmSummarizer {
    client: LlmClient,
}

impl LlmSummarizer {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, chunk: &Chunk) -> Result<SummaryResult> {
        let prompt = SummaryPrompt::generate(chunk);
        let response = self.client.complete_with_retry(&prompt).await?;

        Ok(parse_summary(&response.content, self.client.model()))
    }
}

/// Read the model's reply, falling back to its raw text when it is not JSON
fn parse_summary(content: &str, model: &str) -> SummaryResult {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<SummaryResponse>(trimmed) {
        Ok(parsed) => SummaryResult {
            summary: parsed.summary.trim().to_string(),
            confidence: parsed.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            generated_by: model.to_string(),
            needs_ai_summary: false,
        },
        Err(e) => {
            tracing::debug!("Summary response was not JSON: {}", e);
            SummaryResult {
                summary: trimmed.lines().next().unwrap_or_default().to_string(),
                confidence: 0.3,
                generated_by: model.to_string(),
                needs_ai_summary: true,
            }
        }
    }
}
