//! Answer synthesis from result rows.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::FailurePolicy;
use crate::db::Row;
use crate::error::{AskError, Result};
use crate::llm::{prompt, LlmClient};

/// Most rows serialized into a summary prompt.
pub const MAX_PREVIEW_ROWS: usize = 50;

/// Turns a question, its SQL and the returned rows into a plain-language answer.
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
    policy: FailurePolicy,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, policy: FailurePolicy) -> Self {
        Self { llm, policy }
    }

    /// Writes the answer. Under [`FailurePolicy::Degrade`] a failed completion yields
    /// [`fallback_answer`] instead of an error.
    pub async fn synthesize(&self, question: &str, rows: &[Row], sql: &str) -> Result<String> {
        match self.try_synthesize(question, rows, sql).await {
            Ok(answer) => Ok(answer),
            Err(e) if self.policy.degrades() => {
                warn!(stage = "synthesis", error = %e, "Using fallback answer");
                Ok(fallback_answer(rows))
            }
            Err(e) => Err(e),
        }
    }

    async fn try_synthesize(&self, question: &str, rows: &[Row], sql: &str) -> Result<String> {
        let request = if rows.is_empty() {
            prompt::no_results(question, sql)
        } else {
            let shown = rows.len().min(MAX_PREVIEW_ROWS);
            let rows_json = serde_json::to_string_pretty(&rows[..shown])
                .map_err(|e| AskError::internal(format!("Failed to serialize rows: {e}")))?;
            prompt::result_summary(question, sql, &rows_json, shown, rows.len())
        };

        debug!(template = %request.template, rows = rows.len(), "Synthesizing answer");
        let answer = self.llm.complete_prompt(&request).await?;
        Ok(answer.trim().to_string())
    }
}

/// Deterministic answer used when the model cannot be reached.
pub fn fallback_answer(rows: &[Row]) -> String {
    match rows {
        [row] => format!("Found 1 result: {row}"),
        _ => format!("Found {} results for your question.", rows.len()),
    }
}
