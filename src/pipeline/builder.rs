//! SQL generation and surface validation.
//!
//! The model is asked for one `SELECT`; whatever comes back is checked here before it can
//! reach the database. These are surface checks only: the text is never parsed.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::SchemaDescription;
use crate::error::{AskError, Result};
use crate::llm::{prompt, strip_code_fences, LlmClient};
use crate::pipeline::types::{Query, SchemaContext};

/// Generates a validated query for a question.
pub struct QueryBuilder {
    llm: Arc<dyn LlmClient>,
    schema: Arc<SchemaDescription>,
}

impl QueryBuilder {
    pub fn new(llm: Arc<dyn LlmClient>, schema: Arc<SchemaDescription>) -> Self {
        Self { llm, schema }
    }

    /// Asks the model for SQL and validates it. Failures are never retried.
    pub async fn build(&self, question: &str, context: &SchemaContext) -> Result<Query> {
        let columns = context.columns_display();
        let request = prompt::sql_generation(
            &self.schema,
            question,
            &context.tables_display(),
            columns.as_deref(),
        );

        let reply = self.llm.complete_prompt(&request).await.map_err(|e| {
            AskError::query_generation(format!("completion failed: {e}"), String::new())
        })?;

        let sql = validate_generated_sql(&reply)?;
        debug!(sql = %sql, "Generated SQL");
        Ok(Query::new(sql))
    }
}

/// Reduces raw model output to a single `SELECT` statement.
///
/// Steps: strip fences and whitespace, drop one trailing `;`, require a leading `SELECT`
/// keyword, then cut at the first remaining `;`.
///
/// The cut ignores quoting. A `;` inside a literal truncates the query, which the database
/// then rejects, but no text after a separator can ever reach it.
pub fn validate_generated_sql(raw: &str) -> Result<String> {
    let text = strip_code_fences(raw);
    let text = text.strip_suffix(';').unwrap_or(&text).trim();

    if !starts_with_select(text) {
        return Err(AskError::query_generation(
            "only SELECT statements are allowed",
            text,
        ));
    }

    match text.split_once(';') {
        Some((first, rest)) => {
            warn!(
                dropped = %rest.trim(),
                "Generated SQL contained a statement separator; keeping the text before it"
            );
            Ok(first.trim().to_string())
        }
        None => Ok(text.to_string()),
    }
}

/// True if `text` starts with the keyword `SELECT` in any case.
fn starts_with_select(text: &str) -> bool {
    const KEYWORD: &str = "select";

    let Some(head) = text.get(..KEYWORD.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(KEYWORD) {
        return false;
    }

    text[KEYWORD.len()..]
        .chars()
        .next()
        .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
}
