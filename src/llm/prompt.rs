//! Request templates for the pipeline stages.
//!
//! Each pipeline stage renders its request here. The system text of every template is a
//! fixed constant so tests can tell which template reached the model.

use std::fmt;

use crate::db::SchemaDescription;
use crate::llm::types::Message;

/// Identifies which template produced a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTemplate {
    /// Schema selection: pick relevant tables and columns.
    SchemaSelection,
    /// SQL generation for a question.
    SqlGeneration,
    /// Answer for a query that returned no rows.
    NoResults,
    /// Answer summarizing returned rows.
    ResultSummary,
}

impl PromptTemplate {
    /// Returns the template name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaSelection => "schema_selection",
            Self::SqlGeneration => "sql_generation",
            Self::NoResults => "no_results",
            Self::ResultSummary => "result_summary",
        }
    }

    /// Returns the fixed system instructions of this template.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::SchemaSelection => SCHEMA_SELECTION_SYSTEM_PROMPT,
            Self::SqlGeneration => SQL_GENERATION_SYSTEM_PROMPT,
            Self::NoResults => NO_RESULTS_SYSTEM_PROMPT,
            Self::ResultSummary => RESULT_SUMMARY_SYSTEM_PROMPT,
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered request: system instructions plus user content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub template: PromptTemplate,
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Creates a prompt from its parts.
    pub fn new(
        template: PromptTemplate,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            template,
            system: system.into(),
            user: user.into(),
        }
    }

    /// Creates a prompt using the template's own system instructions.
    pub fn from_template(template: PromptTemplate, user: impl Into<String>) -> Self {
        Self::new(template, template.system_prompt(), user)
    }

    /// Returns the system + user message pair.
    pub fn messages(&self) -> Vec<Message> {
        vec![
            Message::system(self.system.as_str()),
            Message::user(self.user.as_str()),
        ]
    }
}

pub const SCHEMA_SELECTION_SYSTEM_PROMPT: &str = "You are a schema reasoning agent. \
Given a database schema and a natural language question, select the relevant tables and \
columns needed to answer the question. Return a concise JSON object with keys: tables (list \
of table names), columns (object mapping table name to a list of column names). \
Example: {\"tables\": [\"customers\", \"sales\"], \"columns\": {\"customers\": \
[\"customer_id\", \"country\"], \"sales\": [\"amount\", \"sale_date\"]}}";

pub const SQL_GENERATION_SYSTEM_PROMPT: &str = r#"You are a PostgreSQL SQL generator. Given a question and the database schema, generate a single safe SELECT query.

RULES:
- Emit exactly one statement.
- Use only SELECT (no INSERT/UPDATE/DELETE/DDL).
- Use table and column names exactly as they appear in the schema.
- Use proper JOINs along the listed relationships when accessing related tables.
- If aggregation is needed, use GROUP BY.

TIME PHRASES (use CURRENT_DATE and DATE_TRUNC, half-open ranges):
- "last year": col >= DATE_TRUNC('year', CURRENT_DATE - INTERVAL '1 year') AND col < DATE_TRUNC('year', CURRENT_DATE)
- "this year": col >= DATE_TRUNC('year', CURRENT_DATE)
- "last month": col >= DATE_TRUNC('month', CURRENT_DATE - INTERVAL '1 month') AND col < DATE_TRUNC('month', CURRENT_DATE)
- "this month": col >= DATE_TRUNC('month', CURRENT_DATE)
- "Q1 2023" (and other quarters): col >= DATE '2023-01-01' AND col < DATE '2023-04-01'

OUTPUT FORMAT:
Return ONLY the SQL query. No explanation, no markdown, no backticks."#;

pub const NO_RESULTS_SYSTEM_PROMPT: &str = "You are a data analyst. \
Given a natural language question and an executed SQL query that returned no results, \
write a clear, helpful message explaining that no matching records were found. \
Suggest how the user might rephrase their question or what they might be looking for.";

pub const RESULT_SUMMARY_SYSTEM_PROMPT: &str = "You are a data analyst. \
Given a natural language question, an executed SQL query, and its result rows, \
write a clear, concise answer in plain English. \
Summarize the key findings and present the data in a user-friendly way. \
If there are many rows, provide a summary and mention the total count.";

/// Renders the schema selection request.
pub fn schema_selection(schema: &SchemaDescription, question: &str) -> Prompt {
    Prompt::from_template(
        PromptTemplate::SchemaSelection,
        format!(
            "Schema:\n{}\n\nQuestion:\n{}\n\nReturn ONLY valid JSON, no additional text.",
            schema.format_for_llm(),
            question
        ),
    )
}

/// Renders the SQL generation request.
///
/// `tables` and `columns` are the advisory context from schema selection, already
/// formatted for display.
pub fn sql_generation(
    schema: &SchemaDescription,
    question: &str,
    tables: &str,
    columns: Option<&str>,
) -> Prompt {
    let mut context = format!("Relevant tables: {tables}\n");
    if let Some(columns) = columns {
        context.push_str(&format!("Relevant columns: {columns}\n"));
    }

    Prompt::from_template(
        PromptTemplate::SqlGeneration,
        format!(
            "Schema:\n{}\n\n{}\nQuestion: {}\n\nGenerate the SQL query:",
            schema.format_for_llm(),
            context,
            question
        ),
    )
}

/// Renders the request for a query that returned nothing.
pub fn no_results(question: &str, sql: &str) -> Prompt {
    Prompt::from_template(
        PromptTemplate::NoResults,
        format!("Question: {question}\n\nSQL: {sql}\n\nNo results were returned."),
    )
}

/// Renders the request summarizing result rows.
///
/// `rows_json` holds at most `shown` rows; when `total > shown` the prompt says so.
pub fn result_summary(
    question: &str,
    sql: &str,
    rows_json: &str,
    shown: usize,
    total: usize,
) -> Prompt {
    let mut user = format!(
        "Question: {question}\n\nSQL Query: {sql}\n\n\
         Result rows (JSON format, {total} total rows):\n{rows_json}"
    );
    if total > shown {
        user.push_str(&format!(
            "\n\nNote: Showing first {shown} of {total} total rows."
        ));
    }
    Prompt::from_template(PromptTemplate::ResultSummary, user)
}
