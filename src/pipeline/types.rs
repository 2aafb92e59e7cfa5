//! Values passed between pipeline stages.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::db::{ResultSet, Row, SchemaDescription, Value};
use crate::error::{AskError, Result};

/// Tables and columns judged relevant to a question.
///
/// Advisory only: it narrows the prompt for SQL generation but never restricts what the
/// generated statement may touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaContext {
    pub tables: BTreeSet<String>,
    pub columns: BTreeMap<String, Vec<String>>,
}

impl SchemaContext {
    /// Every table of the schema, no column narrowing.
    pub fn fallback(schema: &SchemaDescription) -> Self {
        Self {
            tables: schema.table_names().into_iter().collect(),
            columns: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Comma-separated table names, e.g. `customers, sales`.
    pub fn tables_display(&self) -> String {
        self.tables.iter().cloned().collect::<Vec<_>>().join(", ")
    }

    /// One `table: col, col` entry per narrowed table, or `None` without narrowing.
    pub fn columns_display(&self) -> Option<String> {
        let entries = self
            .columns
            .iter()
            .filter(|(_, cols)| !cols.is_empty())
            .map(|(table, cols)| format!("{table}: {}", cols.join(", ")))
            .collect::<Vec<_>>();

        (!entries.is_empty()).then(|| entries.join("; "))
    }
}

/// A validated single read-only statement plus its positional parameters.
///
/// Only the query builder constructs these, after validation; fields are read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    text: String,
    parameters: BTreeMap<String, Value>,
}

impl Query {
    pub(crate) fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Attaches a positional parameter. `key` is `"1"` or `"$1"` for `$1`.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    /// Returns the parameters ordered as `$1..$n`.
    ///
    /// Fails when a key is not a placeholder number or the numbers are not `1..=n`.
    pub fn positional_parameters(&self) -> Result<Vec<Value>> {
        let mut indexed = Vec::with_capacity(self.parameters.len());
        for (key, value) in &self.parameters {
            let index = key
                .trim_start_matches('$')
                .parse::<usize>()
                .map_err(|_| AskError::execution(format!("Invalid parameter name '{key}'")))?;
            indexed.push((index, value.clone()));
        }
        indexed.sort_by_key(|(index, _)| *index);

        for (expected, (index, _)) in (1..).zip(&indexed) {
            if *index != expected {
                return Err(AskError::execution(format!(
                    "Parameters must be numbered $1..${}; found ${index}",
                    indexed.len()
                )));
            }
        }

        Ok(indexed.into_iter().map(|(_, value)| value).collect())
    }
}

/// Everything produced on the way to an answer.
///
/// On failure, `schema`, `sql` and `parameters` keep what was produced before the failing
/// stage; `columns` and `rows` are always empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Intermediate {
    pub schema: SchemaContext,
    pub sql: String,
    pub parameters: BTreeMap<String, Value>,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub error: Option<String>,
}

impl Intermediate {
    pub(crate) fn record_query(&mut self, query: &Query) {
        self.sql = query.text().to_string();
        self.parameters = query.parameters().clone();
    }

    pub(crate) fn record_result(&mut self, result: ResultSet) {
        self.columns = result.columns;
        self.rows = result.rows;
    }

    pub(crate) fn record_error(&mut self, error: &AskError) {
        self.columns.clear();
        self.rows.clear();
        self.error = Some(error.to_string());
    }
}

/// Response to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerEnvelope {
    pub question: String,
    pub answer: String,
    pub intermediate: Intermediate,
}

impl AnswerEnvelope {
    pub fn is_error(&self) -> bool {
        self.intermediate.error.is_some()
    }
}
