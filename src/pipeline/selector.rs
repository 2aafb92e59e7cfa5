//! Schema selection: which tables and columns matter for a question.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::FailurePolicy;
use crate::db::SchemaDescription;
use crate::error::{AskError, Result};
use crate::llm::{prompt, strip_code_fences, LlmClient};
use crate::pipeline::types::SchemaContext;

/// The reply shape requested from the model. Missing keys default to empty.
#[derive(Debug, Default, Deserialize)]
struct SelectionReply {
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    columns: BTreeMap<String, Vec<String>>,
}

/// Asks the model for the schema subset relevant to a question.
pub struct SchemaSelector {
    llm: Arc<dyn LlmClient>,
    schema: Arc<SchemaDescription>,
    policy: FailurePolicy,
}

impl SchemaSelector {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        schema: Arc<SchemaDescription>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            llm,
            schema,
            policy,
        }
    }

    /// Selects the relevant context.
    ///
    /// Under [`FailurePolicy::Degrade`] this never fails: any problem yields the fallback
    /// context of every table.
    pub async fn select(&self, question: &str) -> Result<SchemaContext> {
        match self.try_select(question).await {
            Ok(context) => {
                debug!(tables = %context.tables_display(), "Schema selected");
                Ok(context)
            }
            Err(e) if self.policy.degrades() => {
                warn!(stage = "schema_selection", error = %e, "Falling back to all tables");
                Ok(SchemaContext::fallback(&self.schema))
            }
            Err(e) => Err(e),
        }
    }

    async fn try_select(&self, question: &str) -> Result<SchemaContext> {
        let request = prompt::schema_selection(&self.schema, question);
        let reply = self.llm.complete_prompt(&request).await?;
        let parsed = parse_reply(&reply)?;

        let context = normalize(&self.schema, parsed);
        if context.is_empty() {
            return Err(AskError::llm(
                "Schema selection named no tables from the schema",
            ));
        }
        Ok(context)
    }
}

fn parse_reply(reply: &str) -> Result<SelectionReply> {
    serde_json::from_str(&strip_code_fences(reply))
        .map_err(|e| AskError::llm(format!("Schema selection reply is not valid JSON: {e}")))
}

/// Keeps only names the schema knows, in their canonical spelling.
///
/// Tables that appear only as keys of `columns` are added to the table set.
fn normalize(schema: &SchemaDescription, reply: SelectionReply) -> SchemaContext {
    let mut context = SchemaContext::default();

    for name in &reply.tables {
        match schema.table(name) {
            Some(table) => {
                context.tables.insert(table.name.clone());
            }
            None => debug!(table = %name, "Ignoring unknown table from schema selection"),
        }
    }

    for (name, columns) in &reply.columns {
        let Some(table) = schema.table(name) else {
            debug!(table = %name, "Ignoring columns of unknown table");
            continue;
        };
        context.tables.insert(table.name.clone());

        let mut kept: Vec<String> = Vec::new();
        for column in columns {
            if let Some(known) = table.column(column) {
                if !kept.contains(&known.name) {
                    kept.push(known.name.clone());
                }
            }
        }
        if !kept.is_empty() {
            context
                .columns
                .entry(table.name.clone())
                .or_default()
                .extend(kept);
        }
    }

    context
}
