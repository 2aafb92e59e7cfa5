//! The question-answering pipeline.
//!
//! A question runs through four stages in order: schema selection, SQL generation,
//! execution and answer synthesis. [`Pipeline::ask`] is the failure boundary: it always
//! returns an [`AnswerEnvelope`], recording how far the request got.

pub mod builder;
pub mod executor;
pub mod selector;
pub mod synthesizer;
pub mod types;

pub use builder::{validate_generated_sql, QueryBuilder};
pub use executor::QueryExecutor;
pub use selector::SchemaSelector;
pub use synthesizer::{fallback_answer, AnswerSynthesizer, MAX_PREVIEW_ROWS};
pub use types::{AnswerEnvelope, Intermediate, Query, SchemaContext};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, Instrument};

use crate::config::PipelineConfig;
use crate::db::{DatabaseClient, SchemaDescription};
use crate::error::{AskError, Result};
use crate::llm::LlmClient;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SchemaSelection,
    QueryGeneration,
    Execution,
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaSelection => "schema_selection",
            Self::QueryGeneration => "query_generation",
            Self::Execution => "execution",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers natural-language questions over a fixed schema.
///
/// Holds only shared immutable state, so one instance can serve concurrent requests.
pub struct Pipeline {
    schema: Arc<SchemaDescription>,
    selector: SchemaSelector,
    builder: QueryBuilder,
    executor: QueryExecutor,
    synthesizer: AnswerSynthesizer,
    request_timeout: Option<Duration>,
}

impl Pipeline {
    /// Wires the stages around the given collaborators.
    pub fn new(
        config: &PipelineConfig,
        schema: Arc<SchemaDescription>,
        llm: Arc<dyn LlmClient>,
        db: Arc<dyn DatabaseClient>,
    ) -> Self {
        Self {
            selector: SchemaSelector::new(llm.clone(), schema.clone(), config.schema_selection),
            builder: QueryBuilder::new(llm.clone(), schema.clone()),
            executor: QueryExecutor::new(db),
            synthesizer: AnswerSynthesizer::new(llm, config.synthesis),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
            schema,
        }
    }

    /// Returns the schema description the pipeline answers over.
    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    /// Answers one question. Never fails: errors are reported inside the envelope.
    pub async fn ask(&self, question: &str) -> AnswerEnvelope {
        let start = Instant::now();
        let mut intermediate = Intermediate::default();

        let run = self
            .run(question, &mut intermediate)
            .instrument(info_span!("ask", question_len = question.len()));

        let outcome = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AskError::timeout(format!(
                    "request exceeded {}s",
                    limit.as_secs()
                ))),
            },
            None => run.await,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let answer = match outcome {
            Ok(answer) => {
                info!(elapsed_ms, rows = intermediate.rows.len(), "Question answered");
                answer
            }
            Err(e) => {
                error!(elapsed_ms, category = e.category(), error = %e, "Question failed");
                intermediate.record_error(&e);
                format!("Sorry, I encountered an error: {e}")
            }
        };

        AnswerEnvelope {
            question: question.to_string(),
            answer,
            intermediate,
        }
    }

    /// Runs the stages, filling `intermediate` as each one completes.
    async fn run(&self, question: &str, intermediate: &mut Intermediate) -> Result<String> {
        let context = self
            .selector
            .select(question)
            .instrument(info_span!("pipeline_stage", stage = %Stage::SchemaSelection))
            .await?;
        intermediate.schema = context;

        let query = self
            .builder
            .build(question, &intermediate.schema)
            .instrument(info_span!("pipeline_stage", stage = %Stage::QueryGeneration))
            .await?;
        intermediate.record_query(&query);

        let result = self
            .executor
            .execute(&query)
            .instrument(info_span!("pipeline_stage", stage = %Stage::Execution))
            .await?;
        intermediate.record_result(result);

        self.synthesizer
            .synthesize(question, &intermediate.rows, query.text())
            .instrument(info_span!("pipeline_stage", stage = %Stage::Synthesis))
            .await
    }
}
