//! End-to-end pipeline tests against mock collaborators.

use std::sync::Arc;

use db_ask::config::{FailurePolicy, PipelineConfig};
use db_ask::db::{MockDatabaseClient, ResultSet, Row, SchemaDescription, Value};
use db_ask::llm::prompt::{NO_RESULTS_SYSTEM_PROMPT, RESULT_SUMMARY_SYSTEM_PROMPT};
use db_ask::llm::{Message, MockLlmClient};
use db_ask::pipeline::SchemaContext;
use db_ask::Pipeline;
use pretty_assertions::assert_eq;

const FRANCE_SQL: &str = "SELECT COUNT(*) FROM customers WHERE country='France'";

fn build(
    config: &PipelineConfig,
    llm: &Arc<MockLlmClient>,
    db: &Arc<MockDatabaseClient>,
) -> Pipeline {
    Pipeline::new(
        config,
        Arc::new(SchemaDescription::builtin()),
        llm.clone(),
        db.clone(),
    )
}

fn count_result(count: i64) -> ResultSet {
    ResultSet::with_data(
        vec!["count".to_string()],
        vec![Row::new().with("count", count)],
    )
}

/// The last message list sent to the model.
fn last_call(llm: &MockLlmClient) -> Vec<Message> {
    llm.calls().pop().unwrap_or_default()
}

#[tokio::test]
async fn test_fallback_context_then_successful_answer() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_failure("schema reasoning", "selection service unavailable")
            .with_response("sql generator", FRANCE_SQL)
            .with_response("data analyst", "There are 12 customers in France."),
    );
    let db = Arc::new(MockDatabaseClient::with_result(count_result(12)));

    let envelope = build(&PipelineConfig::default(), &llm, &db)
        .ask("How many customers are in France?")
        .await;

    assert_eq!(envelope.intermediate.error, None);
    assert_eq!(envelope.answer, "There are 12 customers in France.");
    assert_eq!(envelope.intermediate.sql, FRANCE_SQL);
    assert_eq!(
        envelope.intermediate.schema,
        SchemaContext::fallback(&SchemaDescription::builtin())
    );
    assert_eq!(envelope.intermediate.rows, vec![Row::new().with("count", 12_i64)]);

    // The generator saw every table because selection degraded
    let generation = &llm.calls()[1];
    assert!(generation[1]
        .content
        .contains("Relevant tables: customers, employees, projects, sales"));
    assert!(!generation[1].content.contains("Relevant columns"));

    assert_eq!(db.calls()[0].sql, FRANCE_SQL);
    assert!(db.calls()[0].params.is_empty());
}

#[tokio::test]
async fn test_generation_failure_produces_apology() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("schema reasoning", r#"{"tables": ["customers"]}"#)
            .with_failure("sql generator", "model overloaded"),
    );
    let db = Arc::new(MockDatabaseClient::new());

    let envelope = build(&PipelineConfig::default(), &llm, &db)
        .ask("How many customers are in France?")
        .await;

    let error = envelope.intermediate.error.clone().unwrap();
    assert!(error.contains("model overloaded"));
    assert_eq!(
        envelope.answer,
        format!("Sorry, I encountered an error: {error}")
    );
    assert_eq!(envelope.intermediate.sql, "");
    assert!(envelope.intermediate.rows.is_empty());
    assert_eq!(db.call_count(), 0);
}

#[tokio::test]
async fn test_store_permission_error_keeps_selected_schema() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response(
                "schema reasoning",
                r#"{"tables": ["customers"], "columns": {"customers": ["country"]}}"#,
            )
            .with_response("sql generator", FRANCE_SQL),
    );
    let db = Arc::new(MockDatabaseClient::failing(
        "ERROR: permission denied for table customers",
    ));

    let envelope = build(&PipelineConfig::default(), &llm, &db)
        .ask("How many customers are in France?")
        .await;

    let error = envelope.intermediate.error.as_deref().unwrap();
    assert!(error.contains("permission denied for table customers"));
    assert!(envelope.intermediate.rows.is_empty());
    assert!(envelope.intermediate.columns.is_empty());
    assert_eq!(envelope.intermediate.sql, FRANCE_SQL);

    let mut expected = SchemaContext::default();
    expected.tables.insert("customers".to_string());
    expected
        .columns
        .insert("customers".to_string(), vec!["country".to_string()]);
    assert_eq!(envelope.intermediate.schema, expected);

    // Synthesis never ran
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_non_select_never_reaches_store() {
    let llm = Arc::new(MockLlmClient::new().with_response("sql generator", "DELETE FROM customers"));
    let db = Arc::new(MockDatabaseClient::new());

    let envelope = build(&PipelineConfig::default(), &llm, &db)
        .ask("Delete every customer")
        .await;

    assert!(envelope
        .intermediate
        .error
        .as_deref()
        .unwrap()
        .starts_with("SQL generation failed"));
    assert_eq!(db.call_count(), 0);
}

#[tokio::test]
async fn test_trailing_statement_is_dropped_before_execution() {
    let llm = Arc::new(
        MockLlmClient::new().with_response("sql generator", "```sql\nSELECT 1; DROP TABLE x\n```"),
    );
    let db = Arc::new(MockDatabaseClient::with_result(ResultSet::with_data(
        vec!["?column?".to_string()],
        vec![Row::new().with("?column?", 1_i64)],
    )));

    let envelope = build(&PipelineConfig::default(), &llm, &db).ask("One?").await;

    assert_eq!(envelope.intermediate.sql, "SELECT 1");
    assert_eq!(db.calls()[0].sql, "SELECT 1");
}

#[tokio::test]
async fn test_empty_result_uses_no_results_template() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("sql generator", "SELECT * FROM sales WHERE amount > 1000000")
            .with_response("no results were returned", "No sales that large."),
    );
    let db = Arc::new(MockDatabaseClient::empty(vec![
        "sale_id".to_string(),
        "amount".to_string(),
    ]));

    let envelope = build(&PipelineConfig::default(), &llm, &db)
        .ask("Sales over a million?")
        .await;

    assert_eq!(envelope.answer, "No sales that large.");
    assert_eq!(envelope.intermediate.error, None);
    assert!(envelope.intermediate.rows.is_empty());
    assert_eq!(envelope.intermediate.columns, vec!["sale_id", "amount"]);
    assert_eq!(last_call(&llm)[0].content, NO_RESULTS_SYSTEM_PROMPT);
}

#[tokio::test]
async fn test_large_result_prompt_is_capped() {
    let rows = (0..75)
        .map(|i| Row::new().with("sale_id", i as i64))
        .collect::<Vec<_>>();
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("sql generator", "SELECT sale_id FROM sales")
            .with_response("data analyst", "75 sales."),
    );
    let db = Arc::new(MockDatabaseClient::with_result(ResultSet::with_data(
        vec!["sale_id".to_string()],
        rows,
    )));

    let envelope = build(&PipelineConfig::default(), &llm, &db).ask("All sales").await;

    // The envelope keeps every row; only the prompt is capped
    assert_eq!(envelope.intermediate.rows.len(), 75);

    let summary = last_call(&llm);
    assert_eq!(summary[0].content, RESULT_SUMMARY_SYSTEM_PROMPT);
    assert!(summary[1].content.contains("75 total rows"));
    assert!(summary[1]
        .content
        .contains("Note: Showing first 50 of 75 total rows."));
    assert_eq!(summary[1].content.matches("\"sale_id\"").count(), 50);
}

#[tokio::test]
async fn test_synthesis_failure_falls_back_to_count() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("sql generator", FRANCE_SQL)
            .with_failure("data analyst", "quota exceeded"),
    );
    let db = Arc::new(MockDatabaseClient::with_result(count_result(12)));

    let envelope = build(&PipelineConfig::default(), &llm, &db)
        .ask("How many customers are in France?")
        .await;

    assert_eq!(envelope.answer, "Found 1 result: {\"count\":12}");
    assert_eq!(envelope.intermediate.error, None);
}

#[tokio::test]
async fn test_synthesis_abort_policy_reports_error() {
    let config = PipelineConfig {
        synthesis: FailurePolicy::Abort,
        ..Default::default()
    };
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("sql generator", FRANCE_SQL)
            .with_failure("data analyst", "quota exceeded"),
    );
    let db = Arc::new(MockDatabaseClient::with_result(count_result(12)));

    let envelope = build(&config, &llm, &db).ask("How many?").await;

    assert_eq!(envelope.intermediate.error.as_deref(), Some("LLM error: quota exceeded"));
    assert_eq!(envelope.intermediate.sql, FRANCE_SQL);
    assert!(envelope.intermediate.rows.is_empty());
}

#[tokio::test]
async fn test_every_request_gets_an_answer() {
    let cases: Vec<(MockLlmClient, MockDatabaseClient)> = vec![
        (MockLlmClient::new(), MockDatabaseClient::new()),
        (MockLlmClient::failing("down"), MockDatabaseClient::new()),
        (
            MockLlmClient::new().with_response("sql generator", "SELECT"),
            MockDatabaseClient::failing("syntax error at end of input"),
        ),
        (
            MockLlmClient::new().with_response("schema reasoning", "[1, 2, 3]"),
            MockDatabaseClient::empty(vec![]),
        ),
    ];

    for (llm, db) in cases {
        let llm = Arc::new(llm);
        let db = Arc::new(db);
        for question in ["", "How many customers?", "'; DROP TABLE sales; --"] {
            let envelope = build(&PipelineConfig::default(), &llm, &db).ask(question).await;
            assert!(!envelope.answer.is_empty());
            assert_eq!(envelope.question, question);
            if envelope.intermediate.error.is_some() {
                assert!(envelope.intermediate.rows.is_empty());
            }
        }
    }
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("sql generator", FRANCE_SQL)
            .with_response("data analyst", "Twelve."),
    );
    let db = Arc::new(MockDatabaseClient::with_result(count_result(12)));
    let pipeline = Arc::new(build(&PipelineConfig::default(), &llm, &db));

    let handles = (0..8)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.ask(&format!("question {i}")).await })
        })
        .collect::<Vec<_>>();

    for (i, handle) in handles.into_iter().enumerate() {
        let envelope = handle.await.unwrap();
        assert_eq!(envelope.question, format!("question {i}"));
        assert_eq!(envelope.answer, "Twelve.");
    }
    assert_eq!(db.call_count(), 8);
}

#[tokio::test]
async fn test_envelope_json_shape() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("schema reasoning", r#"{"tables": ["customers"]}"#)
            .with_response("sql generator", FRANCE_SQL)
            .with_response("data analyst", "Twelve."),
    );
    let db = Arc::new(MockDatabaseClient::with_result(count_result(12)));

    let envelope = build(&PipelineConfig::default(), &llm, &db)
        .ask("How many customers are in France?")
        .await;
    let json = serde_json::to_value(&envelope).unwrap();

    assert_eq!(
        json,
        serde_json::json!({
            "question": "How many customers are in France?",
            "answer": "Twelve.",
            "intermediate": {
                "schema": {"tables": ["customers"], "columns": {}},
                "sql": FRANCE_SQL,
                "parameters": {},
                "columns": ["count"],
                "rows": [{"count": 12}],
                "error": null
            }
        })
    );
    assert_eq!(envelope.intermediate.rows[0].get("count"), Some(&Value::Int(12)));
}
