//! PostgreSQL integration tests.
//!
//! Tests value decoding and the full pipeline against a real database.

use std::sync::Arc;

use db_ask::config::{ConnectionConfig, PipelineConfig};
use db_ask::db::{DatabaseClient, PostgresClient, SchemaDescription, Value};
use db_ask::llm::MockLlmClient;
use db_ask::Pipeline;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test client.
fn get_test_client() -> Option<PostgresClient> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    PostgresClient::new(&config).ok()
}

#[tokio::test]
async fn test_decodes_common_types() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute(
            "SELECT 1::int4 AS small, 9000000000::int8 AS big, 1.5::float8 AS ratio, \
             12.50::numeric(12,2) AS amount, DATE '2024-03-01' AS sale_date, \
             TIMESTAMP '2024-03-01 10:30:00' AS created_at, true AS active, \
             NULL::text AS notes, 'Lyon'::varchar AS city",
            &[],
        )
        .await
        .unwrap();

    assert_eq!(
        result.columns,
        vec![
            "small",
            "big",
            "ratio",
            "amount",
            "sale_date",
            "created_at",
            "active",
            "notes",
            "city"
        ]
    );

    let row = &result.rows[0];
    assert_eq!(row.get("small"), Some(&Value::Int(1)));
    assert_eq!(row.get("big"), Some(&Value::Int(9_000_000_000)));
    assert_eq!(row.get("ratio"), Some(&Value::Float(1.5)));
    assert_eq!(row.get("amount"), Some(&Value::from("12.50")));
    assert_eq!(row.get("sale_date"), Some(&Value::from("2024-03-01")));
    assert_eq!(row.get("created_at"), Some(&Value::from("2024-03-01 10:30:00")));
    assert_eq!(row.get("active"), Some(&Value::Bool(true)));
    assert_eq!(row.get("notes"), Some(&Value::Null));
    assert_eq!(row.get("city"), Some(&Value::from("Lyon")));
}

#[tokio::test]
async fn test_decodes_interval_uuid_json_and_arrays() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute(
            "SELECT interval '1 day' AS i, \
             AGE(DATE '2024-03-04', DATE '2023-01-01') AS tenure, \
             'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11'::uuid AS id, \
             '{\"k\": 1}'::jsonb AS doc, \
             ARRAY['x', NULL]::text[] AS tags, \
             ARRAY[1, 2]::int4[] AS nums",
            &[],
        )
        .await
        .unwrap();

    let row = &result.rows[0];
    assert_eq!(row.get("i"), Some(&Value::from("1 day")));
    assert_eq!(row.get("tenure"), Some(&Value::from("1 year 2 mons 3 days")));
    assert_eq!(
        row.get("id"),
        Some(&Value::from("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"))
    );
    assert_eq!(row.get("doc"), Some(&Value::from(r#"{"k":1}"#)));
    assert_eq!(row.get("tags"), Some(&Value::from(r#"["x",null]"#)));
    assert_eq!(row.get("nums"), Some(&Value::from("[1,2]")));
    assert!(row.iter().all(|(_, value)| !value.is_null()));
}

#[tokio::test]
async fn test_rows_keep_store_order() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute(
            "SELECT n FROM generate_series(5, 1, -1) AS n",
            &[],
        )
        .await
        .unwrap();

    let values = result
        .rows
        .iter()
        .map(|row| row.get("n").cloned())
        .collect::<Vec<_>>();
    assert_eq!(
        values,
        (1..=5)
            .rev()
            .map(|n| Some(Value::Int(n)))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_pipeline_against_postgres() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("sql generator", "SELECT 12::int8 AS count;")
            .with_response("data analyst", "There are 12."),
    );
    let pipeline = Pipeline::new(
        &PipelineConfig::default(),
        Arc::new(SchemaDescription::builtin()),
        llm,
        Arc::new(client),
    );

    let envelope = pipeline.ask("How many?").await;

    assert_eq!(envelope.intermediate.error, None);
    assert_eq!(envelope.intermediate.sql, "SELECT 12::int8 AS count");
    assert_eq!(envelope.intermediate.columns, vec!["count"]);
    assert_eq!(
        envelope.intermediate.rows[0].get("count"),
        Some(&Value::Int(12))
    );
    assert_eq!(envelope.answer, "There are 12.");
}

#[tokio::test]
async fn test_pipeline_reports_store_errors() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let llm = Arc::new(
        MockLlmClient::new().with_response("sql generator", "SELECT * FROM no_such_table_db_ask"),
    );
    let pipeline = Pipeline::new(
        &PipelineConfig::default(),
        Arc::new(SchemaDescription::builtin()),
        llm,
        Arc::new(client),
    );

    let envelope = pipeline.ask("Anything?").await;

    let error = envelope.intermediate.error.as_deref().unwrap();
    assert!(error.starts_with("Execution error"));
    assert!(error.contains("no_such_table_db_ask"));
    assert!(envelope.intermediate.rows.is_empty());
}
