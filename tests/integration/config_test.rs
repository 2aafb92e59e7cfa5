//! Configuration-driven setup tests.
//!
//! Builds a pipeline the way the binary does: config file, schema file, client factory.

use std::io::Write;
use std::sync::Arc;

use db_ask::config::{Config, FailurePolicy};
use db_ask::db::{MockDatabaseClient, SchemaDescription};
use db_ask::llm::{create_client, LlmProvider};
use db_ask::{AskError, Pipeline};
use tempfile::NamedTempFile;

const SCHEMA_TOML: &str = r#"
dialect = "PostgreSQL"

[[tables]]
name = "invoices"
columns = [
    { name = "invoice_id", data_type = "SERIAL PRIMARY KEY", description = "Invoice identifier" },
    { name = "total", data_type = "NUMERIC(12,2)", description = "Invoice total" },
    { name = "client_id", data_type = "INT" },
]

[[tables]]
name = "clients"
columns = [
    { name = "client_id", data_type = "SERIAL PRIMARY KEY" },
    { name = "name", data_type = "TEXT" },
]

[[relationships]]
from_table = "invoices"
from_column = "client_id"
to_table = "clients"
to_column = "client_id"
"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_file_with_all_sections() {
    let schema_file = write_temp(SCHEMA_TOML);
    let config_file = write_temp(&format!(
        r#"
[llm]
provider = "mock"

[database]
host = "db.internal"
database = "ragdb"
read_only = false

[pipeline]
schema_selection = "abort"
request_timeout_secs = 90
schema_file = "{}"
"#,
        schema_file.path().display()
    ));

    let config = Config::load_from_file(config_file.path()).unwrap();

    assert_eq!(config.llm.provider().unwrap(), LlmProvider::Mock);
    assert_eq!(config.database.port, 5432);
    assert!(!config.database.read_only);
    assert_eq!(config.pipeline.schema_selection, FailurePolicy::Abort);
    assert_eq!(config.pipeline.synthesis, FailurePolicy::Degrade);
    assert_eq!(config.pipeline.request_timeout_secs, Some(90));
    assert!(config.validate(true).is_ok());

    let schema_path = config.pipeline.schema_file.as_deref().unwrap();
    let schema = SchemaDescription::load_from_file(schema_path).unwrap();
    assert_eq!(schema.table_names(), vec!["invoices", "clients"]);
}

#[test]
fn test_schema_file_with_dangling_relationship_is_rejected() {
    let file = write_temp(
        r#"
[[tables]]
name = "invoices"
columns = [{ name = "id", data_type = "INT" }]

[[relationships]]
from_table = "invoices"
from_column = "client_id"
to_table = "clients"
to_column = "client_id"
"#,
    );

    let err = SchemaDescription::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, AskError::Config(_)));
    assert!(err.to_string().contains("unknown table 'clients'"));
}

#[tokio::test]
async fn test_mock_provider_answers_over_builtin_schema() {
    let mut config = Config::default();
    config.llm.provider = Some("mock".to_string());
    let llm = create_client(&config.llm).unwrap();
    let db = Arc::new(MockDatabaseClient::new());

    let pipeline = Pipeline::new(
        &config.pipeline,
        Arc::new(SchemaDescription::builtin()),
        llm,
        db.clone(),
    );
    let envelope = pipeline.ask("How many customers do we have?").await;

    assert_eq!(envelope.intermediate.error, None);
    assert_eq!(envelope.intermediate.schema.tables_display(), "customers");
    assert_eq!(
        envelope.intermediate.sql,
        "SELECT COUNT(customer_id) AS customer_count FROM customers"
    );
    assert_eq!(envelope.answer, "This answer comes from the mock model.");
    assert_eq!(db.call_count(), 1);
}

#[tokio::test]
async fn test_mock_provider_pipeline_over_custom_schema() {
    let schema_file = write_temp(SCHEMA_TOML);
    let schema = SchemaDescription::load_from_file(schema_file.path()).unwrap();

    let mut config = Config::default();
    config.llm.provider = Some("mock".to_string());
    let llm = create_client(&config.llm).unwrap();
    let db = Arc::new(MockDatabaseClient::new());

    let pipeline = Pipeline::new(&config.pipeline, Arc::new(schema), llm, db.clone());
    let envelope = pipeline.ask("Total invoiced per client?").await;

    // The canned selection names a table this schema lacks, so every table is used
    assert_eq!(envelope.intermediate.schema.tables_display(), "clients, invoices");
    assert_eq!(envelope.intermediate.error, None);
    assert_eq!(db.call_count(), 1);
    assert!(pipeline.schema().format_for_llm().contains("Table: invoices"));
}
