//! PostgreSQL store backed by sqlx.
//!
//! Every execution opens its own connection and closes it before returning; nothing is
//! pooled or held across requests.

use crate::config::ConnectionConfig;
use crate::db::{DatabaseClient, ResultSet, Row, Value};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgArguments, PgConnection, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Timeout for establishing a connection.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// PostgreSQL database client.
#[derive(Debug, Clone)]
pub struct PostgresClient {
    conn_str: String,
    display: String,
    query_timeout: Duration,
    read_only: bool,
}

impl PostgresClient {
    /// Creates a client for the given connection settings. No connection is opened yet.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self {
            conn_str: config.to_connection_string()?,
            display: config.display_string(),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            read_only: config.read_only,
        })
    }

    /// Opens a fresh connection.
    async fn open(&self) -> Result<PgConnection> {
        debug!(target_db = %self.display, "Opening connection");

        tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            PgConnection::connect(&self.conn_str),
        )
        .await
        .map_err(|_| {
            AskError::connection(format!(
                "Connection to {} timed out after {CONNECT_TIMEOUT_SECS} seconds",
                self.display
            ))
        })?
        .map_err(|e| map_connection_error(e, &self.display))
    }

    /// Runs one statement on an open connection inside a transaction that is always
    /// rolled back.
    async fn run(&self, conn: &mut PgConnection, sql: &str, params: &[Value]) -> Result<ResultSet> {
        let mut tx = conn
            .begin()
            .await
            .map_err(|e| AskError::execution(format_query_error(e)))?;

        if self.read_only {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(|e| AskError::execution(format_query_error(e)))?;
        }

        let statement = (&mut *tx)
            .prepare(sql)
            .await
            .map_err(|e| AskError::execution(format_query_error(e)))?;

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let query = params
            .iter()
            .fold(statement.query(), |query, value| bind_value(query, value));

        let rows = query
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| AskError::execution(format_query_error(e)))?;

        // Dropping `tx` would roll back too; doing it explicitly surfaces errors in the log.
        if let Err(e) = tx.rollback().await {
            warn!("Rollback after read failed: {e}");
        }

        Ok(ResultSet::with_data(
            columns,
            rows.iter().map(convert_row).collect(),
        ))
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        let start = Instant::now();
        let mut conn = self.open().await?;

        let result = tokio::time::timeout(self.query_timeout, self.run(&mut conn, sql, params))
            .await
            .unwrap_or_else(|_| {
                Err(AskError::execution(format!(
                    "Query timed out after {} seconds",
                    self.query_timeout.as_secs()
                )))
            });

        // A connection abandoned mid-query is dropped instead of closed gracefully.
        if result.is_ok() {
            if let Err(e) = conn.close().await {
                warn!("Failed to close connection cleanly: {e}");
            }
        }

        debug!(
            duration_ms = start.elapsed().as_millis(),
            ok = result.is_ok(),
            "Statement finished"
        );

        result
    }
}

/// Binds one parameter value to a prepared query.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let value = convert_value(row, i, col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

/// Decodes a nullable column as `T` and maps it into a `Value`.
fn decode<'r, T>(row: &'r PgRow, index: usize, map: impl FnOnce(T) -> Value) -> Value
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .ok()
        .flatten()
        .map(map)
        .unwrap_or(Value::Null)
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index, Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index, |v| Value::Int(v as i64)),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index, |v| Value::Int(v as i64)),
        "INT8" | "BIGINT" => decode::<i64>(row, index, Value::Int),
        "FLOAT4" | "REAL" => decode::<f32>(row, index, |v| Value::Float(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index, Value::Float),
        "NUMERIC" => decode::<Decimal>(row, index, |v| Value::String(v.to_string())),
        "DATE" => decode::<NaiveDate>(row, index, |v| Value::String(v.to_string())),
        "TIME" => decode::<NaiveTime>(row, index, |v| Value::String(v.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index, |v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index, |v| Value::String(v.to_rfc3339())),
        "INTERVAL" => decode::<PgInterval>(row, index, |v| Value::String(format_interval(&v))),
        "UUID" => decode::<Uuid>(row, index, |v| Value::String(v.to_string())),
        "JSON" | "JSONB" => {
            decode::<serde_json::Value>(row, index, |v| Value::String(v.to_string()))
        }
        "BYTEA" => decode::<Vec<u8>>(row, index, Value::Bytes),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
            decode::<String>(row, index, Value::String)
        }
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => {
            decode::<Vec<Option<String>>>(row, index, array_value)
        }
        "INT2[]" => decode::<Vec<Option<i16>>>(row, index, array_value),
        "INT4[]" => decode::<Vec<Option<i32>>>(row, index, array_value),
        "INT8[]" => decode::<Vec<Option<i64>>>(row, index, array_value),
        _ => decode_as_text(row, index, type_name),
    }
}

/// Renders an array as a JSON list string.
fn array_value<T: serde::Serialize>(items: Vec<T>) -> Value {
    Value::String(serde_json::json!(items).to_string())
}

/// Decodes a column of a type without a native mapping from its raw bytes.
///
/// Enums, domains over text and similar types come through as UTF-8. Anything else becomes
/// a `<TYPE>` placeholder so a value is never silently reported as NULL.
fn decode_as_text(row: &PgRow, index: usize, type_name: &str) -> Value {
    match row.try_get_unchecked::<Option<String>, _>(index) {
        Ok(Some(text)) => Value::String(text),
        Ok(None) => Value::Null,
        Err(e) => {
            warn!(column = index, type_name, "Cannot decode column value: {e}");
            Value::String(format!("<{type_name}>"))
        }
    }
}

/// Renders an interval the way PostgreSQL prints it by default, e.g. `1 year 2 mons 3 days
/// 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(count: i64, name: &str) -> String {
        if count.abs() == 1 {
            format!("{count} {name}")
        } else {
            format!("{count} {name}s")
        }
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day"));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let seconds = micros / 1_000_000;
        let fraction = micros % 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, display: &str) -> AskError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        AskError::connection(format!(
            "Cannot connect to {display}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        AskError::connection(format!(
            "Authentication failed for {display}. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        AskError::connection(format!("Database for {display} does not exist."))
    } else {
        AskError::connection(error.to_string())
    }
}

/// Formats a query error with PostgreSQL detail and hint when available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
