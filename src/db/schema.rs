//! Static schema description for db-ask.
//!
//! The schema is never introspected at runtime. It is described once (built in, or loaded
//! from a TOML file) and rendered verbatim into LLM prompts, so it must be updated in
//! lockstep with the real database.

use crate::error::{AskError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Human-curated description of the database tables and their relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescription {
    /// SQL dialect named in prompts.
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// All tables, in presentation order.
    #[serde(default)]
    pub tables: Vec<Table>,

    /// Foreign key relationships between tables.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

fn default_dialect() -> String {
    "PostgreSQL".to_string()
}

/// A described table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// A described column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub description: String,
}

impl Column {
    /// Creates a new column description.
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: description.into(),
        }
    }
}

/// A single-column foreign key, `from_table.from_column -> to_table.to_column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl Relationship {
    /// Creates a new relationship.
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }
}

impl Table {
    /// Finds a column by name, ignoring ASCII case.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl Default for SchemaDescription {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaDescription {
    /// Returns the built-in sales schema: customers, projects, employees and sales.
    pub fn builtin() -> Self {
        let table = |name: &str, columns: Vec<Column>| Table {
            name: name.to_string(),
            columns,
        };

        Self {
            dialect: default_dialect(),
            tables: vec![
                table(
                    "customers",
                    vec![
                        Column::new("customer_id", "SERIAL PRIMARY KEY", "Unique customer identifier"),
                        Column::new("first_name", "VARCHAR(60)", "Customer's first name"),
                        Column::new("last_name", "VARCHAR(60)", "Customer's last name"),
                        Column::new("email", "VARCHAR(150) UNIQUE", "Customer's email address"),
                        Column::new("city", "VARCHAR(100)", "Customer's city"),
                        Column::new("country", "VARCHAR(100)", "Customer's country"),
                        Column::new("created_at", "TIMESTAMP", "Customer registration timestamp"),
                    ],
                ),
                table(
                    "projects",
                    vec![
                        Column::new("project_id", "SERIAL PRIMARY KEY", "Unique project identifier"),
                        Column::new("project_name", "VARCHAR(150)", "Name of the project"),
                        Column::new("start_date", "DATE", "Project start date"),
                        Column::new("end_date", "DATE", "Project end date"),
                        Column::new("status", "VARCHAR(50)", "Project status"),
                    ],
                ),
                table(
                    "employees",
                    vec![
                        Column::new("employee_id", "SERIAL PRIMARY KEY", "Unique employee identifier"),
                        Column::new("first_name", "VARCHAR(60)", "Employee's first name"),
                        Column::new("last_name", "VARCHAR(60)", "Employee's last name"),
                        Column::new("email", "VARCHAR(150) UNIQUE", "Employee's email address"),
                        Column::new("hire_date", "DATE", "Employee hire date"),
                        Column::new("department", "VARCHAR(100)", "Employee department"),
                        Column::new("project_id", "INT", "Foreign key referencing projects(project_id)"),
                    ],
                ),
                table(
                    "sales",
                    vec![
                        Column::new("sale_id", "SERIAL PRIMARY KEY", "Unique sale identifier"),
                        Column::new("customer_id", "INT", "Foreign key referencing customers(customer_id)"),
                        Column::new("employee_id", "INT", "Foreign key referencing employees(employee_id)"),
                        Column::new("project_id", "INT", "Foreign key referencing projects(project_id)"),
                        Column::new("amount", "NUMERIC(12,2)", "Sale amount"),
                        Column::new("sale_date", "DATE", "Date of the sale"),
                        Column::new("channel", "VARCHAR(50)", "Sales channel"),
                        Column::new("notes", "TEXT", "Additional notes"),
                    ],
                ),
            ],
            relationships: vec![
                Relationship::new("sales", "customer_id", "customers", "customer_id"),
                Relationship::new("sales", "employee_id", "employees", "employee_id"),
                Relationship::new("sales", "project_id", "projects", "project_id"),
                Relationship::new("employees", "project_id", "projects", "project_id"),
            ],
        }
    }

    /// Loads a schema description from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AskError::config(format!(
                "Failed to read schema file {}: {e}",
                path.display()
            ))
        })?;

        let schema: Self = toml::from_str(&content).map_err(|e| {
            AskError::config(format!(
                "Schema description error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        schema.validate()?;
        Ok(schema)
    }

    /// Checks that the description names at least one table and that relationships
    /// only reference described tables.
    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(AskError::config("Schema description contains no tables"));
        }

        for rel in &self.relationships {
            for table in [&rel.from_table, &rel.to_table] {
                if self.table(table).is_none() {
                    return Err(AskError::config(format!(
                        "Relationship {}.{} -> {}.{} references unknown table '{}'",
                        rel.from_table, rel.from_column, rel.to_table, rel.to_column, table
                    )));
                }
            }
        }

        Ok(())
    }

    /// Finds a table by name, ignoring ASCII case.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Returns all table names in presentation order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Formats the schema for inclusion in an LLM prompt.
    pub fn format_for_llm(&self) -> String {
        let tables_text = self
            .tables
            .iter()
            .map(Self::format_table_for_llm)
            .collect::<Vec<_>>()
            .join("\n");

        let relationships_text = if self.relationships.is_empty() {
            String::new()
        } else {
            let lines = self
                .relationships
                .iter()
                .map(|rel| {
                    format!(
                        "- {}.{} -> {}.{}\n",
                        rel.from_table, rel.from_column, rel.to_table, rel.to_column
                    )
                })
                .collect::<String>();
            format!("\nRelationships:\n{lines}")
        };

        format!(
            "{} Database Schema:\n\n{}{}",
            self.dialect, tables_text, relationships_text
        )
    }

    fn format_table_for_llm(table: &Table) -> String {
        let column_lines = table
            .columns
            .iter()
            .map(|column| {
                if column.description.is_empty() {
                    format!("- {} ({})\n", column.name, column.data_type)
                } else {
                    format!(
                        "- {} ({}): {}\n",
                        column.name, column.data_type, column.description
                    )
                }
            })
            .collect::<String>();

        format!("Table: {}\n{}", table.name, column_lines)
    }
}
