//! db-ask - Natural-language questions over a PostgreSQL schema.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use cli::{Cli, OutputFormat};
use db_ask::config::Config;
use db_ask::db::{DatabaseClient, MockDatabaseClient, PostgresClient, SchemaDescription};
use db_ask::error::{AskError, Result};
use db_ask::llm::create_client;
use db_ask::{logging, AnswerEnvelope, Pipeline};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => {
            if let Err(e) = logging::init_file_logging(path) {
                eprintln!("{}: {}", e.category(), e);
                return ExitCode::FAILURE;
            }
        }
        None => logging::init_stderr_logging(),
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.parse_output_format().map_err(AskError::config)?;
    let config = resolve_config(&cli)?;

    let schema = match &config.pipeline.schema_file {
        Some(path) => SchemaDescription::load_from_file(path)?,
        None => SchemaDescription::builtin(),
    };

    if cli.show_schema {
        println!("{}", schema.format_for_llm());
        return Ok(());
    }

    let question = cli
        .question
        .as_deref()
        .ok_or_else(|| AskError::config("A question is required"))?;

    config.validate(!cli.mock_db)?;

    let llm = create_client(&config.llm)?;
    let db: Arc<dyn DatabaseClient> = if cli.mock_db {
        info!("Using mock database");
        Arc::new(MockDatabaseClient::new())
    } else {
        info!(connection = %config.database.display_string(), "Using PostgreSQL");
        Arc::new(PostgresClient::new(&config.database)?)
    };
    info!(provider = %config.llm.provider()?, model = %config.llm.model()?, "Using LLM");

    let pipeline = Pipeline::new(&config.pipeline, Arc::new(schema), llm, db);
    let envelope = pipeline.ask(question).await;

    print_envelope(&envelope, format)
}

/// Builds the configuration with precedence: CLI arguments, config file, environment.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    if let Some(connection) = cli.to_connection_config()? {
        config.database.merge(&connection);
    }
    cli.apply_llm_overrides(&mut config.llm);
    config.apply_env_defaults();

    Ok(config)
}

fn print_envelope(envelope: &AnswerEnvelope, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(envelope)
                .map_err(|e| AskError::internal(format!("Failed to serialize answer: {e}")))?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("{}", envelope.answer);
            if !envelope.intermediate.sql.is_empty() {
                println!("\nSQL: {}", envelope.intermediate.sql);
            }
            if let Some(error) = &envelope.intermediate.error {
                println!("Error: {error}");
            }
        }
    }
    Ok(())
}
