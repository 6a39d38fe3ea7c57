//! inflight - run SQL statements concurrently and watch them until they finish.

use std::sync::Arc;

use futures::StreamExt;
use inflight::cli::Cli;
use inflight::config::{Config, ConnectionConfig};
use inflight::db::MockConnector;
use inflight::error::{InflightError, Result};
use inflight::query::QueryStatus;
use inflight::tracker::{SubmitRequest, Tracker};
use inflight::{logging, output};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    match cli.log_path() {
        Some(path) => logging::init_file_logging(&path),
        None => logging::init_stderr_logging(),
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{} ({})", e, e.category());
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

/// Submits every statement and prints snapshots until all of them are
/// terminal. Returns false if any query ended in error.
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_overrides(&mut config.tracker)?;

    let format = cli.parse_output_format().map_err(InflightError::config)?;

    let connection = resolve_connection(&cli, &config)?.ok_or_else(|| {
        InflightError::config("No database connection configured. Use --help for usage information.")
    })?;
    let target = connection.to_connection_string()?;
    info!("Connection: {}", connection.display_string());

    let tracker = if cli.mock_db {
        Tracker::new(Arc::new(MockConnector::new()), &config.tracker)
    } else {
        Tracker::with_sqlx(&config.tracker)
    };

    for sql in &cli.sql {
        tracker.submit(SubmitRequest::new(sql, &target))?;
    }

    let mut snapshots = Box::pin(tracker.subscribe());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                warn!("Interrupted; canceling running queries");
                tracker.shutdown();
            }
            set = snapshots.next() => {
                let Some(set) = set else { break };
                println!("{}", output::render(&set, format)?);
                if set.all_terminal() {
                    return Ok(set.count(QueryStatus::Error) == 0);
                }
            }
        }
    }

    Ok(true)
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    // Start with CLI connection config if provided
    let mut connection = cli.to_connection_config()?;

    // If no CLI connection, try named connection from config
    if connection.is_none() {
        if let Some(name) = cli.connection_name() {
            connection = config.get_connection(Some(name)).cloned();
            if connection.is_none() {
                return Err(InflightError::config(format!(
                    "Connection '{}' not found in config file",
                    name
                )));
            }
        }
    }

    // If still no connection, try default from config
    if connection.is_none() {
        connection = config.get_connection(None).cloned();
    }

    // Apply environment variable defaults
    if let Some(ref mut conn) = connection {
        conn.apply_env_defaults();
    }

    Ok(connection)
}
