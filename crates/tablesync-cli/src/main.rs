//! tablesync CLI - keep MySQL tables in sync with declared record types.

mod demo;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tablesync::core::traits::{Database, SchemaBackend};
use tablesync::core::IndexDescriptor;
use tablesync::{
    Config, EntityManager, MysqlDatabase, MysqlSchemaBackend, QueryArguments, ReconcileReport,
    SyncError, SyncMode,
};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::demo::Demo;

#[derive(Parser)]
#[command(name = "tablesync")]
#[command(about = "Keep MySQL tables in sync with declared record types")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the database connection
    HealthCheck,

    /// Show the live columns and indexes of a table
    Inspect {
        /// Table name (case-insensitive)
        table: String,
    },

    /// Sync the bundled demo table and run a round of row operations
    Demo {
        /// Only report the DDL that would run
        #[arg(long)]
        plan: bool,
    },
}

#[derive(Serialize)]
struct HealthCheckResult {
    endpoint: String,
    connected: bool,
    latency_ms: u64,
    server_version: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct InspectedColumn {
    #[serde(flatten)]
    column: tablesync::ColumnDescriptor,
    indexes: Vec<IndexDescriptor>,
}

#[derive(Serialize)]
struct DemoResult {
    sync: Option<ReconcileReport>,
    inserted: Option<Demo>,
    rows: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::HealthCheck => health_check(&config, cli.output_json).await,
        Commands::Inspect { table } => inspect(&config, &table, cli.output_json).await,
        Commands::Demo { plan } => {
            let mode = if plan {
                SyncMode::Plan
            } else {
                config.sync.mode
            };
            run_demo(&config, mode, cli.output_json).await
        }
    }
}

async fn health_check(config: &Config, output_json: bool) -> Result<(), SyncError> {
    let mut result = HealthCheckResult {
        endpoint: config.database.endpoint(),
        connected: false,
        latency_ms: 0,
        server_version: None,
        error: None,
    };

    match MysqlDatabase::connect(&config.database).await {
        Ok(db) => {
            let probe = async {
                let latency = db.ping().await?;
                let version = db.server_version().await?;
                Ok::<_, SyncError>((latency, version))
            };
            match probe.await {
                Ok((latency, version)) => {
                    result.connected = true;
                    result.latency_ms = latency.as_millis() as u64;
                    result.server_version = Some(version);
                }
                Err(e) => result.error = Some(e.to_string()),
            }
            db.close().await?;
        }
        Err(e) => result.error = Some(e.to_string()),
    }

    if output_json {
        println!("{}", to_json(&result)?);
    } else {
        println!("Health Check Results:");
        println!(
            "  MySQL ({}): {} ({}ms)",
            result.endpoint,
            if result.connected { "OK" } else { "FAILED" },
            result.latency_ms
        );
        if let Some(ref version) = result.server_version {
            println!("    Server version: {}", version);
        }
        if let Some(ref err) = result.error {
            println!("    Error: {}", err);
        }
    }

    if !result.connected {
        return Err(SyncError::Config("Health check failed".to_string()));
    }
    Ok(())
}

async fn inspect(config: &Config, table: &str, output_json: bool) -> Result<(), SyncError> {
    let db: Arc<dyn Database> = Arc::new(MysqlDatabase::connect(&config.database).await?);
    let backend = MysqlSchemaBackend::new(db);

    if !backend.table_exists(table).await? {
        return Err(SyncError::inspection(table, "table does not exist"));
    }

    let mut columns = Vec::new();
    for column in backend.describe_table(table).await? {
        let indexes = backend.indexes(table, &column.name).await?;
        columns.push(InspectedColumn { column, indexes });
    }

    if output_json {
        println!("{}", to_json(&columns)?);
    } else {
        println!("Table {} ({} columns):", table, columns.len());
        for c in &columns {
            if c.indexes.is_empty() {
                println!("  {}", c.column);
            } else {
                let names: Vec<String> = c
                    .indexes
                    .iter()
                    .map(|i| {
                        if i.unique {
                            format!("{} unique", i.name)
                        } else {
                            i.name.clone()
                        }
                    })
                    .collect();
                println!("  {}  [{}]", c.column, names.join(", "));
            }
        }
    }
    Ok(())
}

async fn run_demo(config: &Config, mode: SyncMode, output_json: bool) -> Result<(), SyncError> {
    let db: Arc<dyn Database> = Arc::new(MysqlDatabase::connect(&config.database).await?);
    let demos: EntityManager<Demo> =
        EntityManager::with_mode(db, demo::registry(), mode).await?;

    let mut result = DemoResult {
        sync: demos.sync_report().cloned(),
        inserted: None,
        rows: None,
    };

    if mode != SyncMode::Plan {
        let mut record = Demo::sample();
        demos.insert(&mut record).await?;
        info!("Inserted demo row {:?}", record.id);

        record.i_value = Some(43);
        demos.save(&mut record).await?;

        let id = record.id.ok_or_else(|| SyncError::NotPersisted(demos.table().into()))?;
        let stored = demos.read(id).await?;
        let by_unique = demos
            .list_where_args(
                &QueryArguments::new().arg("uniqueStr", record.unique_str.clone()),
            )
            .await?;
        if stored.is_none() || by_unique.len() != 1 {
            return Err(SyncError::NotPersisted(demos.table().into()));
        }

        result.rows = Some(demos.count().await?);
        result.inserted = stored;
    }

    if output_json {
        println!("{}", to_json(&result)?);
        return Ok(());
    }

    if let Some(report) = &result.sync {
        print_report(report);
    }
    if let Some(inserted) = &result.inserted {
        println!("\nRound trip:");
        println!("  Inserted id: {:?}", inserted.id);
        println!("  Unique value: {:?}", inserted.unique_str);
        println!("  Rows in {}: {}", demos.table(), result.rows.unwrap_or(0));
    }
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    let heading = if report.dry_run {
        "Planned schema changes"
    } else {
        "Applied schema changes"
    };
    println!("{} for {}:", heading, report.table);
    if report.applied.is_empty() {
        println!("  (none, table is up to date)");
    }
    for applied in &report.applied {
        println!("  {};", applied.sql);
    }
    for skipped in &report.skipped {
        println!("  skipped (immutable schema): {}", skipped);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    for failure in &report.failures {
        println!(
            "  failed{}: {}",
            failure
                .column
                .as_deref()
                .map(|c| format!(" [{}]", c))
                .unwrap_or_default(),
            failure.message
        );
        if let Some(ref sql) = failure.sql {
            println!("    {}", sql);
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, SyncError> {
    serde_json::to_string_pretty(value).map_err(|e| SyncError::Config(e.to_string()))
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
