//! clientplus-import CLI - migrate the legacy FFNT.sqlite tables.

use clap::{Parser, Subcommand};
use clientplus_import::error::EXIT_TABLE_FAILURES;
use clientplus_import::{Config, DestinationType, MigrateError, MigrationDriver};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// Configuration file picked up from the working directory when `--config`
/// is not given.
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser)]
#[command(name = "clientplus-import")]
#[command(about = "Migrate legacy ClientPlus tables into the application database")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file [default: config.yaml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate every configured table
    Run {
        /// Override the legacy store path
        #[arg(long)]
        legacy_db: Option<PathBuf>,

        /// Override rows per bulk insert
        #[arg(long)]
        batch_size: Option<usize>,

        /// Dry run: migrate into memory without touching the destination
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the ordered table jobs without migrating
    Plan,

    /// Validate row counts between legacy store and destination
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            legacy_db,
            batch_size,
            dry_run,
        } => {
            // Apply overrides
            if let Some(path) = legacy_db {
                config.legacy.path = path;
            }
            if let Some(n) = batch_size {
                config.migration.batch_size = n;
            }
            if dry_run {
                config.destination.r#type = DestinationType::Memory;
            }
            config.validate()?;

            let driver = MigrationDriver::new(config).with_progress(cli.progress);
            let report = driver.run().await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                let status_msg = if dry_run {
                    "Dry run completed!"
                } else {
                    "Migration completed!"
                };
                println!("\n{}", status_msg);
                println!("  Run ID: {}", report.run_id);
                println!("  Duration: {:.2}s", report.duration_seconds);
                for table in &report.tables {
                    match &table.error {
                        None => println!(
                            "  OK     {} -> {}: {} rows",
                            table.table, table.collection, table.rows_written
                        ),
                        Some(failure) => println!(
                            "  FAILED {} -> {}: {}",
                            table.table, table.collection, failure.message
                        ),
                    }
                }
                println!("  {}", report.summary());
            }

            if !report.success {
                return Ok(ExitCode::from(EXIT_TABLE_FAILURES));
            }
        }

        Commands::Plan => {
            let driver = MigrationDriver::new(config);
            let jobs = driver.plan()?;

            if cli.output_json {
                let plan: Vec<_> = jobs
                    .iter()
                    .map(|job| {
                        serde_json::json!({
                            "source": job.source_table,
                            "entity": job.entity.name(),
                            "collection": job.entity.collection(),
                            "field_mapping": job.field_mapping,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                let config = driver.config();
                println!("Legacy store: {}", config.legacy.path.display());
                println!("Destination: {}", config.destination.describe());
                println!("Batch size: {}", config.migration.batch_size);
                println!("Tables:");
                for (i, job) in jobs.iter().enumerate() {
                    println!(
                        "  {}. {} -> {} ({})",
                        i + 1,
                        job.source_table,
                        job.entity.name(),
                        job.entity.collection()
                    );
                    for (column, field) in job.field_mapping.iter() {
                        println!("       {} => {}", column, field);
                    }
                }
            }
        }

        Commands::Validate => {
            let driver = MigrationDriver::new(config);
            let results = driver.validate().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for r in &results {
                    println!(
                        "  {} {} -> {}: source={} destination={}",
                        if r.matches { "OK      " } else { "MISMATCH" },
                        r.table,
                        r.collection,
                        r.source_rows,
                        r.destination_rows
                    );
                }
            }

            if results.iter().any(|r| !r.matches) {
                return Ok(ExitCode::from(EXIT_TABLE_FAILURES));
            }
            println!("Validation completed successfully");
        }

        Commands::HealthCheck => {
            let driver = MigrationDriver::new(config);
            let result = driver.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Legacy store ({}): {}",
                    result.legacy_path.display(),
                    if result.legacy_ok { "OK" } else { "FAILED" }
                );
                if let Some(ref err) = result.legacy_error {
                    println!("    Error: {}", err);
                }
                for table in &result.missing_tables {
                    println!("    Missing table: {}", table);
                }
                println!(
                    "  Destination ({}): {}",
                    result.destination,
                    if result.destination_ok { "OK" } else { "FAILED" }
                );
                if let Some(ref err) = result.destination_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy() { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy() {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Load the given file, `config.yaml` from the working directory, or the
/// built-in defaults, in that order.
fn load_config(path: Option<&Path>) -> Result<Config, MigrateError> {
    match path {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            let config = Config::load(DEFAULT_CONFIG_FILE)?;
            info!("Loaded configuration from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            info!("No configuration file, using defaults");
            Ok(Config::default())
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays clean for --output-json.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format: {}", other)),
    }

    Ok(())
}
