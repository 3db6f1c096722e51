use anyhow::{bail, Context, Result};
use cinegraph::config::{self, AppConfig, ConnectionArgs};
use cinegraph::graph::Neo4jSink;
use cinegraph::pipeline::{Pipeline, PipelineOptions};
use cinegraph::source::SqlServerSource;
use cinegraph::stats::RunReport;
use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "cinegraph")]
#[command(about = "Export films, artists and credits from SQL Server into Neo4j")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    connection: ConnectionArgs,
}

async fn run_export(config: AppConfig) -> Result<RunReport> {
    let start = Instant::now();

    if let Some(driver) = &config.odbc_driver {
        debug!(%driver, "ODBC driver setting ignored by the native SQL Server client");
    }

    println!("==> Connecting to Neo4j at {} ...", config.neo4j.uri);
    let sink = Neo4jSink::connect(&config.neo4j).await?;
    println!("    Connected.");

    println!(
        "==> Connecting to SQL Server at {}:{} ...",
        config.sql.host, config.sql.port
    );
    let source = SqlServerSource::connect(&config.sql).await?;
    println!("    Connected.");

    println!();
    let mut pipeline = Pipeline::new(source, sink, PipelineOptions::default());
    let report = pipeline.run().await?;

    print_summary(&report, start.elapsed().as_secs_f64());
    Ok(report)
}

fn print_summary(report: &RunReport, elapsed_secs: f64) {
    println!();
    println!("=== Summary ===");
    println!("Total time:         {elapsed_secs:.2}s");
    println!("Total rows read:    {}", report.rows_read());
    for phase in &report.phases {
        println!();
        println!("{}:", phase.phase);
        println!("  Rows read:        {}/{}", phase.rows_read, phase.total);
        println!("  Rows exported:    {}", phase.exported);
        println!("  Created:          {}", phase.written);
        if phase.dropped > 0 {
            println!("  Unknown category: {}", phase.dropped);
        }
        if phase.skipped > 0 {
            println!("  Undecodable rows: {}", phase.skipped);
        }
        println!("  Failed batches:   {}", phase.failed_batches());
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::try_from(cli.connection)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .context("Failed to build tokio runtime")?;
    let report = rt.block_on(run_export(config))?;

    if report.has_failures() {
        for failure in report.failures() {
            error!("{failure}");
        }
        bail!(
            "{} bulk writes failed; the graph is only partially loaded",
            report.failures().count()
        );
    }
    println!();
    println!("Export finished successfully.");
    Ok(())
}

fn main() -> ExitCode {
    // `.env` must be loaded before clap reads the environment.
    let dotenv = config::load_dotenv();

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return ExitCode::FAILURE;
    }

    match dotenv {
        Ok(Some(path)) => info!(path = %path.display(), "Loaded .env"),
        Ok(None) => {}
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    }

    match run(cli) {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
