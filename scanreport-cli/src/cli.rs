use crate::settings::{delimiter_byte, ScanSettings};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use scanreport_core::{
    CancelFlag, ColumnCatalog, CsvSource, LogProgress, ScanConfig, ScanOrchestrator, ScanOutcome,
    ScanReport, TableSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "scanreport-cli")]
#[command(about = "Profile the tables of a CSV folder or PostgreSQL schema")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the source described by a YAML settings file
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Scan a folder of delimited files
    Csv {
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(long, default_value = ",")]
        delimiter: char,
        /// Files to scan; all files in the folder when omitted
        #[arg(short, long, value_delimiter = ',')]
        tables: Vec<String>,
        /// Rows per table, -1 for all rows
        #[arg(short, long, default_value = "100000", allow_hyphen_values = true)]
        sample_size: i64,
        #[arg(long)]
        numeric_stats: bool,
        #[arg(long, default_value = "0")]
        min_cell_count: u64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write an example settings file
    InitConfig {
        #[arg(short, long, default_value = "scan.yaml")]
        output: PathBuf,
    },
}

pub async fn scan_command(config: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let settings = ScanSettings::load(&config).await?;
    settings.scan.validate()?;
    let source = settings.open_source()?;
    run_scan(source, settings.tables, settings.scan, output).await
}

#[allow(clippy::too_many_arguments)]
pub async fn csv_command(
    dir: PathBuf,
    delimiter: char,
    tables: Vec<String>,
    sample_size: i64,
    numeric_stats: bool,
    min_cell_count: u64,
    output: Option<PathBuf>,
) -> Result<()> {
    let source = CsvSource::new(&dir).with_delimiter(delimiter_byte(delimiter)?);
    let config = ScanConfig {
        sample_size,
        calculate_numeric_stats: numeric_stats,
        min_cell_count,
        ..ScanConfig::default()
    };
    run_scan(Arc::new(source), tables, config, output).await
}

pub async fn init_config_command(output: PathBuf) -> Result<()> {
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    let yaml = serde_yaml::to_string(&ScanSettings::example())?;
    tokio::fs::write(&output, yaml).await?;
    info!("Example settings written to {}", output.display());
    Ok(())
}

async fn run_scan(
    source: Arc<dyn TableSource>,
    mut tables: Vec<String>,
    config: ScanConfig,
    output: Option<PathBuf>,
) -> Result<()> {
    if tables.is_empty() {
        tables = source.tables().await?;
        info!("No tables listed, scanning all {} tables", tables.len());
    }
    if tables.is_empty() {
        bail!("the source has no tables to scan");
    }

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, canceling the scan");
            on_signal.cancel();
        }
    });

    let orchestrator = ScanOrchestrator::new(source, config)
        .with_interrupter(Arc::new(cancel))
        .with_progress(Arc::new(LogProgress::new()));

    let outcome = orchestrator.scan(&tables).await?;
    if let ScanOutcome::Canceled { completed } = &outcome {
        warn!(
            "Scan canceled; writing the {} tables finished before the interrupt",
            completed.tables.len()
        );
    }

    let report = outcome.into_report();
    for failure in &report.failures {
        warn!("Table {} failed: {}", failure.table, failure.error);
    }
    write_report(&report, output.as_deref()).await
}

async fn write_report(report: &ScanReport, output: Option<&Path>) -> Result<()> {
    let json = report.to_json_pretty()?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            info!("Scan report saved to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
