//! Profile every CSV file in a folder
//!
//! Usage: cargo run --example profile_csv_folder -- <folder>

use scanreport_core::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let folder = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    println!("Profiling CSV files in {}", folder);

    let source = Arc::new(CsvSource::new(&folder));
    let tables = source.tables().await?;
    if tables.is_empty() {
        println!("No CSV files found");
        return Ok(());
    }

    let config = ScanConfig {
        calculate_numeric_stats: true,
        ..ScanConfig::default()
    };
    let outcome = ScanOrchestrator::new(source, config).scan(&tables).await?;
    let report = outcome.into_report();

    for table in &report.tables {
        println!("\n{} ({} rows checked)", table.table, table.rows_checked);
        for column in &table.columns {
            println!(
                "  {:<24} {:<8} empty {:>5.1}%  unique {}{}",
                column.name,
                column.type_label,
                column.empty_fraction * 100.0,
                if column.unique_count_at_least { ">=" } else { "" },
                column.unique_count,
            );
            if let Some(numeric) = &column.numeric {
                println!(
                    "  {:<24} min {} / median {} / max {}",
                    "", numeric.min, numeric.p50, numeric.max
                );
            }
        }
    }

    for failure in &report.failures {
        println!("\nFailed: {} ({})", failure.table, failure.error);
    }
    Ok(())
}
