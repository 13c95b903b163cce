mod cli;
mod settings;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for the JSON report
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { config, output } => cli::scan_command(config, output).await,
        Commands::Csv {
            dir,
            delimiter,
            tables,
            sample_size,
            numeric_stats,
            min_cell_count,
            output,
        } => {
            cli::csv_command(
                dir,
                delimiter,
                tables,
                sample_size,
                numeric_stats,
                min_cell_count,
                output,
            )
            .await
        }
        Commands::InitConfig { output } => cli::init_config_command(output).await,
    }
}
