//! CLI entry point for the DB1B enricher.
//!
//! Reads one or more quarterly DB1B coupon CSVs and writes one table of
//! market-level fares, yields, shares, and premium ratios.

use anyhow::{Result, ensure};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use db1b_enricher::config::Config;
use db1b_enricher::pipeline;

#[derive(Parser)]
#[command(name = "db1b_enricher")]
#[command(about = "Enrich DB1B ticket samples into market-level fare and yield indicators", long_about = None)]
struct Cli {
    /// Output CSV path (must end in .csv)
    #[arg(value_name = "OUTPUT_CSV")]
    output: PathBuf,

    /// One or more quarterly DB1B coupon CSV files, one reporting period each
    #[arg(value_name = "INPUT", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    // Logging setup: colored stderr, RUST_LOG controls the level, info when unset
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );

    tracing_subscriber::registry().with(stderr_layer).init();

    let cli = Cli::parse();
    ensure!(
        cli.output.extension().and_then(|e| e.to_str()) == Some("csv"),
        "output path must end in .csv, got {}",
        cli.output.display()
    );

    let config = Config::load()?;
    pipeline::run(&cli.output, &cli.inputs, &config)
}
