//! The enrichment pipeline: scale, branch, derive, merge.
//!
//! Data flows strictly forward. The scaled records are enriched twice: once
//! as-is, and once after the convergent share filter reduces the population
//! used for yield and premium baselines. The two branches are merged into
//! the final row set.

pub mod aggregate;
pub mod distance;
pub mod filter;
pub mod merge;
pub mod metrics;
pub mod scale;
pub mod types;

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::ingest;
use crate::output;

/// Runs the whole batch: ingest inputs, enrich, write the output table.
pub fn run<P: AsRef<Path>>(output_path: &Path, input_paths: &[P], config: &Config) -> Result<()> {
    let (consolidated, analysis_days) = ingest::load_input_files(input_paths, config)?;
    let records = scale::scale_records(consolidated, analysis_days, config);

    let filtered_records = filter::converge_share_filter(records.clone(), config)?;
    info!(
        unfiltered = records.len(),
        filtered = filtered_records.len(),
        "Populations ready"
    );

    let unfiltered_rows = filter::filter_at_end(metrics::enrich(&records, config), config);
    let filtered_rows =
        filter::filter_at_end(metrics::enrich(&filtered_records, config), config);

    let merged = merge::merge_branches(unfiltered_rows, filtered_rows);
    output::write_output(output_path, merged)
}
