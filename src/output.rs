//! Final CSV output.

use anyhow::{Context, Result};
use tracing::info;

use crate::pipeline::merge::OutputRow;
use csv::WriterBuilder;
use std::path::Path;

/// Sorts the output rows and writes them to `path` as one CSV table.
pub fn write_output(path: &Path, mut rows: Vec<OutputRow>) -> Result<()> {
    // Miles break ties between duplicate carrier-routes so output order is
    // stable run to run.
    rows.sort_by(|a, b| {
        (
            &a.origin_metro,
            &a.dest_metro,
            &a.carrier,
            &a.origin,
            &a.dest,
        )
            .cmp(&(&b.origin_metro, &b.dest_metro, &b.carrier, &b.origin, &b.dest))
            .then(a.nonstop_miles.total_cmp(&b.nonstop_miles))
    });

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Output written");
    Ok(())
}
