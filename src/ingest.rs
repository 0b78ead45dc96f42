//! Input loading and normalization.
//!
//! Reads one CSV per reporting period, drops excluded carriers, consolidates
//! duplicate market observations, accumulates the analysis length in days,
//! and runs the (diagnostic-only) directional passenger-flow check.

use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::pipeline::types::{ConsolidatedRow, ConsolidationKey};

/// One raw itinerary row from a DB1B coupon extract. Each row is a 10%
/// sample and may stand for many real tickets.
#[derive(Debug, Deserialize)]
pub struct ItineraryRow {
    #[serde(rename = "YEAR")]
    pub year: i32,
    #[serde(rename = "QUARTER")]
    pub quarter: u32,
    #[serde(rename = "ORIGIN")]
    pub origin: String,
    #[serde(rename = "DEST")]
    pub dest: String,
    #[serde(rename = "TICKET_CARRIER")]
    pub carrier: String,
    #[serde(rename = "PASSENGERS")]
    pub passengers: f64,
    #[serde(rename = "MARKET_FARE")]
    pub market_fare: f64,
    #[serde(rename = "NONSTOP_MILES")]
    pub nonstop_miles: f64,
}

/// Loads every input file, returning the consolidated market observations
/// and the combined analysis length in days.
///
/// Each file must hold exactly one reporting period; the (year, quarter) of
/// its first row decides the period length added to the analysis length.
pub fn load_input_files<P: AsRef<Path>>(
    paths: &[P],
    config: &Config,
) -> Result<(Vec<ConsolidatedRow>, f64)> {
    ensure!(!paths.is_empty(), "at least one input file is required");

    let mut analysis_days = 0.0;
    let mut combined: Vec<ConsolidatedRow> = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let rows = read_rows(path)?;
        ensure!(!rows.is_empty(), "input file {} has no rows", path.display());

        let (year, quarter) = (rows[0].year, rows[0].quarter);
        let days = quarter_days(year, quarter)? as f64;
        analysis_days += days;

        let rows: Vec<ItineraryRow> = rows
            .into_iter()
            .filter(|r| !config.filters_at_beginning.invalid_carriers.contains(&r.carrier))
            .collect();

        validate_passenger_flows(&rows, days, config, year, quarter);

        let consolidated = consolidate(rows.into_iter().map(|r| ConsolidatedRow {
            origin: r.origin,
            dest: r.dest,
            carrier: r.carrier,
            nonstop_miles: r.nonstop_miles,
            passengers: r.passengers,
            market_fare: r.market_fare,
        }));
        debug!(
            path = %path.display(),
            year,
            quarter,
            days,
            markets = consolidated.len(),
            "Input file consolidated"
        );
        combined.extend(consolidated);
    }

    // A market present in several quarters must merge into one observation.
    let combined = consolidate(combined);
    info!(
        markets = combined.len(),
        analysis_days, "Input files loaded"
    );
    Ok((combined, analysis_days))
}

fn read_rows(path: &Path) -> Result<Vec<ItineraryRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: ItineraryRow =
            row.with_context(|| format!("malformed row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Sums passengers and fare revenue within the exhaustive consolidation key.
pub fn consolidate<I>(rows: I) -> Vec<ConsolidatedRow>
where
    I: IntoIterator<Item = ConsolidatedRow>,
{
    let mut merged: HashMap<ConsolidationKey, ConsolidatedRow> = HashMap::new();
    for row in rows {
        match merged.entry(row.key()) {
            std::collections::hash_map::Entry::Occupied(mut e) => {
                let existing = e.get_mut();
                existing.passengers += row.passengers;
                existing.market_fare += row.market_fare;
            }
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(row);
            }
        }
    }
    merged.into_values().collect()
}

/// Exact day count of a calendar quarter, leap years included.
pub fn quarter_days(year: i32, quarter: u32) -> Result<i64> {
    ensure!((1..=4).contains(&quarter), "quarter must be 1-4, got {quarter}");
    let start_month = (quarter - 1) * 3 + 1;
    let Some(start) = NaiveDate::from_ymd_opt(year, start_month, 1) else {
        bail!("invalid year {year}");
    };
    let end = if quarter == 4 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, start_month + 3, 1)
    };
    let Some(end) = end else {
        bail!("invalid year {year}");
    };
    Ok((end - start).num_days())
}

/// Counts unordered route pairs whose directional pax/day differ by more
/// than the quantity threshold AND more than the percent threshold. Returns
/// (concerning pairs, total pairs). Purely diagnostic.
pub fn count_uneven_flows(rows: &[ItineraryRow], days: f64, config: &Config) -> (usize, usize) {
    // (low, high) -> (forward pax/day, reverse pax/day)
    let mut pairs: HashMap<(String, String), (f64, f64)> = HashMap::new();
    for row in rows {
        if row.origin == row.dest {
            continue;
        }
        let pax_day = row.passengers / (crate::pipeline::scale::SAMPLE_FRACTION * days);
        if row.origin < row.dest {
            pairs
                .entry((row.origin.clone(), row.dest.clone()))
                .or_default()
                .0 += pax_day;
        } else {
            pairs
                .entry((row.dest.clone(), row.origin.clone()))
                .or_default()
                .1 += pax_day;
        }
    }

    let max_diff = config.flow_validation.quantity_different;
    let max_pct = config.flow_validation.percent_floor();

    let concerning = pairs
        .values()
        .filter(|(forward, reverse)| {
            let diff = forward - reverse;
            // reverse == 0 gives an infinite percent difference, which
            // correctly trips the threshold.
            let pct = forward / reverse - 1.0;
            diff.abs() > max_diff && pct.abs() > max_pct
        })
        .count();
    (concerning, pairs.len())
}

/// Diagnostic-only check that passenger flow is roughly symmetric per route.
/// Never alters the data; irregular sampling is surfaced for human review.
fn validate_passenger_flows(
    rows: &[ItineraryRow],
    days: f64,
    config: &Config,
    year: i32,
    quarter: u32,
) {
    let (concerning, total) = count_uneven_flows(rows, days, config);
    let percent = if total == 0 {
        0.0
    } else {
        concerning as f64 / total as f64 * 100.0
    };
    if concerning > 0 {
        warn!(
            year,
            quarter,
            concerning,
            total,
            percent = format!("{percent:.2}"),
            "Routes with concerningly uneven passenger flows"
        );
    } else {
        info!(year, quarter, total, "Passenger flows look symmetric");
    }
}
