//! Sample scaling: raw 10%-sampled counts become daily rates.
//!
//! This is the single point where sample counts turn into the economic
//! quantities used downstream; every later ratio multiplies through any
//! error made here.

use crate::config::Config;
use crate::pipeline::types::{ConsolidatedRow, MarketRecord};

/// The DB1B coupon data is a fixed 10% sample of tickets.
pub const SAMPLE_FRACTION: f64 = 0.1;

/// Converts consolidated observations into daily-rate market records with
/// metro labels attached.
pub fn scale_records(
    rows: Vec<ConsolidatedRow>,
    analysis_days: f64,
    config: &Config,
) -> Vec<MarketRecord> {
    let scale = SAMPLE_FRACTION * analysis_days;
    rows.into_iter()
        .map(|row| {
            let pax_day = row.passengers / scale;
            let revenue_day = row.market_fare / scale;
            MarketRecord {
                origin_metro: config.metro(&row.origin).to_string(),
                dest_metro: config.metro(&row.dest).to_string(),
                adj_pax_day: pax_day / config.density_bonus(&row.carrier),
                total_revenue_day: revenue_day
                    + config.ancillary_revenue(&row.carrier) * pax_day,
                pax_day,
                revenue_day,
                origin: row.origin,
                dest: row.dest,
                carrier: row.carrier,
                nonstop_miles: row.nonstop_miles,
            }
        })
        .collect()
}
