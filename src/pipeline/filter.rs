//! Volume and share filtering.
//!
//! `converge_share_filter` is a fixed-point iteration: each pass recomputes
//! market and metro totals from the surviving rows and drops rows below the
//! configured floors, until a full pass removes nothing. Termination is
//! guaranteed (row count never grows), but not speed, so the loop is capped
//! and exceeding the cap is a fatal configuration error.

use anyhow::{Result, bail};
use tracing::info;

use crate::config::{BeginningFilters, Config};
use crate::pipeline::aggregate::sum_by;
use crate::pipeline::metrics::EnrichedRow;
use crate::pipeline::types::MarketRecord;

const MAX_PASSES: usize = 64;

/// Produces the reduced population used for share and premium baselines.
pub fn converge_share_filter(
    records: Vec<MarketRecord>,
    config: &Config,
) -> Result<Vec<MarketRecord>> {
    let filters = &config.filters_at_beginning;

    let mut records: Vec<MarketRecord> = records
        .into_iter()
        .filter(|r| r.pax_day >= filters.market_carrier_pax_day)
        .collect();

    for pass in 1..=MAX_PASSES {
        let before = records.len();
        records = share_filter_pass(records, filters);
        if records.len() == before {
            info!(passes = pass, rows = records.len(), "Share filter converged");
            return Ok(records);
        }
    }
    bail!("share filter did not converge within {MAX_PASSES} passes; check the configured volume and share floors");
}

/// One pass of the share filter. Public so the fixed-point property is
/// directly testable.
pub fn share_filter_pass(
    records: Vec<MarketRecord>,
    filters: &BeginningFilters,
) -> Vec<MarketRecord> {
    // Route volume floor.
    let market = sum_by(&records, |r| r.route_key());
    let records: Vec<MarketRecord> = records
        .into_iter()
        .filter(|r| market[&r.route_key()].pax_day >= filters.market_pax_day)
        .collect();

    // Metro-pair volume floor, recomputed after the route drop.
    let metro = sum_by(&records, |r| r.metro_key());
    let records: Vec<MarketRecord> = records
        .into_iter()
        .filter(|r| metro[&r.metro_key()].pax_day >= filters.metro_pax_day)
        .collect();

    // Shares against the post-drop populations.
    let market = sum_by(&records, |r| r.route_key());
    let metro_carrier = sum_by(&records, |r| r.metro_carrier_key());
    let metro = sum_by(&records, |r| r.metro_key());

    // A row goes only when both its shares are below their floors, and even
    // then a high enough raw volume protects it.
    let override_pax = filters.do_not_filter_if.market_carrier_pax_day;
    records
        .into_iter()
        .filter(|r| {
            let market_share = r.pax_day / market[&r.route_key()].pax_day;
            let metro_share =
                metro_carrier[&r.metro_carrier_key()].pax_day / metro[&r.metro_key()].pax_day;
            market_share >= filters.market_share
                || metro_share >= filters.metro_share
                || r.pax_day > override_pax
        })
        .collect()
}

/// The final output filter, applied to each enriched branch independently of
/// the convergent filter.
pub fn filter_at_end(rows: Vec<EnrichedRow>, config: &Config) -> Vec<EnrichedRow> {
    let filters = &config.filters_at_end;
    let share_floor = filters.metro_share_floor();
    rows.into_iter()
        .filter(|r| {
            r.metro_share >= share_floor
                && r.pax_day >= filters.market_carrier_pax_day
                && r.metro_pax_day >= filters.metro_pax_day
        })
        .collect()
}
