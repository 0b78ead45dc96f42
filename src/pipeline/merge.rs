//! Merges the unfiltered and filtered enrichment branches into output rows.
//!
//! The unfiltered branch supplies the row set, identifiers, volumes, shares,
//! and fares; every yield and premium column comes from the filtered branch,
//! left-joined on (origin, dest, carrier, miles) and left empty where the
//! filtered population dropped the row. Both branches carry consolidation
//! granularity, so the join is exact: one match or none.

use serde::Serialize;
use std::collections::HashMap;

use crate::pipeline::metrics::EnrichedRow;

/// One final CSV row. Field order is column order; yield/premium columns are
/// optional because they are sourced from the filtered branch.
#[derive(Debug, Serialize)]
pub struct OutputRow {
    #[serde(rename = "Origin metro")]
    pub origin_metro: String,
    #[serde(rename = "Destination metro")]
    pub dest_metro: String,
    #[serde(rename = "Origin")]
    pub origin: String,
    #[serde(rename = "Destination")]
    pub dest: String,
    #[serde(rename = "Carrier")]
    pub carrier: String,
    #[serde(rename = "Carrier pax/day")]
    pub pax_day: f64,
    #[serde(rename = "Market pax/day")]
    pub market_pax_day: f64,
    #[serde(rename = "Carrier market share")]
    pub market_share: f64,
    #[serde(rename = "Carrier metro pax/day")]
    pub carrier_metro_pax_day: f64,
    #[serde(rename = "Metro pax/day")]
    pub metro_pax_day: f64,
    #[serde(rename = "Carrier metro share")]
    pub metro_share: f64,
    #[serde(rename = "Carrier fare/pax")]
    pub fare_pax: f64,
    #[serde(rename = "Carrier total fare/pax")]
    pub total_fare_pax: f64,
    #[serde(rename = "Market total fare/pax")]
    pub market_total_fare_pax: f64,
    #[serde(rename = "Carrier market total fare premium")]
    pub market_total_fare_premium: Option<f64>,
    #[serde(rename = "Carrier market total flight premium")]
    pub market_total_flight_premium: Option<f64>,
    #[serde(rename = "Metro total fare/pax")]
    pub metro_total_fare_pax: f64,
    #[serde(rename = "Carrier metro total fare premium")]
    pub metro_total_fare_premium: Option<f64>,
    #[serde(rename = "Carrier metro total flight premium")]
    pub metro_total_flight_premium: Option<f64>,
    #[serde(rename = "Carrier total yield")]
    pub total_yield: Option<f64>,
    #[serde(rename = "Market total yield")]
    pub market_total_yield: Option<f64>,
    #[serde(rename = "Carrier metro total yield")]
    pub carrier_metro_total_yield: Option<f64>,
    #[serde(rename = "Metro total yield")]
    pub metro_total_yield: Option<f64>,
    #[serde(rename = "Origin pax/day")]
    pub origin_pax_day: f64,
    #[serde(rename = "Origin metro pax/day")]
    pub origin_metro_pax_day: f64,
    #[serde(rename = "Carrier Origin pax/day")]
    pub carrier_origin_pax_day: f64,
    #[serde(rename = "Carrier origin market share")]
    pub origin_market_share: f64,
    #[serde(rename = "Carrier origin metro share")]
    pub origin_metro_market_share: f64,
    #[serde(rename = "Carrier Origin total yield premium")]
    pub origin_total_yield_premium: Option<f64>,
    #[serde(rename = "Carrier Origin total flight yield premium")]
    pub origin_total_flight_yield_premium: Option<f64>,
    #[serde(rename = "Carrier Origin exc. ULCC total yield premium")]
    pub origin_exc_ulcc_total_yield_premium: Option<f64>,
    #[serde(rename = "Carrier Origin exc. ULCC total flight yield premium")]
    pub origin_exc_ulcc_total_flight_yield_premium: Option<f64>,
    #[serde(rename = "Carrier Origin metro total yield premium")]
    pub origin_metro_total_yield_premium: Option<f64>,
    #[serde(rename = "Carrier Origin metro total flight yield premium")]
    pub origin_metro_total_flight_yield_premium: Option<f64>,
    #[serde(rename = "Carrier Origin metro exc. ULCC total yield premium")]
    pub origin_metro_exc_ulcc_total_yield_premium: Option<f64>,
    #[serde(rename = "Carrier Origin metro exc. ULCC total flight yield premium")]
    pub origin_metro_exc_ulcc_total_flight_yield_premium: Option<f64>,
    #[serde(rename = "Origin metro total yield")]
    pub origin_metro_total_yield: Option<f64>,
    #[serde(rename = "Dest metro total yield")]
    pub dest_metro_total_yield: Option<f64>,
    #[serde(rename = "Nonstop miles")]
    pub nonstop_miles: f64,
    #[serde(rename = "Yield miles (1000)")]
    pub yield_miles_thousand: f64,
    #[serde(rename = "Distance bucket")]
    pub distance_bucket: f64,
    #[serde(rename = "Distance bucket total yield")]
    pub bucket_total_yield: Option<f64>,
    #[serde(rename = "Distance total yield premium")]
    pub distance_total_yield_premium: Option<f64>,
    #[serde(rename = "Distance total flight yield premium")]
    pub distance_total_flight_yield_premium: Option<f64>,
    #[serde(rename = "Market's distance total yield premium")]
    pub market_distance_total_yield_premium: Option<f64>,
    #[serde(rename = "Carrier origin distance total flight yield premium")]
    pub carrier_origin_distance_flight_yield_premium: Option<f64>,
    #[serde(rename = "Carrier origin average yield premium")]
    pub carrier_origin_avg_yield_premium: Option<f64>,
    #[serde(rename = "Metro distance bucket")]
    pub metro_distance_bucket: f64,
    #[serde(rename = "Metro distance bucket total yield")]
    pub metro_bucket_total_yield: Option<f64>,
    #[serde(rename = "Metro distance total yield premium")]
    pub metro_distance_total_yield_premium: Option<f64>,
    #[serde(rename = "Metro distance total flight yield premium")]
    pub metro_distance_total_flight_yield_premium: Option<f64>,
    #[serde(rename = "Metro's distance total yield premium")]
    pub metros_distance_total_yield_premium: Option<f64>,
}

/// Left-joins the filtered branch's yield/premium columns onto the
/// unfiltered branch's rows.
pub fn merge_branches(
    unfiltered: Vec<EnrichedRow>,
    filtered: Vec<EnrichedRow>,
) -> Vec<OutputRow> {
    // Miles are part of the key: a carrier-route can appear twice when its
    // recorded mileage changed between reporting periods, and each
    // observation must read its own yields.
    let filtered: HashMap<(String, String, String, u64), EnrichedRow> = filtered
        .into_iter()
        .map(|r| {
            (
                (
                    r.origin.clone(),
                    r.dest.clone(),
                    r.carrier.clone(),
                    r.nonstop_miles.to_bits(),
                ),
                r,
            )
        })
        .collect();

    unfiltered
        .into_iter()
        .map(|u| {
            let f = filtered.get(&(
                u.origin.clone(),
                u.dest.clone(),
                u.carrier.clone(),
                u.nonstop_miles.to_bits(),
            ));
            OutputRow {
                market_total_fare_premium: f.map(|f| f.market_total_fare_premium),
                market_total_flight_premium: f.map(|f| f.market_total_flight_premium),
                metro_total_fare_premium: f.map(|f| f.metro_total_fare_premium),
                metro_total_flight_premium: f.map(|f| f.metro_total_flight_premium),
                total_yield: f.map(|f| f.total_yield),
                market_total_yield: f.map(|f| f.market_total_yield),
                carrier_metro_total_yield: f.map(|f| f.carrier_metro_total_yield),
                metro_total_yield: f.map(|f| f.metro_total_yield),
                origin_total_yield_premium: f.map(|f| f.origin_share.total_yield_premium),
                origin_total_flight_yield_premium: f.map(|f| f.origin_share.flight_yield_premium),
                origin_exc_ulcc_total_yield_premium: f
                    .map(|f| f.origin_share.exc_ulcc_total_yield_premium),
                origin_exc_ulcc_total_flight_yield_premium: f
                    .map(|f| f.origin_share.exc_ulcc_flight_yield_premium),
                origin_metro_total_yield_premium: f
                    .map(|f| f.origin_metro_share.total_yield_premium),
                origin_metro_total_flight_yield_premium: f
                    .map(|f| f.origin_metro_share.flight_yield_premium),
                origin_metro_exc_ulcc_total_yield_premium: f
                    .map(|f| f.origin_metro_share.exc_ulcc_total_yield_premium),
                origin_metro_exc_ulcc_total_flight_yield_premium: f
                    .map(|f| f.origin_metro_share.exc_ulcc_flight_yield_premium),
                origin_metro_total_yield: f.map(|f| f.origin_metro_share.place_total_yield),
                dest_metro_total_yield: f.map(|f| f.dest_metro_share.place_total_yield),
                bucket_total_yield: f.map(|f| f.bucket_total_yield),
                distance_total_yield_premium: f.map(|f| f.distance_total_yield_premium),
                distance_total_flight_yield_premium: f
                    .map(|f| f.distance_total_flight_yield_premium),
                market_distance_total_yield_premium: f
                    .map(|f| f.market_distance_total_yield_premium),
                carrier_origin_distance_flight_yield_premium: f
                    .map(|f| f.carrier_origin_distance_flight_yield_premium),
                carrier_origin_avg_yield_premium: f.map(|f| f.carrier_origin_avg_yield_premium),
                metro_bucket_total_yield: f.map(|f| f.metro_bucket_total_yield),
                metro_distance_total_yield_premium: f
                    .map(|f| f.metro_distance_total_yield_premium),
                metro_distance_total_flight_yield_premium: f
                    .map(|f| f.metro_distance_total_flight_yield_premium),
                metros_distance_total_yield_premium: f
                    .map(|f| f.metros_distance_total_yield_premium),

                origin_metro: u.origin_metro,
                dest_metro: u.dest_metro,
                origin: u.origin,
                dest: u.dest,
                carrier: u.carrier,
                pax_day: u.pax_day,
                market_pax_day: u.market_pax_day,
                market_share: u.market_share,
                carrier_metro_pax_day: u.carrier_metro_pax_day,
                metro_pax_day: u.metro_pax_day,
                metro_share: u.metro_share,
                fare_pax: u.fare_pax,
                total_fare_pax: u.total_fare_pax,
                market_total_fare_pax: u.market_total_fare_pax,
                metro_total_fare_pax: u.metro_total_fare_pax,
                origin_pax_day: u.origin_share.place_pax_day,
                origin_metro_pax_day: u.origin_metro_share.place_pax_day,
                carrier_origin_pax_day: u.origin_share.carrier_pax_day,
                origin_market_share: u.origin_share.market_share,
                origin_metro_market_share: u.origin_metro_share.market_share,
                nonstop_miles: u.nonstop_miles,
                yield_miles_thousand: u.yield_miles_thousand,
                distance_bucket: u.distance_bucket,
                metro_distance_bucket: u.metro_distance_bucket,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pipeline::metrics::enrich;
    use crate::pipeline::types::MarketRecord;

    fn record(miles: f64, revenue: f64) -> MarketRecord {
        MarketRecord {
            origin: "JFK".into(),
            dest: "LAX".into(),
            carrier: "AA".into(),
            origin_metro: "JFK".into(),
            dest_metro: "LAX".into(),
            nonstop_miles: miles,
            pax_day: 10.0,
            adj_pax_day: 10.0,
            revenue_day: revenue,
            total_revenue_day: revenue,
        }
    }

    #[test]
    fn test_merge_keeps_duplicate_carrier_routes_distinct() {
        // A mileage revision between reporting periods leaves the same
        // carrier-route with two observations; each output row must carry
        // the yields of its own observation, not its twin's.
        let config = Config::parse(r#"{"Distance bucket size": 500}"#).unwrap();
        let records = vec![record(1000.0, 1000.0), record(2000.0, 4000.0)];
        let enriched = enrich(&records, &config);
        let rows = merge_branches(enriched.clone(), enriched);

        assert_eq!(rows.len(), 2);
        // fare/pax over miles: 100/1000 = 0.1 and 400/2000 = 0.2.
        let short = rows.iter().find(|r| r.nonstop_miles == 1000.0).unwrap();
        let long = rows.iter().find(|r| r.nonstop_miles == 2000.0).unwrap();
        assert_eq!(short.total_yield, Some(0.1));
        assert_eq!(long.total_yield, Some(0.2));
    }

    #[test]
    fn test_merge_leaves_missing_observation_empty() {
        let config = Config::parse(r#"{"Distance bucket size": 500}"#).unwrap();
        let records = vec![record(1000.0, 1000.0), record(2000.0, 4000.0)];
        let enriched = enrich(&records, &config);
        // The filtered branch kept only the 1000-mile observation.
        let filtered: Vec<EnrichedRow> = enriched
            .iter()
            .filter(|r| r.nonstop_miles == 1000.0)
            .cloned()
            .collect();
        let rows = merge_branches(enriched, filtered);

        let short = rows.iter().find(|r| r.nonstop_miles == 1000.0).unwrap();
        let long = rows.iter().find(|r| r.nonstop_miles == 2000.0).unwrap();
        assert_eq!(short.total_yield, Some(0.1));
        assert_eq!(long.total_yield, None);
    }
}
