//! The derived metric calculator.
//!
//! A strict dependency chain over the scaled records: carrier ratios, then
//! market and metro aggregates, then airport reference populations, then
//! distance-bucket baselines, then the origin-weighted premium. Each stage
//! reads only quantities materialized by earlier stages; reordering the
//! chain silently corrupts the ratios rather than failing.
//!
//! Division by zero is left unguarded except for the airport-stage
//! reference lookups, where a missing reference population fills the share
//! and premium cells with 0. Non-finite cells elsewhere mean "undefined for
//! this sparse combination".

use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::pipeline::aggregate::{sum_by, sum_by_filtered};
use crate::pipeline::distance::bucket;
use crate::pipeline::types::{MarketRecord, Measures};

/// Which airport-level reference population a share/premium block is
/// measured against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceKind {
    Origin,
    Dest,
    OriginMetro,
    DestMetro,
}

impl PlaceKind {
    fn of<'a>(self, r: &'a MarketRecord) -> &'a str {
        match self {
            PlaceKind::Origin => &r.origin,
            PlaceKind::Dest => &r.dest,
            PlaceKind::OriginMetro => &r.origin_metro,
            PlaceKind::DestMetro => &r.dest_metro,
        }
    }
}

/// Airport-level shares and premiums for one carrier at one place, against
/// both the all-carrier and the exc.-ULCC reference populations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceShare {
    pub carrier_pax_day: f64,
    pub place_pax_day: f64,
    pub place_total_yield: f64,
    pub market_share: f64,
    pub yield_premium: f64,
    pub total_yield_premium: f64,
    pub flight_yield_premium: f64,
    pub exc_ulcc_market_share: f64,
    pub exc_ulcc_yield_premium: f64,
    pub exc_ulcc_total_yield_premium: f64,
    pub exc_ulcc_flight_yield_premium: f64,
}

/// One fully derived carrier-route row.
#[derive(Debug, Clone)]
pub struct EnrichedRow {
    pub origin: String,
    pub dest: String,
    pub carrier: String,
    pub origin_metro: String,
    pub dest_metro: String,
    pub nonstop_miles: f64,

    pub pax_day: f64,
    pub adj_pax_day: f64,

    // carrier-route ratios
    pub fare_pax: f64,
    pub total_fare_pax: f64,
    pub adj_fare_pax: f64,
    pub carrier_yield: f64,
    pub total_yield: f64,
    pub adj_total_yield: f64,

    // market (route) stage
    pub market_pax_day: f64,
    pub market_total_fare_pax: f64,
    pub market_yield: f64,
    pub market_total_yield: f64,
    pub market_adj_total_yield: f64,
    pub market_share: f64,
    pub market_fare_premium: f64,
    pub market_total_fare_premium: f64,
    pub market_total_flight_premium: f64,

    // metro stage
    pub carrier_metro_pax_day: f64,
    pub carrier_metro_yield: f64,
    pub carrier_metro_total_yield: f64,
    pub carrier_metro_adj_total_yield: f64,
    pub metro_pax_day: f64,
    pub metro_total_fare_pax: f64,
    pub metro_yield: f64,
    pub metro_total_yield: f64,
    pub metro_adj_total_yield: f64,
    pub metro_share: f64,
    pub metro_fare_premium: f64,
    pub metro_total_fare_premium: f64,
    pub metro_total_flight_premium: f64,

    // airport stage, one block per reference-population kind
    pub origin_share: PlaceShare,
    pub dest_share: PlaceShare,
    pub origin_metro_share: PlaceShare,
    pub dest_metro_share: PlaceShare,

    // distance stage
    pub distance_bucket: f64,
    pub bucket_total_yield: f64,
    pub distance_yield_premium: f64,
    pub distance_total_yield_premium: f64,
    pub distance_total_flight_yield_premium: f64,
    pub market_distance_yield_premium: f64,
    pub market_distance_total_yield_premium: f64,
    pub market_distance_total_flight_yield_premium: f64,

    // metro-distance stage
    pub metro_distance_bucket: f64,
    pub metro_bucket_total_yield: f64,
    pub metro_distance_yield_premium: f64,
    pub metro_distance_total_yield_premium: f64,
    pub metro_distance_total_flight_yield_premium: f64,
    pub metros_distance_yield_premium: f64,
    pub metros_distance_total_yield_premium: f64,
    pub metros_distance_total_flight_yield_premium: f64,

    // origin-weighted stage
    pub yield_miles_thousand: f64,
    pub carrier_origin_distance_flight_yield_premium: f64,
    pub carrier_origin_avg_yield_premium: f64,
}

/// Reference-population yields derived from an aggregated measure vector:
/// per-pax fares divided by pax-weighted miles per passenger.
struct PopYields {
    pax_day: f64,
    yield_per_mile: f64,
    total_yield: f64,
    adj_total_yield: f64,
}

fn pop_yields(m: &Measures) -> PopYields {
    let miles_per_pax = m.pax_miles / m.pax_day;
    PopYields {
        pax_day: m.pax_day,
        yield_per_mile: (m.revenue_day / m.pax_day) / miles_per_pax,
        total_yield: (m.total_revenue_day / m.pax_day) / miles_per_pax,
        adj_total_yield: (m.total_revenue_day / m.adj_pax_day) / miles_per_pax,
    }
}

/// Carrier shares and premiums at one place granularity.
fn place_shares(
    records: &[MarketRecord],
    ulccs: &HashSet<String>,
    kind: PlaceKind,
) -> HashMap<(String, String), PlaceShare> {
    let by_carrier = sum_by(records, |r| (kind.of(r).to_string(), r.carrier.clone()));
    let by_place = sum_by(records, |r| kind.of(r).to_string());
    let exc_ulcc = sum_by_filtered(
        records,
        |r| !ulccs.contains(&r.carrier),
        |r| kind.of(r).to_string(),
    );

    by_carrier
        .iter()
        .map(|((place, carrier), m)| {
            let c = pop_yields(m);
            let all = pop_yields(&by_place[place]);
            let mut share = PlaceShare {
                carrier_pax_day: m.pax_day,
                place_pax_day: all.pax_day,
                place_total_yield: all.total_yield,
                market_share: m.pax_day / all.pax_day,
                yield_premium: c.yield_per_mile / all.yield_per_mile,
                total_yield_premium: c.total_yield / all.total_yield,
                flight_yield_premium: c.adj_total_yield / all.adj_total_yield,
                ..Default::default()
            };
            // A place served only by ULCCs has no exc.-ULCC reference; those
            // cells read 0. Every other carrier, ULCCs included, is compared
            // against the population excluding the ULCCs.
            if let Some(exc) = exc_ulcc.get(place) {
                let exc = pop_yields(exc);
                share.exc_ulcc_market_share = m.pax_day / exc.pax_day;
                share.exc_ulcc_yield_premium = c.yield_per_mile / exc.yield_per_mile;
                share.exc_ulcc_total_yield_premium = c.total_yield / exc.total_yield;
                share.exc_ulcc_flight_yield_premium = c.adj_total_yield / exc.adj_total_yield;
            }
            ((place.clone(), carrier.clone()), share)
        })
        .collect()
}

/// Runs the whole derivation chain over one population of scaled records.
pub fn enrich(records: &[MarketRecord], config: &Config) -> Vec<EnrichedRow> {
    let width = config.distance_bucket_size;

    let market = sum_by(records, |r| r.route_key());
    let metro_carrier = sum_by(records, |r| r.metro_carrier_key());
    let metro = sum_by(records, |r| r.metro_key());

    let origin_shares = place_shares(records, &config.ulccs, PlaceKind::Origin);
    let dest_shares = place_shares(records, &config.ulccs, PlaceKind::Dest);
    let origin_metro_shares = place_shares(records, &config.ulccs, PlaceKind::OriginMetro);
    let dest_metro_shares = place_shares(records, &config.ulccs, PlaceKind::DestMetro);

    // Distance buckets over carrier-route rows, keyed by midpoint bits.
    let bucket_aggs = sum_by(records, |r| bucket(r.nonstop_miles, width).to_bits());

    // A metro-pair's distance is its pax-mile-weighted average route length;
    // its bucket groups metro-pairs of similar length.
    let metro_bucket_of: HashMap<(String, String), f64> = metro
        .iter()
        .map(|(k, m)| (k.clone(), bucket(m.pax_miles / m.pax_day, width)))
        .collect();
    let metro_bucket_aggs = sum_by(records, |r| metro_bucket_of[&r.metro_key()].to_bits());

    // Flight yields per (origin, carrier, bucket) for the weighted premium.
    let origin_carrier_bucket = sum_by(records, |r| {
        (
            r.origin.clone(),
            r.carrier.clone(),
            bucket(r.nonstop_miles, width).to_bits(),
        )
    });

    // Pax-mile-weighted average of the origin-distance flight premium per
    // (origin, carrier), broadcast back onto every row of that pair.
    let mut weighted: HashMap<(String, String), (f64, f64)> = HashMap::new();
    for r in records {
        let b = bucket(r.nonstop_miles, width).to_bits();
        let ocb = &origin_carrier_bucket[&(r.origin.clone(), r.carrier.clone(), b)];
        let carrier_flight_yield = ocb.total_revenue_day / ocb.adj_pax_miles;
        let bucket_flight_yield = {
            let m = &bucket_aggs[&b];
            m.total_revenue_day / m.adj_pax_miles
        };
        let premium = carrier_flight_yield / bucket_flight_yield;
        let adj_pax_miles = r.nonstop_miles * r.adj_pax_day;
        let entry = weighted
            .entry((r.origin.clone(), r.carrier.clone()))
            .or_insert((0.0, 0.0));
        entry.0 += premium * adj_pax_miles;
        entry.1 += adj_pax_miles;
    }

    records
        .iter()
        .map(|r| {
            // Stage 1: carrier-route ratios.
            let fare_pax = r.revenue_day / r.pax_day;
            let total_fare_pax = r.total_revenue_day / r.pax_day;
            let adj_fare_pax = r.total_revenue_day / r.adj_pax_day;
            let carrier_yield = fare_pax / r.nonstop_miles;
            let total_yield = total_fare_pax / r.nonstop_miles;
            let adj_total_yield = adj_fare_pax / r.nonstop_miles;

            // Stage 2: market (route) aggregates and premiums.
            let mk = &market[&r.route_key()];
            let market_fare_pax = mk.revenue_day / mk.pax_day;
            let market_total_fare_pax = mk.total_revenue_day / mk.pax_day;
            let market_adj_fare_pax = mk.total_revenue_day / mk.adj_pax_day;
            let market_yield = market_fare_pax / r.nonstop_miles;
            let market_total_yield = market_total_fare_pax / r.nonstop_miles;
            let market_adj_total_yield = market_adj_fare_pax / r.nonstop_miles;

            // Stage 3: metro aggregates and premiums. Carrier metro yields
            // are pax-mile weighted; metro yields divide per-pax fares by
            // the pax-weighted metro distance.
            let mc = &metro_carrier[&r.metro_carrier_key()];
            let carrier_metro_yield = mc.revenue_day / mc.pax_miles;
            let carrier_metro_total_yield = mc.total_revenue_day / mc.pax_miles;
            let carrier_metro_adj_total_yield = mc.total_revenue_day / mc.adj_pax_miles;
            let mt = &metro[&r.metro_key()];
            let metro_fare_pax = mt.revenue_day / mt.pax_day;
            let metro_total_fare_pax = mt.total_revenue_day / mt.pax_day;
            let metro_adj_fare_pax = mt.total_revenue_day / mt.adj_pax_day;
            let metro_distance = mt.pax_miles / mt.pax_day;
            let metro_yield = metro_fare_pax / metro_distance;
            let metro_total_yield = metro_total_fare_pax / metro_distance;
            let metro_adj_total_yield = metro_adj_fare_pax / metro_distance;

            // Stage 5: distance-bucket baselines.
            let distance_bucket = bucket(r.nonstop_miles, width);
            let bk = &bucket_aggs[&distance_bucket.to_bits()];
            let bucket_yield = bk.revenue_day / bk.pax_miles;
            let bucket_total_yield = bk.total_revenue_day / bk.pax_miles;
            let bucket_adj_total_yield = bk.total_revenue_day / bk.adj_pax_miles;

            // Stage 6: metro-distance-bucket baselines.
            let metro_distance_bucket = metro_bucket_of[&r.metro_key()];
            let mb = &metro_bucket_aggs[&metro_distance_bucket.to_bits()];
            let metro_bucket_yield = mb.revenue_day / mb.pax_miles;
            let metro_bucket_total_yield = mb.total_revenue_day / mb.pax_miles;
            let metro_bucket_adj_total_yield = mb.total_revenue_day / mb.adj_pax_miles;

            // Stage 7: origin-weighted flight premium.
            let b = distance_bucket.to_bits();
            let ocb = &origin_carrier_bucket[&(r.origin.clone(), r.carrier.clone(), b)];
            let carrier_origin_distance_flight_yield = ocb.total_revenue_day / ocb.adj_pax_miles;
            let distance_flight_yield = bk.total_revenue_day / bk.adj_pax_miles;
            let carrier_origin_distance_flight_yield_premium =
                carrier_origin_distance_flight_yield / distance_flight_yield;
            let adj_pax_miles = r.nonstop_miles * r.adj_pax_day;
            let (premium_miles, miles) = weighted[&(r.origin.clone(), r.carrier.clone())];

            EnrichedRow {
                origin: r.origin.clone(),
                dest: r.dest.clone(),
                carrier: r.carrier.clone(),
                origin_metro: r.origin_metro.clone(),
                dest_metro: r.dest_metro.clone(),
                nonstop_miles: r.nonstop_miles,
                pax_day: r.pax_day,
                adj_pax_day: r.adj_pax_day,

                fare_pax,
                total_fare_pax,
                adj_fare_pax,
                carrier_yield,
                total_yield,
                adj_total_yield,

                market_pax_day: mk.pax_day,
                market_total_fare_pax,
                market_yield,
                market_total_yield,
                market_adj_total_yield,
                market_share: r.pax_day / mk.pax_day,
                market_fare_premium: fare_pax / market_fare_pax,
                market_total_fare_premium: total_fare_pax / market_total_fare_pax,
                market_total_flight_premium: adj_fare_pax / market_adj_fare_pax,

                carrier_metro_pax_day: mc.pax_day,
                carrier_metro_yield,
                carrier_metro_total_yield,
                carrier_metro_adj_total_yield,
                metro_pax_day: mt.pax_day,
                metro_total_fare_pax,
                metro_yield,
                metro_total_yield,
                metro_adj_total_yield,
                metro_share: mc.pax_day / mt.pax_day,
                metro_fare_premium: carrier_metro_yield / metro_yield,
                metro_total_fare_premium: carrier_metro_total_yield / metro_total_yield,
                metro_total_flight_premium: carrier_metro_adj_total_yield / metro_adj_total_yield,

                origin_share: origin_shares[&(r.origin.clone(), r.carrier.clone())],
                dest_share: dest_shares[&(r.dest.clone(), r.carrier.clone())],
                origin_metro_share: origin_metro_shares
                    [&(r.origin_metro.clone(), r.carrier.clone())],
                dest_metro_share: dest_metro_shares[&(r.dest_metro.clone(), r.carrier.clone())],

                distance_bucket,
                bucket_total_yield,
                distance_yield_premium: carrier_yield / bucket_yield,
                distance_total_yield_premium: total_yield / bucket_total_yield,
                distance_total_flight_yield_premium: adj_total_yield / bucket_adj_total_yield,
                market_distance_yield_premium: market_yield / bucket_yield,
                market_distance_total_yield_premium: market_total_yield / bucket_total_yield,
                market_distance_total_flight_yield_premium: market_adj_total_yield
                    / bucket_adj_total_yield,

                metro_distance_bucket,
                metro_bucket_total_yield,
                metro_distance_yield_premium: carrier_yield / metro_bucket_yield,
                metro_distance_total_yield_premium: total_yield / metro_bucket_total_yield,
                metro_distance_total_flight_yield_premium: adj_total_yield
                    / metro_bucket_adj_total_yield,
                metros_distance_yield_premium: metro_yield / metro_bucket_yield,
                metros_distance_total_yield_premium: metro_total_yield / metro_bucket_total_yield,
                metros_distance_total_flight_yield_premium: metro_adj_total_yield
                    / metro_bucket_adj_total_yield,

                yield_miles_thousand: adj_pax_miles * carrier_origin_distance_flight_yield_premium
                    / 1000.0,
                carrier_origin_distance_flight_yield_premium,
                carrier_origin_avg_yield_premium: premium_miles / miles,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::parse(
            r#"{
                "Metro areas": {"NYC": ["JFK", "LGA"]},
                "ULCCs": ["NK"],
                "Ancillary revenue per passenger": {"Default": 0.0},
                "Extra seats": {"Default": 0.0},
                "Distance bucket size": 500
            }"#,
        )
        .unwrap()
    }

    fn record(
        origin: &str,
        dest: &str,
        carrier: &str,
        miles: f64,
        pax: f64,
        revenue: f64,
    ) -> MarketRecord {
        MarketRecord {
            origin: origin.to_string(),
            dest: dest.to_string(),
            carrier: carrier.to_string(),
            origin_metro: if origin == "JFK" || origin == "LGA" {
                "NYC".to_string()
            } else {
                origin.to_string()
            },
            dest_metro: if dest == "JFK" || dest == "LGA" {
                "NYC".to_string()
            } else {
                dest.to_string()
            },
            nonstop_miles: miles,
            pax_day: pax,
            adj_pax_day: pax,
            revenue_day: revenue,
            total_revenue_day: revenue,
        }
    }

    #[test]
    fn test_single_carrier_owns_its_market() {
        let records = vec![record("JFK", "LAX", "AA", 2500.0, 10.0, 2000.0)];
        let rows = enrich(&records, &config());
        let row = &rows[0];

        assert!((row.fare_pax - 200.0).abs() < 1e-9);
        assert!((row.carrier_yield - 200.0 / 2500.0).abs() < 1e-12);
        assert_eq!(row.market_share, 1.0);
        assert_eq!(row.metro_share, 1.0);
        assert_eq!(row.market_fare_premium, 1.0);
        assert_eq!(row.origin_share.market_share, 1.0);
        assert_eq!(row.distance_bucket, 2750.0);
        assert_eq!(row.distance_yield_premium, 1.0);
        assert_eq!(row.carrier_origin_avg_yield_premium, 1.0);
    }

    #[test]
    fn test_market_shares_sum_to_one_per_route() {
        let records = vec![
            record("JFK", "LAX", "AA", 2500.0, 10.0, 2000.0),
            record("JFK", "LAX", "B6", 2500.0, 30.0, 4500.0),
            record("BOS", "SFO", "UA", 2700.0, 5.0, 1250.0),
        ];
        let rows = enrich(&records, &config());

        let mut by_route: HashMap<(String, String), f64> = HashMap::new();
        for row in &rows {
            assert!(row.market_share > 0.0);
            *by_route
                .entry((row.origin.clone(), row.dest.clone()))
                .or_default() += row.market_share;
        }
        for total in by_route.values() {
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_metro_share_spans_constituent_airports() {
        // AA flies both JFK-LAX and LGA-LAX; its metro share covers both.
        let records = vec![
            record("JFK", "LAX", "AA", 2500.0, 10.0, 2000.0),
            record("LGA", "LAX", "AA", 2470.0, 10.0, 2200.0),
            record("JFK", "LAX", "B6", 2500.0, 20.0, 3000.0),
        ];
        let rows = enrich(&records, &config());
        let aa_jfk = rows
            .iter()
            .find(|r| r.carrier == "AA" && r.origin == "JFK")
            .unwrap();
        assert!((aa_jfk.carrier_metro_pax_day - 20.0).abs() < 1e-9);
        assert!((aa_jfk.metro_pax_day - 40.0).abs() < 1e-9);
        assert!((aa_jfk.metro_share - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_exc_ulcc_reference_excludes_only_ulccs() {
        let records = vec![
            record("DEN", "ATL", "UA", 1200.0, 10.0, 2500.0),
            record("DEN", "ATL", "NK", 1200.0, 30.0, 3000.0),
        ];
        let rows = enrich(&records, &config());

        let nk = rows.iter().find(|r| r.carrier == "NK").unwrap();
        let ua = rows.iter().find(|r| r.carrier == "UA").unwrap();

        // All-carrier reference sees both carriers.
        assert!((ua.origin_share.place_pax_day - 40.0).abs() < 1e-9);
        // The exc.-ULCC population is UA alone, so UA's premium against it
        // is 1 and NK's is its own yield over UA's.
        assert!((ua.origin_share.exc_ulcc_yield_premium - 1.0).abs() < 1e-9);
        let nk_yield = (3000.0 / 30.0) / 1200.0;
        let ua_yield = (2500.0 / 10.0) / 1200.0;
        assert!(
            (nk.origin_share.exc_ulcc_yield_premium - nk_yield / ua_yield).abs() < 1e-9
        );
        assert!((nk.origin_share.exc_ulcc_market_share - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ulcc_only_place_fills_zero() {
        let records = vec![record("MCO", "SJU", "NK", 1200.0, 10.0, 900.0)];
        let rows = enrich(&records, &config());
        let row = &rows[0];
        assert_eq!(row.origin_share.exc_ulcc_market_share, 0.0);
        assert_eq!(row.origin_share.exc_ulcc_yield_premium, 0.0);
        assert_eq!(row.origin_share.exc_ulcc_total_yield_premium, 0.0);
        // The all-carrier reference is untouched by the fill policy.
        assert_eq!(row.origin_share.market_share, 1.0);
    }

    #[test]
    fn test_bucket_yield_is_pax_mile_weighted() {
        // Two routes in the 750-mile bucket with different volumes; the
        // bucket yield must weight by pax-miles, not average the yields.
        let records = vec![
            record("AAA", "BBB", "XX", 600.0, 10.0, 1200.0),
            record("CCC", "DDD", "YY", 900.0, 30.0, 5400.0),
        ];
        let config = Config::parse(r#"{"Distance bucket size": 1000}"#).unwrap();
        let rows = enrich(&records, &config);

        let pax_miles = 600.0 * 10.0 + 900.0 * 30.0;
        let revenue = 1200.0 + 5400.0;
        let expected_bucket_yield = revenue / pax_miles;
        let xx = rows.iter().find(|r| r.carrier == "XX").unwrap();
        assert!(
            (xx.distance_yield_premium - xx.carrier_yield / expected_bucket_yield).abs() < 1e-12
        );
        assert_eq!(xx.distance_bucket, 500.0);
    }

    #[test]
    fn test_origin_average_premium_is_weighted_broadcast() {
        // One carrier, one origin, two routes in different buckets shared
        // with a competitor, so per-bucket premiums differ from 1.
        let records = vec![
            record("DEN", "AAA", "XX", 600.0, 10.0, 2400.0),
            record("DEN", "BBB", "XX", 1600.0, 20.0, 4000.0),
            record("DEN", "AAA", "YY", 600.0, 10.0, 1200.0),
            record("DEN", "BBB", "YY", 1600.0, 20.0, 8000.0),
        ];
        let config = Config::parse(r#"{"Distance bucket size": 1000}"#).unwrap();
        let rows = enrich(&records, &config);

        let xx_rows: Vec<&EnrichedRow> =
            rows.iter().filter(|r| r.carrier == "XX").collect();
        let expected: f64 = {
            let total_miles: f64 = xx_rows
                .iter()
                .map(|r| r.nonstop_miles * r.adj_pax_day)
                .sum();
            xx_rows
                .iter()
                .map(|r| {
                    r.carrier_origin_distance_flight_yield_premium
                        * r.nonstop_miles
                        * r.adj_pax_day
                })
                .sum::<f64>()
                / total_miles
        };
        for row in &xx_rows {
            assert!((row.carrier_origin_avg_yield_premium - expected).abs() < 1e-12);
        }
        // The two buckets have different premiums, so the broadcast value
        // is a genuine average rather than a per-row copy.
        assert!(
            (xx_rows[0].carrier_origin_distance_flight_yield_premium
                - xx_rows[1].carrier_origin_distance_flight_yield_premium)
                .abs()
                > 1e-6
        );
    }
}
