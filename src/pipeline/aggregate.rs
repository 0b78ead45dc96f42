//! The generic group-by/sum engine.
//!
//! Every grouping level in the pipeline (route, metro-pair, metro-carrier,
//! airport-carrier, airport, distance bucket, origin-carrier-bucket) goes
//! through [`sum_by`], so conservation of measures across levels follows
//! from one accumulation loop.

use std::collections::HashMap;
use std::hash::Hash;

use crate::pipeline::types::{MarketRecord, Measures};

/// Groups `records` by `key` and sums the measure vector per group.
///
/// Groups are exhaustive and disjoint over the input, and output order is
/// irrelevant; callers join on the key, never on position.
pub fn sum_by<K, F>(records: &[MarketRecord], key: F) -> HashMap<K, Measures>
where
    K: Eq + Hash,
    F: Fn(&MarketRecord) -> K,
{
    let mut groups: HashMap<K, Measures> = HashMap::new();
    for r in records {
        groups
            .entry(key(r))
            .or_default()
            .add(&Measures::from_record(r));
    }
    groups
}

/// [`sum_by`] restricted to records matching `keep`; used for the
/// exc.-ULCC reference populations.
pub fn sum_by_filtered<K, F, P>(records: &[MarketRecord], keep: P, key: F) -> HashMap<K, Measures>
where
    K: Eq + Hash,
    F: Fn(&MarketRecord) -> K,
    P: Fn(&MarketRecord) -> bool,
{
    let mut groups: HashMap<K, Measures> = HashMap::new();
    for r in records.iter().filter(|r| keep(r)) {
        groups
            .entry(key(r))
            .or_default()
            .add(&Measures::from_record(r));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(origin: &str, dest: &str, carrier: &str, pax: f64, revenue: f64) -> MarketRecord {
        MarketRecord {
            origin: origin.to_string(),
            dest: dest.to_string(),
            carrier: carrier.to_string(),
            origin_metro: origin.to_string(),
            dest_metro: dest.to_string(),
            nonstop_miles: 1000.0,
            pax_day: pax,
            adj_pax_day: pax,
            revenue_day: revenue,
            total_revenue_day: revenue,
        }
    }

    #[test]
    fn test_sum_by_conservation() {
        let records = vec![
            record("JFK", "LAX", "AA", 10.0, 2000.0),
            record("JFK", "LAX", "B6", 20.0, 3000.0),
            record("BOS", "LAX", "B6", 5.0, 900.0),
        ];

        let total_pax: f64 = records.iter().map(|r| r.pax_day).sum();
        let total_revenue: f64 = records.iter().map(|r| r.revenue_day).sum();

        let by_route = sum_by(&records, |r| r.route_key());
        assert_eq!(by_route.len(), 2);
        assert_eq!(by_route.values().map(|m| m.pax_day).sum::<f64>(), total_pax);
        assert_eq!(
            by_route.values().map(|m| m.revenue_day).sum::<f64>(),
            total_revenue
        );

        let jfk_lax = &by_route[&("JFK".to_string(), "LAX".to_string())];
        assert_eq!(jfk_lax.pax_day, 30.0);
        assert_eq!(jfk_lax.revenue_day, 5000.0);
        assert_eq!(jfk_lax.pax_miles, 30_000.0);
    }

    #[test]
    fn test_sum_by_single_group_is_grand_total() {
        let records = vec![
            record("JFK", "LAX", "AA", 10.0, 2000.0),
            record("BOS", "SFO", "UA", 7.0, 1500.0),
        ];

        let all = sum_by(&records, |_| ());
        assert_eq!(all[&()].pax_day, 17.0);
        assert_eq!(all[&()].revenue_day, 3500.0);
    }

    #[test]
    fn test_sum_by_filtered_excludes_rows() {
        let records = vec![
            record("JFK", "LAX", "AA", 10.0, 2000.0),
            record("JFK", "LAX", "NK", 20.0, 1000.0),
        ];

        let exc = sum_by_filtered(&records, |r| r.carrier != "NK", |r| r.route_key());
        assert_eq!(exc[&("JFK".to_string(), "LAX".to_string())].pax_day, 10.0);
    }
}
