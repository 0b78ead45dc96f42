//! Data types shared across the enrichment pipeline.

/// A market observation after consolidation: passengers and fare revenue
/// summed within (origin, dest, carrier, nonstop miles).
#[derive(Debug, Clone)]
pub struct ConsolidatedRow {
    pub origin: String,
    pub dest: String,
    pub carrier: String,
    pub nonstop_miles: f64,
    pub passengers: f64,
    pub market_fare: f64,
}

impl ConsolidatedRow {
    /// The exhaustive consolidation key. Two rows sharing it are the same
    /// market observation and must be merged, never duplicated.
    pub fn key(&self) -> ConsolidationKey {
        ConsolidationKey {
            origin: self.origin.clone(),
            dest: self.dest.clone(),
            carrier: self.carrier.clone(),
            miles_bits: self.nonstop_miles.to_bits(),
        }
    }
}

/// Hashable consolidation key; miles are keyed by bit pattern since they
/// come verbatim from the input files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsolidationKey {
    pub origin: String,
    pub dest: String,
    pub carrier: String,
    pub miles_bits: u64,
}

/// A carrier-route record scaled to daily rates, with metro labels attached.
/// This is the working unit of every downstream stage.
#[derive(Debug, Clone)]
pub struct MarketRecord {
    pub origin: String,
    pub dest: String,
    pub carrier: String,
    pub origin_metro: String,
    pub dest_metro: String,
    pub nonstop_miles: f64,
    pub pax_day: f64,
    pub adj_pax_day: f64,
    pub revenue_day: f64,
    pub total_revenue_day: f64,
}

impl MarketRecord {
    pub fn route_key(&self) -> (String, String) {
        (self.origin.clone(), self.dest.clone())
    }

    pub fn metro_key(&self) -> (String, String) {
        (self.origin_metro.clone(), self.dest_metro.clone())
    }

    pub fn metro_carrier_key(&self) -> (String, String, String) {
        (
            self.origin_metro.clone(),
            self.dest_metro.clone(),
            self.carrier.clone(),
        )
    }
}

/// The additive measure vector every aggregation sums. Passenger-mile
/// measures are derived at construction so that any grouping level can
/// weight yields by distance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measures {
    pub pax_day: f64,
    pub adj_pax_day: f64,
    pub revenue_day: f64,
    pub total_revenue_day: f64,
    pub pax_miles: f64,
    pub adj_pax_miles: f64,
}

impl Measures {
    pub fn from_record(r: &MarketRecord) -> Self {
        Measures {
            pax_day: r.pax_day,
            adj_pax_day: r.adj_pax_day,
            revenue_day: r.revenue_day,
            total_revenue_day: r.total_revenue_day,
            pax_miles: r.nonstop_miles * r.pax_day,
            adj_pax_miles: r.nonstop_miles * r.adj_pax_day,
        }
    }

    pub fn add(&mut self, other: &Measures) {
        self.pax_day += other.pax_day;
        self.adj_pax_day += other.adj_pax_day;
        self.revenue_day += other.revenue_day;
        self.total_revenue_day += other.total_revenue_day;
        self.pax_miles += other.pax_miles;
        self.adj_pax_miles += other.adj_pax_miles;
    }
}
