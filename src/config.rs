//! Run configuration loaded from JSON.
//!
//! Mirrors the on-disk key names exactly; the airport-to-metro lookup is
//! precomputed once at load so the rest of the pipeline never touches the
//! raw metro lists.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

const PRIMARY_PATH: &str = "./configuration.json";
const FALLBACK_PATH: &str = "./configuration.example.json";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(rename = "Metro areas", default)]
    pub metro_areas: HashMap<String, Vec<String>>,

    #[serde(rename = "ULCCs", default)]
    pub ulccs: HashSet<String>,

    #[serde(rename = "Ancillary revenue per passenger", default)]
    ancillary_revenue: HashMap<String, f64>,

    #[serde(rename = "Extra seats", default)]
    extra_seats: HashMap<String, f64>,

    #[serde(rename = "Distance bucket size")]
    pub distance_bucket_size: f64,

    #[serde(rename = "Filters at beginning", default)]
    pub filters_at_beginning: BeginningFilters,

    #[serde(rename = "Filters at end", default)]
    pub filters_at_end: EndFilters,

    #[serde(rename = "Passenger flow validation", default)]
    pub flow_validation: FlowValidation,

    #[serde(skip)]
    airport_metros: HashMap<String, String>,
}

/// Thresholds for the convergent share filter.
#[derive(Debug, Default, Deserialize)]
pub struct BeginningFilters {
    #[serde(rename = "Market pax/day", default)]
    pub market_pax_day: f64,

    #[serde(rename = "Metro pax/day", default)]
    pub metro_pax_day: f64,

    #[serde(rename = "Market share", default)]
    pub market_share: f64,

    #[serde(rename = "Metro share", default)]
    pub metro_share: f64,

    #[serde(rename = "Market carrier pax/day", default)]
    pub market_carrier_pax_day: f64,

    #[serde(rename = "Invalid carriers", default)]
    pub invalid_carriers: HashSet<String>,

    #[serde(rename = "Do not filter if", default)]
    pub do_not_filter_if: FilterOverride,
}

/// Volume override protecting high-volume carrier-routes from the share
/// floors even when their share of a large reference population is small.
#[derive(Debug, Deserialize)]
pub struct FilterOverride {
    #[serde(rename = "Market carrier pax/day", default = "default_override_pax_day")]
    pub market_carrier_pax_day: f64,
}

impl Default for FilterOverride {
    fn default() -> Self {
        FilterOverride {
            market_carrier_pax_day: default_override_pax_day(),
        }
    }
}

fn default_override_pax_day() -> f64 {
    10_000.0
}

/// Thresholds for the final output filter, applied after enrichment.
#[derive(Debug, Default, Deserialize)]
pub struct EndFilters {
    #[serde(rename = "Metro market share", default)]
    metro_market_share: f64,

    #[serde(rename = "Market carrier pax/day", default)]
    pub market_carrier_pax_day: f64,

    #[serde(rename = "Metro pax/day", default)]
    pub metro_pax_day: f64,
}

impl EndFilters {
    /// The metro share floor, normalized to a fraction when configured as a
    /// percentage (any value of 1 or more is read as percent).
    pub fn metro_share_floor(&self) -> f64 {
        normalize_fraction(self.metro_market_share)
    }
}

/// Thresholds for the directional passenger-flow diagnostic.
#[derive(Debug, Default, Deserialize)]
pub struct FlowValidation {
    #[serde(rename = "Quantity different", default)]
    pub quantity_different: f64,

    #[serde(rename = "Percent different", default)]
    percent_different: f64,
}

impl FlowValidation {
    /// The percent threshold normalized to a fraction when configured
    /// outside (-1, 1).
    pub fn percent_floor(&self) -> f64 {
        if self.percent_different > -1.0 && self.percent_different < 1.0 {
            self.percent_different
        } else {
            self.percent_different / 100.0
        }
    }
}

fn normalize_fraction(value: f64) -> f64 {
    if value < 1.0 { value } else { value / 100.0 }
}

impl Config {
    /// Loads the configuration from `./configuration.json`, falling back to
    /// `./configuration.example.json`. Both missing is fatal.
    pub fn load() -> Result<Config> {
        let content = std::fs::read_to_string(PRIMARY_PATH)
            .or_else(|_| std::fs::read_to_string(FALLBACK_PATH))
            .with_context(|| {
                format!("no configuration found at {PRIMARY_PATH} or {FALLBACK_PATH}")
            })?;
        Self::parse(&content)
    }

    /// Parses a configuration from JSON text and precomputes the
    /// airport-to-metro lookup.
    pub fn parse(content: &str) -> Result<Config> {
        let mut config: Config =
            serde_json::from_str(content).context("malformed configuration JSON")?;
        for (metro, airports) in &config.metro_areas {
            for airport in airports {
                config
                    .airport_metros
                    .insert(airport.clone(), metro.clone());
            }
        }
        Ok(config)
    }

    /// The metro area an airport belongs to. An unmapped airport is its own
    /// trivial metro.
    pub fn metro<'a>(&'a self, airport: &'a str) -> &'a str {
        self.airport_metros
            .get(airport)
            .map(String::as_str)
            .unwrap_or(airport)
    }

    /// Per-passenger ancillary revenue for a carrier, falling back to the
    /// configured `Default` entry.
    pub fn ancillary_revenue(&self, carrier: &str) -> f64 {
        self.ancillary_revenue
            .get(carrier)
            .or_else(|| self.ancillary_revenue.get("Default"))
            .copied()
            .unwrap_or(0.0)
    }

    /// Seat-density divisor for a carrier: `1 + extra seat factor`, falling
    /// back to the configured `Default` entry.
    pub fn density_bonus(&self, carrier: &str) -> f64 {
        1.0 + self
            .extra_seats
            .get(carrier)
            .or_else(|| self.extra_seats.get("Default"))
            .copied()
            .unwrap_or(0.0)
    }
}
