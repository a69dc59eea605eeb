//! Data models for the Places2Go dashboard
//!
//! This module contains the typed records for each dataset:
//! - Destination: static reference data, one row per destination
//! - Cost: cost-of-living snapshots (time series per destination)
//! - Flight: priced flight quotes (many per destination per day)
//! - Weather: forecasts and observations per destination and date

pub mod cost;
pub mod destination;
pub mod flight;
pub mod weather;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export all public types for convenient access
pub use cost::CostRecord;
pub use destination::Destination;
pub use flight::FlightQuote;
pub use weather::WeatherObservation;

/// One of the four logical tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Destinations,
    Costs,
    Flights,
    Weather,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [
        Dataset::Destinations,
        Dataset::Costs,
        Dataset::Flights,
        Dataset::Weather,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Dataset::Destinations => "destinations",
            Dataset::Costs => "costs",
            Dataset::Flights => "flights",
            Dataset::Weather => "weather",
        }
    }

    /// Backing file location relative to the data root
    #[must_use]
    pub fn relative_path(self) -> &'static str {
        match self {
            Dataset::Destinations => "destinations/destinations.csv",
            Dataset::Costs => "destinations/cost_of_living.csv",
            Dataset::Flights => "flights/flight_prices.csv",
            Dataset::Weather => "weather/weather_data.csv",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown dataset '{s}'"))
    }
}
