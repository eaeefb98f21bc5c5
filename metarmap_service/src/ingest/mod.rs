//! Weather data sources.
//!
//! Submodules:
//! - `awc`: aviationweather.gov METAR data API client.

pub mod awc;

use crate::model::{MetarError, RawStationRecord};

/// Anything that can produce the latest report for a set of stations.
///
/// Implementations return at most one record per requested station, in any
/// order. Stations that did not report are simply missing. Records lacking
/// a flight category must be returned, not filtered out.
pub trait WeatherSource {
    fn fetch(&self, station_ids: &[&str]) -> Result<Vec<RawStationRecord>, MetarError>;
}
