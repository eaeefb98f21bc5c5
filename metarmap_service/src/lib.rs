//! METAR map service.
//!
//! Colors one indicator light per airport by its current flight category,
//! blinks lights for strong wind, and steps a small text display through
//! the reporting stations. Weather comes from the AviationWeather.gov data
//! API and is refreshed on a fixed period.

pub mod classify;
pub mod config;
pub mod dimming;
pub mod display;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod refresh;
pub mod rotation;
pub mod scheduler;
pub mod staleness;
pub mod stations;
pub mod strip;
pub mod targets;
