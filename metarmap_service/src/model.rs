//! Core data types for the METAR map service.
//!
//! This module defines the shared domain model imported by all other modules:
//! raw feed records, the classified station condition, indicator positions and
//! targets, colors, and the service-wide error type. It contains no I/O.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// A three-channel color in the strip's native channel order.
///
/// Configuration writes colors as `[a, b, c]` arrays; no conversion happens
/// between the configuration file and the indicator sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const OFF: Color = Color(0, 0, 0);

    /// Scales every channel by `factor` (clamped to 0.0..=1.0).
    pub fn scaled(self, factor: f32) -> Color {
        let f = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        let scale = |c: u8| (c as f32 * f).round() as u8;
        Color(scale(self.0), scale(self.1), scale(self.2))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.0, self.1, self.2)
    }
}

// ---------------------------------------------------------------------------
// Flight category
// ---------------------------------------------------------------------------

/// Coarse flyability classification reported with each METAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightCategory {
    Vfr,
    Mvfr,
    Ifr,
    Lifr,
    Unknown,
}

impl FlightCategory {
    /// Maps a feed category string onto a category. Anything unrecognized,
    /// including an empty string, is `Unknown`.
    pub fn parse(text: &str) -> FlightCategory {
        match text.trim().to_ascii_uppercase().as_str() {
            "VFR" => FlightCategory::Vfr,
            "MVFR" => FlightCategory::Mvfr,
            "IFR" => FlightCategory::Ifr,
            "LIFR" => FlightCategory::Lifr,
            _ => FlightCategory::Unknown,
        }
    }
}

impl std::fmt::Display for FlightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightCategory::Vfr => write!(f, "VFR"),
            FlightCategory::Mvfr => write!(f, "MVFR"),
            FlightCategory::Ifr => write!(f, "IFR"),
            FlightCategory::Lifr => write!(f, "LIFR"),
            FlightCategory::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Feed records
// ---------------------------------------------------------------------------

/// One reported cloud layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkyLayer {
    pub cover: String,     // "FEW", "SCT", "BKN", "OVC", "CLR", ...
    pub base_ft_agl: u32,  // 0 when the feed omits a base
}

/// A single station report as delivered by a weather source.
///
/// Every field other than the station identifier may be missing, and a
/// missing value is distinct from zero. Records are never filtered on
/// missing fields; the classifier decides how to default them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStationRecord {
    pub station_id: String,
    pub flight_category: Option<String>,
    pub wind_dir: Option<String>, // degrees, or "VRB"
    pub wind_speed_kt: Option<i64>,
    pub wind_gust_kt: Option<i64>,
    pub temp_c: Option<f64>,
    pub dewpoint_c: Option<f64>,
    pub visibility_mi: Option<f64>,
    pub altimeter_in_hg: Option<f64>,
    pub wx_string: Option<String>,
    pub raw_text: Option<String>,
    pub sky_conditions: Vec<SkyLayer>,
    pub observation_time: Option<DateTime<Utc>>,
}

impl RawStationRecord {
    /// A record carrying only a station identifier.
    pub fn new(station_id: &str) -> Self {
        RawStationRecord {
            station_id: station_id.to_string(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Classified condition
// ---------------------------------------------------------------------------

/// Normalized weather for one station at one observation time.
///
/// Built once per refresh cycle by `classify::classify` and never mutated
/// afterwards. Numeric fields are always populated; absent feed values have
/// already been defaulted to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StationCondition {
    pub station_id: String,
    pub flight_category: FlightCategory,
    pub wind_dir: String,
    pub wind_speed_kt: u32,
    pub wind_gust_kt: u32,
    pub wind_gusting: bool,
    pub wind_blink_eligible: bool,
    pub lightning_present: bool,
    pub temp_c: i32,
    pub dewpoint_c: i32,
    pub visibility_mi: i32,
    pub altimeter_in_hg: f64,
    pub wx_string: String,
    pub sky_conditions: Vec<SkyLayer>,
    pub observation_time: DateTime<Utc>,
}

/// Station id → condition for one refresh cycle. Stations that did not
/// report are simply absent.
pub type ConditionMap = HashMap<String, StationCondition>;

// ---------------------------------------------------------------------------
// Indicator layout
// ---------------------------------------------------------------------------

/// One slot of the physical indicator, in wiring order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Position {
    /// A wired light with no station behind it. Always dark.
    Placeholder,
    Station(String),
}

impl Position {
    pub fn station_id(&self) -> Option<&str> {
        match self {
            Position::Placeholder => None,
            Position::Station(id) => Some(id),
        }
    }
}

/// Desired state of one position for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub color: Color,
    pub animate: bool,
}

impl Target {
    pub fn off(off_color: Color) -> Self {
        Target { color: off_color, animate: false }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while fetching weather, loading configuration, or
/// driving the indicator.
#[derive(Debug, PartialEq)]
pub enum MetarError {
    /// Non-2xx HTTP response from the weather data API.
    Http(u16),
    /// The request could not be completed (connect failure, timeout, ...).
    Transport(String),
    /// The response body could not be deserialized.
    Parse(String),
    /// An invalid or missing configuration value.
    Config(String),
    /// A blink task already owns this position.
    PositionBusy(usize),
    /// The position index is beyond the end of the strip.
    PositionOutOfRange { position: usize, len: usize },
    /// A new layout was applied while blink tasks from the last one were live.
    TasksStillLive(usize),
    /// A canceled blink task did not stop within the join timeout.
    JoinTimeout(usize),
    /// A blink task panicked before it could be joined.
    TaskPanicked(usize),
    /// The OS refused to start a blink thread.
    TaskSpawn(String),
}

impl std::fmt::Display for MetarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetarError::Http(code) => write!(f, "HTTP error: {}", code),
            MetarError::Transport(msg) => write!(f, "Transport error: {}", msg),
            MetarError::Parse(msg) => write!(f, "Parse error: {}", msg),
            MetarError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MetarError::PositionBusy(p) => {
                write!(f, "Position {} already has a live blink task", p)
            }
            MetarError::PositionOutOfRange { position, len } => {
                write!(f, "Position {} out of range for strip of {}", position, len)
            }
            MetarError::TasksStillLive(count) => {
                write!(f, "{} blink tasks still live from previous layout", count)
            }
            MetarError::JoinTimeout(p) => {
                write!(f, "Blink task for position {} did not stop in time", p)
            }
            MetarError::TaskPanicked(p) => write!(f, "Blink task for position {} panicked", p),
            MetarError::TaskSpawn(msg) => write!(f, "Could not start blink task: {}", msg),
        }
    }
}

impl std::error::Error for MetarError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
