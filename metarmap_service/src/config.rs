//! TOML configuration loader
//!
//! Loads `metarmap.toml` into immutable runtime settings. Every field has a
//! default, so a file only needs a `[stations]` table. Settings are grouped
//! into small `Copy` snapshots so that each blink task can be handed its own
//! copy at creation time rather than reading shared state.

use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::logging::LogLevel;
use crate::model::{Color, FlightCategory, MetarError, Position};
use crate::stations;

pub const DEFAULT_CONFIG_PATH: &str = "metarmap.toml";
pub const DEFAULT_AWC_BASE_URL: &str = "https://aviationweather.gov";

// ============================================================================
// TOML Configuration Structures
// ============================================================================

/// Root TOML structure
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub stations: StationsSection,
    #[serde(default)]
    pub wind: WindSection,
    #[serde(default)]
    pub blink: BlinkSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub refresh: RefreshSection,
    #[serde(default)]
    pub colors: ColorsSection,
    #[serde(default)]
    pub dimming: DimmingSection,
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Either an inline list or a legacy airports file, one identifier per line.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationsSection {
    pub positions: Option<Vec<String>>,
    pub airports_file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindSection {
    pub animate: bool,
    pub blink_threshold_kt: u32,
    pub always_blink_for_gusts: bool,
}

impl Default for WindSection {
    fn default() -> Self {
        WindSection {
            animate: true,
            blink_threshold_kt: 25,
            always_blink_for_gusts: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlinkSection {
    pub period_secs: f64,
    pub fade_instead_of_blink: bool,
    pub fade_factor: f32,
    pub join_timeout_secs: f64,
}

impl Default for BlinkSection {
    fn default() -> Self {
        BlinkSection {
            period_secs: 2.0,
            fade_instead_of_blink: false,
            fade_factor: 0.5,
            join_timeout_secs: 5.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplaySection {
    pub enabled: bool,
    pub dwell_secs: f64,
    pub fast_highlight: bool,
    pub fast_highlight_period_secs: f64,
}

impl Default for DisplaySection {
    fn default() -> Self {
        DisplaySection {
            enabled: true,
            dwell_secs: 5.0,
            fast_highlight: true,
            fast_highlight_period_secs: 0.1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshSection {
    pub period_secs: f64,
    pub fetch_timeout_secs: f64,
    pub retry_backoff_secs: f64,
    pub stale_policy: StalePolicy,
    pub stale_observation_minutes: u64,
}

impl Default for RefreshSection {
    fn default() -> Self {
        RefreshSection {
            period_secs: 1800.0,
            fetch_timeout_secs: 30.0,
            retry_backoff_secs: 60.0,
            stale_policy: StalePolicy::KeepLast,
            stale_observation_minutes: 90,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorsSection {
    pub vfr: Color,
    pub mvfr: Color,
    pub ifr: Color,
    pub lifr: Color,
    pub lightning: Color,
    pub off: Color,
}

impl Default for ColorsSection {
    // GRB channel order, as wired on the common WS2811 strings.
    fn default() -> Self {
        ColorsSection {
            vfr: Color(255, 0, 0),
            mvfr: Color(0, 0, 255),
            ifr: Color(0, 255, 0),
            lifr: Color(0, 125, 125),
            lightning: Color(255, 255, 255),
            off: Color::OFF,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimmingSection {
    pub enabled: bool,
    pub bright_start: String, // "HH:MM", local time
    pub dim_start: String,
    pub brightness: f32,
    pub dim_brightness: f32,
    /// Take the bright window from local sunrise/sunset instead of the
    /// fixed times. Needs `latitude` and `longitude`.
    pub use_sunrise_sunset: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for DimmingSection {
    fn default() -> Self {
        DimmingSection {
            enabled: true,
            bright_start: "07:00".to_string(),
            dim_start: "19:00".to_string(),
            brightness: 0.5,
            dim_brightness: 0.1,
            use_sunrise_sunset: false,
            latitude: None,
            longitude: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedSection {
    pub base_url: String,
    pub hours_before_now: u32,
}

impl Default for FeedSection {
    fn default() -> Self {
        FeedSection {
            base_url: DEFAULT_AWC_BASE_URL.to_string(),
            hours_before_now: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: LogLevel,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: LogLevel::Info,
            file: Some("metar.log".to_string()),
            console_timestamps: true,
        }
    }
}

// ============================================================================
// Runtime Settings
// ============================================================================

/// What the refresh loop does when the weather source fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Keep animating the last good layout; retry at the next refresh.
    KeepLast,
    /// Turn every position off until the next successful fetch.
    Blank,
}

/// Inputs to wind classification and the global animation switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindSettings {
    pub animate: bool,
    pub blink_threshold_kt: u32,
    pub always_blink_for_gusts: bool,
}

/// Snapshot handed to each blink task when it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkSettings {
    pub period: Duration,
    pub fade_instead_of_blink: bool,
    pub fade_factor: f32,
    pub join_timeout: Duration,
}

impl BlinkSettings {
    pub fn half_period(&self) -> Duration {
        self.period / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationSettings {
    pub enabled: bool,
    pub dwell: Duration,
    pub fast_highlight: bool,
    pub fast_period: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshSettings {
    pub period: Duration,
    pub fetch_timeout: Duration,
    pub retry_backoff: Duration,
    pub stale_policy: StalePolicy,
    pub stale_observation_minutes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTable {
    pub vfr: Color,
    pub mvfr: Color,
    pub ifr: Color,
    pub lifr: Color,
    pub lightning: Color,
    pub off: Color,
}

impl ColorTable {
    pub fn for_category(&self, category: FlightCategory) -> Color {
        match category {
            FlightCategory::Vfr => self.vfr,
            FlightCategory::Mvfr => self.mvfr,
            FlightCategory::Ifr => self.ifr,
            FlightCategory::Lifr => self.lifr,
            FlightCategory::Unknown => self.off,
        }
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        ColorsSection::default().into()
    }
}

impl From<ColorsSection> for ColorTable {
    fn from(c: ColorsSection) -> Self {
        ColorTable {
            vfr: c.vfr,
            mvfr: c.mvfr,
            ifr: c.ifr,
            lifr: c.lifr,
            lightning: c.lightning,
            off: c.off,
        }
    }
}

/// A point on the earth, decimal degrees, north and east positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimmingSettings {
    pub enabled: bool,
    /// Set when the bright window follows sunrise and sunset here.
    pub sun_location: Option<GeoPoint>,
    pub bright_start: NaiveTime,
    pub dim_start: NaiveTime,
    pub brightness: f32,
    pub dim_brightness: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub base_url: String,
    pub hours_before_now: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

/// Fully validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub positions: Vec<Position>,
    pub wind: WindSettings,
    pub blink: BlinkSettings,
    pub rotation: RotationSettings,
    pub refresh: RefreshSettings,
    pub colors: ColorTable,
    pub dimming: DimmingSettings,
    pub feed: FeedSettings,
    pub logging: LoggingSettings,
}

// ============================================================================
// Loading and Validation
// ============================================================================

/// Load and validate configuration from a TOML file.
///
/// A relative `airports_file` is resolved against the config file's directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&content)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let positions: Vec<Position> = match (&file.stations.positions, &file.stations.airports_file) {
        (Some(list), None) => list.iter().map(|s| stations::parse_position(s)).collect(),
        (None, Some(airports)) => stations::load_airports_file(base_dir.join(airports))?,
        (Some(_), Some(_)) => {
            return Err(MetarError::Config(
                "set either stations.positions or stations.airports_file, not both".into(),
            )
            .into())
        }
        (None, None) => {
            return Err(MetarError::Config(
                "stations.positions or stations.airports_file is required".into(),
            )
            .into())
        }
    };

    Ok(build_config(file, positions)?)
}

/// Parse configuration from a TOML string with inline positions only.
pub fn parse_config(content: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let file: ConfigFile = toml::from_str(content)?;
    let positions: Vec<Position> = match &file.stations.positions {
        Some(list) => list.iter().map(|s| stations::parse_position(s)).collect(),
        None => {
            return Err(MetarError::Config("stations.positions is required".into()).into())
        }
    };
    Ok(build_config(file, positions)?)
}

fn build_config(file: ConfigFile, positions: Vec<Position>) -> Result<Config, MetarError> {
    if positions.is_empty() {
        return Err(MetarError::Config("position list is empty".into()));
    }

    let blink = BlinkSettings {
        period: positive_secs("blink.period_secs", file.blink.period_secs)?,
        fade_instead_of_blink: file.blink.fade_instead_of_blink,
        fade_factor: unit_interval("blink.fade_factor", file.blink.fade_factor)?,
        join_timeout: positive_secs("blink.join_timeout_secs", file.blink.join_timeout_secs)?,
    };

    let rotation = RotationSettings {
        enabled: file.display.enabled,
        dwell: positive_secs("display.dwell_secs", file.display.dwell_secs)?,
        fast_highlight: file.display.fast_highlight,
        fast_period: positive_secs(
            "display.fast_highlight_period_secs",
            file.display.fast_highlight_period_secs,
        )?,
    };

    let refresh = RefreshSettings {
        period: positive_secs("refresh.period_secs", file.refresh.period_secs)?,
        fetch_timeout: positive_secs("refresh.fetch_timeout_secs", file.refresh.fetch_timeout_secs)?,
        retry_backoff: positive_secs("refresh.retry_backoff_secs", file.refresh.retry_backoff_secs)?,
        stale_policy: file.refresh.stale_policy,
        stale_observation_minutes: file.refresh.stale_observation_minutes,
    };

    let sun_location = if file.dimming.use_sunrise_sunset {
        Some(geo_point(file.dimming.latitude, file.dimming.longitude)?)
    } else {
        None
    };

    let dimming = DimmingSettings {
        enabled: file.dimming.enabled,
        sun_location,
        bright_start: time_of_day("dimming.bright_start", &file.dimming.bright_start)?,
        dim_start: time_of_day("dimming.dim_start", &file.dimming.dim_start)?,
        brightness: unit_interval("dimming.brightness", file.dimming.brightness)?,
        dim_brightness: unit_interval("dimming.dim_brightness", file.dimming.dim_brightness)?,
    };

    if file.feed.base_url.trim().is_empty() {
        return Err(MetarError::Config("feed.base_url is empty".into()));
    }

    Ok(Config {
        positions,
        wind: WindSettings {
            animate: file.wind.animate,
            blink_threshold_kt: file.wind.blink_threshold_kt,
            always_blink_for_gusts: file.wind.always_blink_for_gusts,
        },
        blink,
        rotation,
        refresh,
        colors: file.colors.into(),
        dimming,
        feed: FeedSettings {
            base_url: file.feed.base_url.trim_end_matches('/').to_string(),
            hours_before_now: file.feed.hours_before_now.max(1),
        },
        logging: LoggingSettings {
            level: file.logging.level,
            file: file.logging.file.filter(|f| !f.trim().is_empty()),
            console_timestamps: file.logging.console_timestamps,
        },
    })
}

fn positive_secs(name: &str, secs: f64) -> Result<Duration, MetarError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(MetarError::Config(format!("{} must be a positive number of seconds, got {}", name, secs)));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn unit_interval(name: &str, value: f32) -> Result<f32, MetarError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MetarError::Config(format!("{} must be between 0.0 and 1.0, got {}", name, value)));
    }
    Ok(value)
}

fn geo_point(latitude: Option<f64>, longitude: Option<f64>) -> Result<GeoPoint, MetarError> {
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Err(MetarError::Config(
            "dimming.use_sunrise_sunset needs dimming.latitude and dimming.longitude".into(),
        ));
    };
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(MetarError::Config(format!(
            "dimming location {}, {} is not a valid latitude, longitude",
            latitude, longitude
        )));
    }
    Ok(GeoPoint { latitude, longitude })
}

fn time_of_day(name: &str, text: &str) -> Result<NaiveTime, MetarError> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M")
        .map_err(|e| MetarError::Config(format!("{} must be HH:MM, got '{}': {}", name, text, e)))
}

// ============================================================================
// Tests
// ============================================================================
